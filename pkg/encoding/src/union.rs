//! Tagged sums. Each case pairs a numeric tag with a payload encoding and a
//! projection/injection pair between the host type and that payload; the
//! payload type itself stays hidden behind an object safe trait so that
//! cases of different payloads can live in one list.

use std::collections::HashSet;
use std::sync::Arc;

use crate::encoding::{Codec, Encoding};
use crate::error::{ReadError, ReadResult, WriteError, WriteResult};
use crate::errors::*;
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::stream::ScanPlan;
use crate::writer::WriteState;

/// Width of the tag in front of every union payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSize {
    Uint8,
    Uint16,
}

impl TagSize {
    pub fn num_bytes(&self) -> usize {
        match self {
            TagSize::Uint8 => 1,
            TagSize::Uint16 => 2,
        }
    }

    fn max_tag(&self) -> u16 {
        match self {
            TagSize::Uint8 => 0xff,
            TagSize::Uint16 => 0xffff,
        }
    }
}

/// Discriminant of a union case. `TextOnly` cases never appear on the binary
/// wire; they exist for textual interpretations of the same descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTag {
    Tag(u16),
    TextOnly,
}

pub(crate) trait CaseCodec<T>: Send + Sync {
    /// Binary tag, or `None` for text only cases.
    fn tag(&self) -> Option<u16>;

    fn name(&self) -> &str;

    fn payload_kind(&self) -> Kind;

    fn payload_plan(&self) -> Arc<ScanPlan>;

    fn payload_is_obj(&self) -> bool;

    /// `None` when the value does not belong to this case.
    fn length_of(&self, value: &T) -> Option<WriteResult<usize>>;

    fn write_into(&self, value: &T, out: &mut WriteState) -> Option<WriteResult<()>>;

    fn read_from(&self, input: &mut ReadState) -> ReadResult<T>;
}

struct CaseImpl<T, P> {
    tag: CaseTag,
    name: String,
    encoding: Encoding<P>,
    project: Box<dyn Fn(&T) -> Option<P> + Send + Sync>,
    inject: Box<dyn Fn(P) -> T + Send + Sync>,
}

impl<T, P: 'static> CaseCodec<T> for CaseImpl<T, P> {
    fn tag(&self) -> Option<u16> {
        match self.tag {
            CaseTag::Tag(tag) => Some(tag),
            CaseTag::TextOnly => None,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn payload_kind(&self) -> Kind {
        self.encoding.classify()
    }

    fn payload_plan(&self) -> Arc<ScanPlan> {
        self.encoding.codec.scan_plan()
    }

    fn payload_is_obj(&self) -> bool {
        self.encoding.codec.is_obj()
    }

    fn length_of(&self, value: &T) -> Option<WriteResult<usize>> {
        let payload = (self.project)(value)?;
        Some(self.encoding.codec.encoded_len(&payload))
    }

    fn write_into(&self, value: &T, out: &mut WriteState) -> Option<WriteResult<()>> {
        let payload = (self.project)(value)?;
        Some(self.encoding.codec.write_value(&payload, out))
    }

    fn read_from(&self, input: &mut ReadState) -> ReadResult<T> {
        Ok((self.inject)(self.encoding.codec.read_value(input)?))
    }
}

/// One alternative of a [`union`].
pub struct Case<T> {
    pub(crate) codec: Box<dyn CaseCodec<T>>,
}

/// Builds a union case. `project` recognizes values belonging to the case
/// and extracts their payload; `inject` rebuilds a value from a parsed
/// payload.
pub fn case<T, P, Proj, Inj>(
    tag: CaseTag,
    name: &str,
    encoding: Encoding<P>,
    project: Proj,
    inject: Inj,
) -> Case<T>
where
    T: 'static,
    P: 'static,
    Proj: Fn(&T) -> Option<P> + Send + Sync + 'static,
    Inj: Fn(P) -> T + Send + Sync + 'static,
{
    Case {
        codec: Box::new(CaseImpl {
            tag,
            name: name.to_string(),
            encoding,
            project: Box::new(project),
            inject: Box::new(inject),
        }),
    }
}

struct UnionCodec<T> {
    tag_size: TagSize,
    cases: Vec<Case<T>>,
    kind: Kind,
}

impl<T: 'static> Codec<T> for UnionCodec<T> {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::TagSelect {
            size: self.tag_size,
            cases: self
                .cases
                .iter()
                .filter_map(|c| Some((c.codec.tag()?, c.codec.payload_plan())))
                .collect(),
        })
    }

    fn is_obj(&self) -> bool {
        self.cases.iter().all(|c| c.codec.payload_is_obj())
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        for case in &self.cases {
            if case.codec.tag().is_none() {
                continue;
            }
            if let Some(length) = case.codec.length_of(value) {
                return Ok(self.tag_size.num_bytes() + length?);
            }
        }
        Err(WriteError::NoCaseMatched)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        for case in &self.cases {
            let tag = match case.codec.tag() {
                Some(tag) => tag,
                None => continue,
            };

            // Projecting twice would be wasteful, so emit the tag eagerly
            // and take it back when the case turns out not to match.
            match self.tag_size {
                TagSize::Uint8 => out.write_u8(tag as u8)?,
                TagSize::Uint16 => out.write_u16(tag)?,
            }

            match case.codec.write_into(value, out) {
                Some(result) => return result,
                None => out.rewind(self.tag_size.num_bytes()),
            }
        }
        Err(WriteError::NoCaseMatched)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        let tag = match self.tag_size {
            TagSize::Uint8 => input.read_u8()? as u16,
            TagSize::Uint16 => input.read_u16()?,
        };

        for case in &self.cases {
            if case.codec.tag() == Some(tag) {
                return case.codec.read_from(input);
            }
        }
        Err(ReadError::UnexpectedTag(tag as u32))
    }
}

/// Tagged sum over `cases`. Writing picks the first case whose projection
/// matches; reading dispatches on the tag.
pub fn union<T: 'static>(
    tag_size: TagSize,
    cases: Vec<Case<T>>,
) -> Result<Encoding<T>> {
    if cases.is_empty() {
        return Err(err_msg("Unions need at least one case"));
    }

    let mut seen = HashSet::new();
    let mut payload_kinds = vec![];
    for case in &cases {
        let tag = match case.codec.tag() {
            Some(tag) => tag,
            None => continue,
        };

        if tag > tag_size.max_tag() {
            return Err(format_err!(
                "Tag {} on case {:?} does not fit in {} byte(s)",
                tag,
                case.codec.name(),
                tag_size.num_bytes()
            ));
        }
        if !seen.insert(tag) {
            return Err(format_err!(
                "Duplicate tag {} on case {:?}",
                tag,
                case.codec.name()
            ));
        }

        payload_kinds.push(case.codec.payload_kind());
    }

    if payload_kinds.is_empty() {
        return Err(err_msg("Unions need at least one binary case"));
    }

    let kind = match Kind::merge_cases(&payload_kinds) {
        Kind::Fixed(n) => Kind::Fixed(n + tag_size.num_bytes()),
        other => other,
    };

    Ok(Encoding::from_codec(UnionCodec {
        tag_size,
        cases,
        kind,
    }))
}

/// `Result` as a one byte tagged union: tag 0 carries the success payload
/// and tag 1 the error payload.
pub fn result<A, B>(
    ok: Encoding<A>,
    err: Encoding<B>,
) -> Result<Encoding<std::result::Result<A, B>>>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    union(
        TagSize::Uint8,
        vec![
            case(
                CaseTag::Tag(0),
                "ok",
                ok,
                |v: &std::result::Result<A, B>| v.as_ref().ok().cloned(),
                std::result::Result::Ok,
            ),
            case(
                CaseTag::Tag(1),
                "error",
                err,
                |v: &std::result::Result<A, B>| v.as_ref().err().cloned(),
                std::result::Result::Err,
            ),
        ],
    )
}
