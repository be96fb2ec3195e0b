use std::sync::Arc;

use bytes::Bytes;

use crate::error::{ReadError, ReadResult, WriteError, WriteResult};
use crate::errors::*;
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::size::SizeWidth;
use crate::stream::ScanPlan;
use crate::writer::WriteState;

/// One descriptor node. All four interpreters (length, write, read, scan)
/// recurse through this trait, so a single constructed tree drives every
/// operation on the same value space.
pub(crate) trait Codec<T>: Send + Sync + 'static {
    fn kind(&self) -> Kind;

    /// Type erased mirror of the binary structure, used by the incremental
    /// reader to find the end of a value without building it.
    fn scan_plan(&self) -> Arc<ScanPlan>;

    fn is_obj(&self) -> bool {
        false
    }

    fn is_tup(&self) -> bool {
        false
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize>;

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()>;

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T>;
}

/// Human facing metadata attached to a descriptor. The binary interpreters
/// ignore it entirely; it exists for documentation tooling and sibling
/// textual interpretations of the same descriptor tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documentation {
    /// Name introduced by [`def`], usable as a shared reference.
    pub reference_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A descriptor for values of type `T`.
///
/// Encodings are immutable and cheap to clone. Every encoding produced by the
/// constructors in this crate is well formed: its [`Kind`] is computable and
/// parsing never requires lookahead beyond the size headers the encoding
/// itself inserts.
pub struct Encoding<T> {
    pub(crate) codec: Arc<dyn Codec<T>>,
    doc: Option<Arc<Documentation>>,
}

impl<T> Clone for Encoding<T> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            doc: self.doc.clone(),
        }
    }
}

impl<T: 'static> Encoding<T> {
    pub(crate) fn from_codec<C: Codec<T>>(codec: C) -> Self {
        Self::from_arc(Arc::new(codec))
    }

    pub(crate) fn from_arc<C: Codec<T>>(codec: Arc<C>) -> Self {
        Self { codec, doc: None }
    }

    pub fn classify(&self) -> Kind {
        self.codec.kind()
    }

    /// Byte length shared by all values, if the encoding is fixed size.
    pub fn fixed_length(&self) -> Option<usize> {
        self.codec.kind().fixed_size()
    }

    pub fn documentation(&self) -> Option<&Documentation> {
        self.doc.as_deref()
    }

    /// Exact number of bytes `value` will serialize to.
    pub fn length(&self, value: &T) -> WriteResult<usize> {
        self.codec.encoded_len(value)
    }

    /// Serializes `value` into `buf` starting at `offset` and returns the
    /// offset one past the last written byte. The buffer contents are
    /// unspecified after a failure; callers pre-size with [`Self::length`].
    pub fn write(&self, value: &T, buf: &mut [u8], offset: usize) -> WriteResult<usize> {
        let mut state = WriteState::new(buf, offset)?;
        self.codec.write_value(value, &mut state)?;
        Ok(state.offset())
    }

    /// Parses one value from the window of `length` bytes starting at
    /// `offset`. Returns the number of bytes consumed alongside the value.
    pub fn read(&self, buf: &[u8], offset: usize, length: usize) -> ReadResult<(usize, T)> {
        let mut state = ReadState::new(buf, offset, length)?;
        let value = self.codec.read_value(&mut state)?;
        Ok((state.offset() - offset, value))
    }

    pub fn to_bytes(&self, value: &T) -> WriteResult<Vec<u8>> {
        let length = self.length(value)?;
        let mut buf = vec![0u8; length];
        self.write(value, &mut buf, 0)?;
        Ok(buf)
    }

    /// Like [`Self::to_bytes`] but splits the output into blocks of at most
    /// `block_size` bytes, sharing the underlying allocation.
    pub fn to_bytes_list(&self, block_size: usize, value: &T) -> Result<Vec<Bytes>> {
        if block_size == 0 {
            return Err(err_msg("Block size must be positive"));
        }

        let data = Bytes::from(self.to_bytes(value)?);

        let mut blocks = vec![];
        let mut start = 0;
        while start < data.len() {
            let end = std::cmp::min(start + block_size, data.len());
            blocks.push(data.slice(start..end));
            start = end;
        }

        Ok(blocks)
    }

    /// Parses a value occupying exactly all of `data`.
    pub fn of_bytes(&self, data: &[u8]) -> ReadResult<T> {
        let (consumed, value) = self.read(data, 0, data.len())?;
        if consumed != data.len() {
            return Err(ReadError::ExtraBytes);
        }
        Ok(value)
    }
}

struct ConvCodec<T, S> {
    project: Box<dyn Fn(&T) -> S + Send + Sync>,
    inject: Box<dyn Fn(S) -> T + Send + Sync>,
    inner: Encoding<S>,
}

impl<T: 'static, S: 'static> Codec<T> for ConvCodec<T, S> {
    fn kind(&self) -> Kind {
        self.inner.codec.kind()
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        self.inner.codec.scan_plan()
    }

    fn is_obj(&self) -> bool {
        self.inner.codec.is_obj()
    }

    fn is_tup(&self) -> bool {
        self.inner.codec.is_tup()
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        self.inner.codec.encoded_len(&(self.project)(value))
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.inner.codec.write_value(&(self.project)(value), out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        Ok((self.inject)(self.inner.codec.read_value(input)?))
    }
}

/// Reinterprets an encoding of `S` as an encoding of `T` through an
/// isomorphism. `project` maps a value to its serialized form and `inject`
/// maps a parsed form back.
pub fn conv<T, S, P, I>(project: P, inject: I, inner: Encoding<S>) -> Encoding<T>
where
    T: 'static,
    S: 'static,
    P: Fn(&T) -> S + Send + Sync + 'static,
    I: Fn(S) -> T + Send + Sync + 'static,
{
    Encoding::from_codec(ConvCodec {
        project: Box::new(project),
        inject: Box::new(inject),
        inner,
    })
}

fn with_documentation<T>(mut encoding: Encoding<T>, update: Documentation) -> Encoding<T> {
    let mut doc = encoding
        .doc
        .take()
        .map(|d| (*d).clone())
        .unwrap_or_default();

    if update.reference_name.is_some() {
        doc.reference_name = update.reference_name;
    }
    if update.title.is_some() {
        doc.title = update.title;
    }
    if update.description.is_some() {
        doc.description = update.description;
    }

    encoding.doc = Some(Arc::new(doc));
    encoding
}

/// Attaches a title and a free form description. Does not affect the wire
/// format.
pub fn describe<T>(
    title: Option<&str>,
    description: Option<&str>,
    encoding: Encoding<T>,
) -> Encoding<T> {
    with_documentation(
        encoding,
        Documentation {
            reference_name: None,
            title: title.map(|s| s.to_string()),
            description: description.map(|s| s.to_string()),
        },
    )
}

/// Gives the encoding a name that documentation tooling can reference.
pub fn def<T>(name: &str, encoding: Encoding<T>) -> Encoding<T> {
    with_documentation(
        encoding,
        Documentation {
            reference_name: Some(name.to_string()),
            title: None,
            description: None,
        },
    )
}

struct SplittedCodec<T> {
    binary: Encoding<T>,
    obj: bool,
    tup: bool,
}

impl<T: 'static> Codec<T> for SplittedCodec<T> {
    fn kind(&self) -> Kind {
        self.binary.codec.kind()
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        self.binary.codec.scan_plan()
    }

    fn is_obj(&self) -> bool {
        self.obj
    }

    fn is_tup(&self) -> bool {
        self.tup
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        self.binary.codec.encoded_len(value)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.binary.codec.write_value(value, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        self.binary.codec.read_value(input)
    }
}

/// Uses a different encoding on the binary side than on the textual side.
/// This crate only interprets the binary half; the textual half still
/// participates in shape checks so that compositions stay consistent across
/// both interpretations.
pub fn splitted<T: 'static>(
    binary: Encoding<T>,
    text: Encoding<T>,
) -> Encoding<T> {
    let obj = binary.codec.is_obj() && text.codec.is_obj();
    let tup = binary.codec.is_tup() && text.codec.is_tup();
    Encoding::from_codec(SplittedCodec { binary, obj, tup })
}

struct DynamicSizeCodec<T> {
    width: SizeWidth,
    inner: Encoding<T>,
}

impl<T: 'static> Codec<T> for DynamicSizeCodec<T> {
    fn kind(&self) -> Kind {
        Kind::Dynamic
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::DynSize {
            width: self.width,
            max: None,
            inner: self.inner.codec.scan_plan(),
        })
    }

    fn is_obj(&self) -> bool {
        self.inner.codec.is_obj()
    }

    fn is_tup(&self) -> bool {
        self.inner.codec.is_tup()
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        Ok(self.width.num_bytes() + self.inner.codec.encoded_len(value)?)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        let header = out.reserve(self.width.num_bytes())?;
        let start = out.offset();
        self.inner.codec.write_value(value, out)?;

        let length = out.offset() - start;
        if length > self.width.max_value() {
            return Err(WriteError::SizeLimitExceeded);
        }
        out.patch_be(header, self.width.num_bytes(), length as u64);
        Ok(())
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        let size = match self.width {
            SizeWidth::Uint8 => input.read_u8()? as usize,
            SizeWidth::Uint16 => input.read_u16()? as usize,
            SizeWidth::Uint30 => {
                let raw = input.read_i32()?;
                if raw < 0 {
                    return Err(ReadError::InvalidSize(raw as i64));
                }
                raw as usize
            }
        };

        let saved = input.enter(size)?;
        let value = self.inner.codec.read_value(input)?;
        input.exit(saved)?;
        Ok(value)
    }
}

/// Prefixes `inner` with its own byte length so that the resulting encoding
/// is self delimiting regardless of what `inner` is.
pub fn dynamic_size<T: 'static>(
    width: SizeWidth,
    inner: Encoding<T>,
) -> Encoding<T> {
    Encoding::from_codec(DynamicSizeCodec { width, inner })
}

struct CheckSizeCodec<T> {
    limit: usize,
    inner: Encoding<T>,
}

impl<T: 'static> Codec<T> for CheckSizeCodec<T> {
    fn kind(&self) -> Kind {
        self.inner.codec.kind()
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::SizeCap {
            limit: self.limit,
            inner: self.inner.codec.scan_plan(),
        })
    }

    fn is_obj(&self) -> bool {
        self.inner.codec.is_obj()
    }

    fn is_tup(&self) -> bool {
        self.inner.codec.is_tup()
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        let length = self.inner.codec.encoded_len(value)?;
        if length > self.limit {
            return Err(WriteError::SizeLimitExceeded);
        }
        Ok(length)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        // Sizing first keeps the failure independent of the output buffer.
        self.encoded_len(value)?;
        self.inner.codec.write_value(value, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        let (saved, capped) = input.cap(self.limit);
        let result = self.inner.codec.read_value(input);
        input.uncap(saved);

        match result {
            // The cap was the binding constraint, so running out of data
            // means the value would have been larger than allowed.
            Err(ReadError::NotEnoughData) if capped => Err(ReadError::SizeLimitExceeded),
            other => other,
        }
    }
}

/// Refuses to write or read any value whose serialized form exceeds `limit`
/// bytes.
pub fn check_size<T: 'static>(limit: usize, inner: Encoding<T>) -> Encoding<T> {
    Encoding::from_codec(CheckSizeCodec { limit, inner })
}

struct PaddedCodec<T> {
    inner: Encoding<T>,
    inner_size: usize,
    padding: usize,
}

impl<T: 'static> Codec<T> for PaddedCodec<T> {
    fn kind(&self) -> Kind {
        Kind::Fixed(self.inner_size + self.padding)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Group {
            parts: vec![
                self.inner.codec.scan_plan(),
                Arc::new(ScanPlan::Bytes(self.padding)),
            ],
            var_index: None,
            trailing_fixed: 0,
        })
    }

    fn encoded_len(&self, _value: &T) -> WriteResult<usize> {
        Ok(self.inner_size + self.padding)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.inner.codec.write_value(value, out)?;
        out.write_zeros(self.padding)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        let value = self.inner.codec.read_value(input)?;
        input.skip(self.padding)?;
        Ok(value)
    }
}

/// Appends `padding` zero bytes after a fixed size encoding.
pub fn padded<T: 'static>(
    inner: Encoding<T>,
    padding: usize,
) -> Result<Encoding<T>> {
    let inner_size = match inner.classify() {
        Kind::Fixed(n) => n,
        kind => {
            return Err(format_err!(
                "Only fixed size encodings can be padded, got {:?}",
                kind
            ));
        }
    };

    Ok(Encoding::from_codec(PaddedCodec {
        inner,
        inner_size,
        padding,
    }))
}
