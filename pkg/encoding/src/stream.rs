//! Incremental reading over a sequence of byte chunks.
//!
//! The descriptor tree is mirrored by a type erased scan plan. An explicit
//! stack machine runs over that plan to locate the end of the next value,
//! suspending whenever the chunks received so far run out; once the full
//! span is known the one shot reader decodes it. Suspension therefore never
//! needs to capture half built values, only the scanner stack.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;

use crate::encoding::Encoding;
use crate::error::ReadError;
use crate::errors::*;
use crate::size::SizeWidth;
use crate::union::TagSize;

pub(crate) enum ScanPlan {
    /// A run of content bytes of known width.
    Bytes(usize),
    /// Little-endian continuation groups, ending at the first byte without
    /// the high bit.
    Varint,
    /// Everything left in the current context.
    Remainder,
    /// One presence byte, then the payload if it was 1.
    OptFlag(Arc<ScanPlan>),
    /// Payload present exactly when the context is not yet exhausted.
    OptTail(Arc<ScanPlan>),
    /// Elements until the context is exhausted.
    Seq {
        element: Arc<ScanPlan>,
        max_length: Option<usize>,
        array: bool,
    },
    /// Consecutive parts, with at most one variable part that ends where the
    /// summed width of the fixed parts after it begins.
    Group {
        parts: Vec<Arc<ScanPlan>>,
        var_index: Option<usize>,
        trailing_fixed: usize,
    },
    /// A tag selecting which case plan follows.
    TagSelect {
        size: TagSize,
        cases: Vec<(u16, Arc<ScanPlan>)>,
    },
    /// An enum index that must address one of `count` cases.
    EnumIndex { width: SizeWidth, count: usize },
    /// A size header framing the inner plan.
    DynSize {
        width: SizeWidth,
        max: Option<usize>,
        inner: Arc<ScanPlan>,
    },
    /// The inner plan may consume at most `limit` bytes.
    SizeCap { limit: usize, inner: Arc<ScanPlan> },
    /// Resolved on first use; breaks cycles in recursive plans.
    Defer(Arc<dyn Fn() -> Arc<ScanPlan> + Send + Sync>),
}

enum Frame {
    Scan(Arc<ScanPlan>),
    EndContext {
        end: usize,
        saved_limit: usize,
    },
    EndCap {
        saved_limit: usize,
        capped: bool,
        cap_end: usize,
    },
    SeqNext {
        element: Arc<ScanPlan>,
        max_length: Option<usize>,
        array: bool,
        count: usize,
    },
    ShrinkTail(usize),
    GrowTail(usize),
}

enum ScanOutcome {
    /// The value ends at this absolute position.
    Done(usize),
    /// More chunks are needed to make progress.
    More,
    Failed(ReadError),
}

struct Scanner {
    frames: Vec<Frame>,
    pos: usize,
    limit: usize,
}

impl Scanner {
    fn new(root: Arc<ScanPlan>) -> Self {
        Self {
            frames: vec![Frame::Scan(root)],
            pos: 0,
            limit: usize::MAX,
        }
    }

    /// Error for an atom crossing the current context limit: running into a
    /// size cap is a size violation, running into a real frame end means the
    /// framed bytes cannot hold the value they claim to.
    fn out_of_context(&self) -> ReadError {
        for frame in &self.frames {
            if let Frame::EndCap {
                capped: true,
                cap_end,
                ..
            } = frame
            {
                if *cap_end == self.limit {
                    return ReadError::SizeLimitExceeded;
                }
            }
        }
        ReadError::NotEnoughData
    }

    fn run(&mut self, data: &ChunkQueue) -> ScanOutcome {
        let avail = data.len();

        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::Scan(plan) => match plan.as_ref() {
                    ScanPlan::Bytes(width) => {
                        let width = *width;
                        if self.pos + width > self.limit {
                            return ScanOutcome::Failed(self.out_of_context());
                        }
                        if self.pos + width > avail {
                            self.frames.push(Frame::Scan(plan.clone()));
                            return ScanOutcome::More;
                        }
                        self.pos += width;
                    }

                    ScanPlan::Varint => {
                        let mut index = self.pos;
                        loop {
                            if index >= self.limit {
                                return ScanOutcome::Failed(self.out_of_context());
                            }
                            let byte = match data.byte_at(index) {
                                Some(byte) => byte,
                                None => {
                                    self.frames.push(Frame::Scan(plan.clone()));
                                    return ScanOutcome::More;
                                }
                            };

                            index += 1;
                            if byte & 0x80 == 0 {
                                if byte == 0 && index - self.pos > 1 {
                                    return ScanOutcome::Failed(ReadError::TrailingZero);
                                }
                                self.pos = index;
                                break;
                            }
                        }
                    }

                    ScanPlan::Remainder => {
                        if self.limit > avail {
                            self.frames.push(Frame::Scan(plan.clone()));
                            return ScanOutcome::More;
                        }
                        self.pos = self.limit;
                    }

                    ScanPlan::OptFlag(inner) => {
                        if self.pos >= self.limit {
                            return ScanOutcome::Failed(self.out_of_context());
                        }
                        if self.pos >= avail {
                            self.frames.push(Frame::Scan(plan.clone()));
                            return ScanOutcome::More;
                        }

                        let flag = data.byte_at(self.pos).unwrap();
                        self.pos += 1;
                        match flag {
                            0 => {}
                            1 => self.frames.push(Frame::Scan(inner.clone())),
                            other => {
                                return ScanOutcome::Failed(ReadError::UnexpectedTag(
                                    other as u32,
                                ));
                            }
                        }
                    }

                    ScanPlan::OptTail(inner) => {
                        if self.pos < self.limit {
                            self.frames.push(Frame::Scan(inner.clone()));
                        }
                    }

                    ScanPlan::Seq {
                        element,
                        max_length,
                        array,
                    } => {
                        self.frames.push(Frame::SeqNext {
                            element: element.clone(),
                            max_length: *max_length,
                            array: *array,
                            count: 0,
                        });
                    }

                    ScanPlan::Group {
                        parts,
                        var_index,
                        trailing_fixed,
                    } => {
                        for (index, part) in parts.iter().enumerate().rev() {
                            if Some(index) == *var_index && *trailing_fixed > 0 {
                                self.frames.push(Frame::GrowTail(*trailing_fixed));
                                self.frames.push(Frame::Scan(part.clone()));
                                self.frames.push(Frame::ShrinkTail(*trailing_fixed));
                            } else {
                                self.frames.push(Frame::Scan(part.clone()));
                            }
                        }
                    }

                    ScanPlan::TagSelect { size, cases } => {
                        let width = size.num_bytes();
                        if self.pos + width > self.limit {
                            return ScanOutcome::Failed(self.out_of_context());
                        }
                        if self.pos + width > avail {
                            self.frames.push(Frame::Scan(plan.clone()));
                            return ScanOutcome::More;
                        }

                        let tag = data.read_be(self.pos, width).unwrap() as u16;
                        match cases.iter().find(|(t, _)| *t == tag) {
                            Some((_, case_plan)) => {
                                self.pos += width;
                                self.frames.push(Frame::Scan(case_plan.clone()));
                            }
                            None => {
                                return ScanOutcome::Failed(ReadError::UnexpectedTag(
                                    tag as u32,
                                ));
                            }
                        }
                    }

                    ScanPlan::EnumIndex { width, count } => {
                        let num_bytes = width.num_bytes();
                        if self.pos + num_bytes > self.limit {
                            return ScanOutcome::Failed(self.out_of_context());
                        }
                        if self.pos + num_bytes > avail {
                            self.frames.push(Frame::Scan(plan.clone()));
                            return ScanOutcome::More;
                        }

                        let index = data.read_be(self.pos, num_bytes).unwrap();
                        if index as usize >= *count {
                            return ScanOutcome::Failed(ReadError::UnexpectedTag(
                                index as u32,
                            ));
                        }
                        self.pos += num_bytes;
                    }

                    ScanPlan::DynSize { width, max, inner } => {
                        let num_bytes = width.num_bytes();
                        if self.pos + num_bytes > self.limit {
                            return ScanOutcome::Failed(self.out_of_context());
                        }
                        if self.pos + num_bytes > avail {
                            self.frames.push(Frame::Scan(plan.clone()));
                            return ScanOutcome::More;
                        }

                        let raw = data.read_be(self.pos, num_bytes).unwrap();
                        let size = match width {
                            SizeWidth::Uint30 => {
                                let signed = raw as u32 as i32;
                                if signed < 0 {
                                    return ScanOutcome::Failed(ReadError::InvalidSize(
                                        signed as i64,
                                    ));
                                }
                                signed as usize
                            }
                            _ => raw as usize,
                        };

                        if let Some(max) = max {
                            if size > *max {
                                return ScanOutcome::Failed(ReadError::InvalidSize(
                                    size as i64,
                                ));
                            }
                        }

                        self.pos += num_bytes;
                        if self.pos + size > self.limit {
                            return ScanOutcome::Failed(self.out_of_context());
                        }

                        self.frames.push(Frame::EndContext {
                            end: self.pos + size,
                            saved_limit: self.limit,
                        });
                        self.limit = self.pos + size;
                        self.frames.push(Frame::Scan(inner.clone()));
                    }

                    ScanPlan::SizeCap { limit, inner } => {
                        let cap_end =
                            std::cmp::min(self.limit, self.pos.saturating_add(*limit));
                        self.frames.push(Frame::EndCap {
                            saved_limit: self.limit,
                            capped: cap_end < self.limit,
                            cap_end,
                        });
                        self.limit = cap_end;
                        self.frames.push(Frame::Scan(inner.clone()));
                    }

                    ScanPlan::Defer(resolve) => {
                        self.frames.push(Frame::Scan(resolve()));
                    }
                },

                Frame::EndContext { end, saved_limit } => {
                    if self.pos != end {
                        return ScanOutcome::Failed(ReadError::ExtraBytes);
                    }
                    self.limit = saved_limit;
                }

                Frame::EndCap { saved_limit, .. } => {
                    self.limit = saved_limit;
                }

                Frame::SeqNext {
                    element,
                    max_length,
                    array,
                    count,
                } => {
                    if self.pos < self.limit {
                        if let Some(max) = max_length {
                            if count == max {
                                return ScanOutcome::Failed(if array {
                                    ReadError::ArrayTooLong
                                } else {
                                    ReadError::ListTooLong
                                });
                            }
                        }

                        self.frames.push(Frame::SeqNext {
                            element: element.clone(),
                            max_length,
                            array,
                            count: count + 1,
                        });
                        self.frames.push(Frame::Scan(element));
                    }
                }

                Frame::ShrinkTail(num_bytes) => {
                    if self.pos + num_bytes > self.limit {
                        return ScanOutcome::Failed(self.out_of_context());
                    }
                    self.limit -= num_bytes;
                }

                Frame::GrowTail(num_bytes) => {
                    self.limit += num_bytes;
                }
            }
        }

        ScanOutcome::Done(self.pos)
    }
}

struct ChunkQueue {
    chunks: VecDeque<Bytes>,
    total: usize,
}

impl ChunkQueue {
    fn new(initial: Vec<Bytes>) -> Self {
        let mut queue = Self {
            chunks: VecDeque::new(),
            total: 0,
        };
        for chunk in initial {
            queue.push(chunk);
        }
        queue
    }

    fn push(&mut self, chunk: Bytes) {
        self.total += chunk.len();
        self.chunks.push_back(chunk);
    }

    fn len(&self) -> usize {
        self.total
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        let mut start = 0;
        for chunk in &self.chunks {
            if pos < start + chunk.len() {
                return Some(chunk[pos - start]);
            }
            start += chunk.len();
        }
        None
    }

    fn read_be(&self, pos: usize, num_bytes: usize) -> Option<u64> {
        let mut value = 0u64;
        for i in 0..num_bytes {
            value = (value << 8) | self.byte_at(pos + i)? as u64;
        }
        Some(value)
    }

    /// Copies the first `end` buffered bytes into one contiguous buffer.
    fn prefix(&self, end: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(end);
        for chunk in &self.chunks {
            if out.len() >= end {
                break;
            }
            let take = std::cmp::min(chunk.len(), end - out.len());
            out.extend_from_slice(&chunk[..take]);
        }
        out
    }

    /// Chunks holding everything after the first `consumed` bytes, slicing
    /// the chunk the boundary falls into.
    fn split_off(&self, consumed: usize) -> Vec<Bytes> {
        let mut out = vec![];
        let mut start = 0;
        for chunk in &self.chunks {
            let end = start + chunk.len();
            if end > consumed {
                if start >= consumed {
                    out.push(chunk.clone());
                } else {
                    out.push(chunk.slice((consumed - start)..));
                }
            }
            start = end;
        }
        out
    }
}

/// Outcome of feeding chunks to an incremental read.
pub enum StreamStatus<T, R> {
    /// A whole value was parsed. `consumed` counts the bytes it occupied;
    /// `remaining` holds the unread tail of the fed chunks.
    Success {
        value: T,
        consumed: usize,
        remaining: Vec<Bytes>,
    },
    /// More input is needed; feed the carrier another chunk to continue.
    Await(R),
    Error(ReadError),
}

impl<T: std::fmt::Debug, R> StreamStatus<T, R> {
    /// The continuation of an `Await`, for driving a stream in tests or
    /// loops that know more input is coming.
    pub fn awaiting(self) -> Result<R> {
        match self {
            StreamStatus::Await(reader) => Ok(reader),
            StreamStatus::Success { value, .. } => {
                Err(format_err!("Stream finished early: {:?}", value))
            }
            StreamStatus::Error(error) => Err(error.into()),
        }
    }
}

/// In flight incremental read, returned inside [`StreamStatus::Await`].
pub struct StreamReader<T> {
    encoding: Encoding<T>,
    scanner: Scanner,
    queue: ChunkQueue,
}

impl<T: 'static> StreamReader<T> {
    fn advance(mut self) -> StreamStatus<T, Self> {
        match self.scanner.run(&self.queue) {
            ScanOutcome::More => StreamStatus::Await(self),
            ScanOutcome::Failed(error) => StreamStatus::Error(error),
            ScanOutcome::Done(end) => {
                let buffer = self.queue.prefix(end);
                match self.encoding.of_bytes(&buffer) {
                    Ok(value) => StreamStatus::Success {
                        value,
                        consumed: end,
                        remaining: self.queue.split_off(end),
                    },
                    Err(error) => StreamStatus::Error(error),
                }
            }
        }
    }

    pub fn push(mut self, chunk: Bytes) -> StreamStatus<T, Self> {
        self.queue.push(chunk);
        self.advance()
    }
}

/// Like [`StreamReader`] but never builds the value.
pub struct StreamChecker<T> {
    // Keeps recursive plans alive while the scanner holds weak references
    // into them.
    _encoding: Encoding<T>,
    scanner: Scanner,
    queue: ChunkQueue,
}

impl<T: 'static> StreamChecker<T> {
    fn advance(mut self) -> StreamStatus<(), Self> {
        match self.scanner.run(&self.queue) {
            ScanOutcome::More => StreamStatus::Await(self),
            ScanOutcome::Failed(error) => StreamStatus::Error(error),
            ScanOutcome::Done(end) => StreamStatus::Success {
                value: (),
                consumed: end,
                remaining: self.queue.split_off(end),
            },
        }
    }

    pub fn push(mut self, chunk: Bytes) -> StreamStatus<(), Self> {
        self.queue.push(chunk);
        self.advance()
    }
}

fn check_streamable<T: 'static>(encoding: &Encoding<T>) -> Result<()> {
    if encoding.classify().is_variable() {
        return Err(err_msg(
            "Variable length encodings have no end of their own and cannot \
             be read incrementally",
        ));
    }
    Ok(())
}

/// Starts an incremental read of one value. Returns `Await` until the fed
/// chunks cover the whole value.
pub fn read_stream<T: 'static>(
    encoding: &Encoding<T>,
    initial: Vec<Bytes>,
) -> Result<StreamStatus<T, StreamReader<T>>> {
    check_streamable(encoding)?;

    let reader = StreamReader {
        scanner: Scanner::new(encoding.codec.scan_plan()),
        encoding: encoding.clone(),
        queue: ChunkQueue::new(initial),
    };
    Ok(reader.advance())
}

/// Validates the structure of one value without building it. Conversion
/// callbacks never run.
pub fn check_stream<T: 'static>(
    encoding: &Encoding<T>,
    initial: Vec<Bytes>,
) -> Result<StreamStatus<(), StreamChecker<T>>> {
    check_streamable(encoding)?;

    let checker = StreamChecker {
        scanner: Scanner::new(encoding.codec.scan_plan()),
        _encoding: encoding.clone(),
        queue: ChunkQueue::new(initial),
    };
    Ok(checker.advance())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{string, uint16, uint8, variable_bytes};
    use crate::product::{obj2, req};
    use crate::seq::list;
    use proptest::prelude::*;

    fn message_encoding() -> Encoding<(u16, String)> {
        obj2(req("code", uint16()), req("message", string())).unwrap()
    }

    #[test]
    fn chunked_object_test() {
        let enc = message_encoding();

        let status = read_stream(&enc, vec![Bytes::from_static(&[0x01, 0x02, 0, 0])])
            .unwrap();
        let reader = status.awaiting().unwrap();

        let status = reader.push(Bytes::from_static(&[0, 2, 0x68]));
        let reader = status.awaiting().unwrap();

        match reader.push(Bytes::from_static(&[0x69])) {
            StreamStatus::Success {
                value,
                consumed,
                remaining,
            } => {
                assert_eq!(value, (0x0102, "hi".to_string()));
                assert_eq!(consumed, 8);
                assert!(remaining.is_empty());
            }
            _ => panic!("Expected a complete value"),
        }
    }

    #[test]
    fn all_at_once_test() {
        let enc = message_encoding();
        let data = enc.to_bytes(&(7, "ok".to_string())).unwrap();

        match read_stream(&enc, vec![Bytes::from(data)]).unwrap() {
            StreamStatus::Success { value, .. } => {
                assert_eq!(value, (7, "ok".to_string()));
            }
            _ => panic!("Expected a complete value"),
        }
    }

    #[test]
    fn remaining_chunks_test() {
        let enc = uint16();

        match read_stream(&enc, vec![Bytes::from_static(&[0, 5, 0xaa, 0xbb])]).unwrap() {
            StreamStatus::Success {
                value,
                consumed,
                remaining,
            } => {
                assert_eq!(value, 5);
                assert_eq!(consumed, 2);
                assert_eq!(remaining.len(), 1);
                assert_eq!(&remaining[0][..], &[0xaa, 0xbb]);
            }
            _ => panic!("Expected a complete value"),
        }
    }

    #[test]
    fn variable_rejected_test() {
        assert!(read_stream(&variable_bytes(), vec![]).is_err());
        assert!(check_stream(&variable_bytes(), vec![]).is_err());
    }

    #[test]
    fn check_stream_test() {
        let enc = message_encoding();
        let data = enc.to_bytes(&(1, "hello".to_string())).unwrap();

        let status = check_stream(&enc, vec![Bytes::from(data[..3].to_vec())]).unwrap();
        let checker = status.awaiting().unwrap();

        match checker.push(Bytes::from(data[3..].to_vec())) {
            StreamStatus::Success { consumed, .. } => assert_eq!(consumed, data.len()),
            _ => panic!("Expected a structurally valid value"),
        }
    }

    #[test]
    fn stream_error_test() {
        let enc = list(uint8()).unwrap();

        // A negative size header fails as soon as it is visible.
        match read_stream(&enc, vec![Bytes::from_static(&[0xff, 0xff, 0xff, 0xff])])
            .unwrap()
        {
            StreamStatus::Error(ReadError::InvalidSize(-1)) => {}
            _ => panic!("Expected an invalid size"),
        }
    }

    #[test]
    fn stream_trailing_zero_test() {
        let enc = crate::varint::z();

        match read_stream(&enc, vec![Bytes::from_static(&[0x80, 0x00])]).unwrap() {
            StreamStatus::Error(ReadError::TrailingZero) => {}
            _ => panic!("Expected a trailing zero failure"),
        }
    }

    fn feed<T: std::fmt::Debug + PartialEq + 'static>(
        encoding: &Encoding<T>,
        chunks: Vec<Bytes>,
    ) -> StreamStatus<T, StreamReader<T>> {
        let mut status = read_stream(encoding, vec![]).unwrap();
        for chunk in chunks {
            status = match status {
                StreamStatus::Await(reader) => reader.push(chunk),
                done => return done,
            };
        }
        status
    }

    proptest! {
        #[test]
        fn stream_split_equivalence_test(
            code in any::<u16>(),
            message in ".{0,12}",
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
        ) {
            let enc = message_encoding();
            let value = (code, message);
            let data = enc.to_bytes(&value).unwrap();

            let mut positions: Vec<usize> =
                cuts.iter().map(|i| i.index(data.len())).collect();
            positions.sort_unstable();
            positions.dedup();

            let mut chunks = vec![];
            let mut start = 0;
            for position in positions {
                chunks.push(Bytes::from(data[start..position].to_vec()));
                start = position;
            }
            chunks.push(Bytes::from(data[start..].to_vec()));

            match feed(&enc, chunks) {
                StreamStatus::Success { value: parsed, consumed, remaining } => {
                    prop_assert_eq!(parsed, value);
                    prop_assert_eq!(consumed, data.len());
                    prop_assert!(remaining.iter().all(|c| c.is_empty()));
                }
                _ => prop_assert!(false, "stream did not complete"),
            }
        }
    }
}
