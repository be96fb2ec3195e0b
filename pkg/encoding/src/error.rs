//! Failures reported by the binary interpreters.
//!
//! Both error types are plain data and are themselves encodable, so a failure
//! produced on one side of a wire can be shipped across it with the same
//! machinery that produced it.

use failure::Fail;

use crate::encoding::Encoding;
use crate::primitives::{empty, float, int32, int64};
use crate::product::{obj2, obj3, req};
use crate::union::{case, union, Case, CaseTag, TagSize};

pub type ReadResult<T> = std::result::Result<T, ReadError>;
pub type WriteResult<T> = std::result::Result<T, WriteError>;

/// Reasons a byte sequence can fail to decode.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum ReadError {
    /// The current context holds fewer bytes than the next atom needs.
    NotEnoughData,
    /// A context was not fully consumed by its content.
    ExtraBytes,
    NoCaseMatched,
    /// A union tag, enum index, or option flag matched no known case.
    UnexpectedTag(u32),
    InvalidSize(i64),
    InvalidInt { min: i64, value: i64, max: i64 },
    InvalidFloat { min: f64, value: f64, max: f64 },
    /// A multi byte arbitrary precision integer ended in a zero byte.
    TrailingZero,
    SizeLimitExceeded,
    ListTooLong,
    ArrayTooLong,
    InvalidUtf8,
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::NotEnoughData => write!(f, "Not enough data"),
            ReadError::ExtraBytes => write!(f, "Extra bytes remaining"),
            ReadError::NoCaseMatched => write!(f, "No case matched"),
            ReadError::UnexpectedTag(tag) => write!(f, "Unexpected tag: {}", tag),
            ReadError::InvalidSize(size) => write!(f, "Invalid size: {}", size),
            ReadError::InvalidInt { min, value, max } => {
                write!(f, "Integer {} outside of range [{}, {}]", value, min, max)
            }
            ReadError::InvalidFloat { min, value, max } => {
                write!(f, "Float {} outside of range [{}, {}]", value, min, max)
            }
            ReadError::TrailingZero => write!(f, "Trailing zero in arbitrary precision integer"),
            ReadError::SizeLimitExceeded => write!(f, "Size limit exceeded"),
            ReadError::ListTooLong => write!(f, "List is too long"),
            ReadError::ArrayTooLong => write!(f, "Array is too long"),
            ReadError::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
        }
    }
}

/// Reasons a value can fail to serialize.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum WriteError {
    /// The produced bytes would exceed a size check or the output buffer.
    SizeLimitExceeded,
    NoCaseMatched,
    InvalidInt { min: i64, value: i64, max: i64 },
    InvalidFloat { min: f64, value: f64, max: f64 },
    InvalidBytesLength { expected: usize, found: usize },
    InvalidStringLength { expected: usize, found: usize },
    InvalidNatural,
    ListTooLong,
    ArrayTooLong,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::SizeLimitExceeded => write!(f, "Size limit exceeded"),
            WriteError::NoCaseMatched => write!(f, "No case matched"),
            WriteError::InvalidInt { min, value, max } => {
                write!(f, "Integer {} outside of range [{}, {}]", value, min, max)
            }
            WriteError::InvalidFloat { min, value, max } => {
                write!(f, "Float {} outside of range [{}, {}]", value, min, max)
            }
            WriteError::InvalidBytesLength { expected, found } => write!(
                f,
                "Expected bytes of length {} but got {}",
                expected, found
            ),
            WriteError::InvalidStringLength { expected, found } => write!(
                f,
                "Expected a string of length {} but got {}",
                expected, found
            ),
            WriteError::InvalidNatural => write!(f, "Natural number is negative"),
            WriteError::ListTooLong => write!(f, "List is too long"),
            WriteError::ArrayTooLong => write!(f, "Array is too long"),
        }
    }
}

fn unit_case<T: Clone + PartialEq + Send + Sync + 'static>(
    tag: u16,
    name: &str,
    value: T,
) -> Case<T> {
    let written = value.clone();
    case(
        CaseTag::Tag(tag),
        name,
        empty(),
        move |e: &T| if *e == written { Some(()) } else { None },
        move |()| value.clone(),
    )
}

fn int_range_encoding() -> crate::errors::Result<Encoding<(i64, i64, i64)>> {
    obj3(
        req("min", int64()),
        req("value", int64()),
        req("max", int64()),
    )
}

fn float_range_encoding() -> crate::errors::Result<Encoding<(f64, f64, f64)>> {
    obj3(req("min", float()), req("value", float()), req("max", float()))
}

fn length_mismatch_encoding() -> crate::errors::Result<Encoding<(i64, i64)>> {
    obj2(req("expected", int64()), req("found", int64()))
}

fn build_read_error_encoding() -> crate::errors::Result<Encoding<ReadError>> {
    union(
        TagSize::Uint8,
        vec![
            unit_case(0, "not_enough_data", ReadError::NotEnoughData),
            unit_case(1, "extra_bytes", ReadError::ExtraBytes),
            unit_case(2, "no_case_matched", ReadError::NoCaseMatched),
            case(
                CaseTag::Tag(3),
                "unexpected_tag",
                int32(),
                |e: &ReadError| match e {
                    ReadError::UnexpectedTag(tag) => Some(*tag as i32),
                    _ => None,
                },
                |tag| ReadError::UnexpectedTag(tag as u32),
            ),
            case(
                CaseTag::Tag(4),
                "invalid_size",
                int64(),
                |e: &ReadError| match e {
                    ReadError::InvalidSize(size) => Some(*size),
                    _ => None,
                },
                ReadError::InvalidSize,
            ),
            case(
                CaseTag::Tag(5),
                "invalid_int",
                int_range_encoding()?,
                |e: &ReadError| match e {
                    ReadError::InvalidInt { min, value, max } => Some((*min, *value, *max)),
                    _ => None,
                },
                |(min, value, max)| ReadError::InvalidInt { min, value, max },
            ),
            case(
                CaseTag::Tag(6),
                "invalid_float",
                float_range_encoding()?,
                |e: &ReadError| match e {
                    ReadError::InvalidFloat { min, value, max } => Some((*min, *value, *max)),
                    _ => None,
                },
                |(min, value, max)| ReadError::InvalidFloat { min, value, max },
            ),
            unit_case(7, "trailing_zero", ReadError::TrailingZero),
            unit_case(8, "size_limit_exceeded", ReadError::SizeLimitExceeded),
            unit_case(9, "list_too_long", ReadError::ListTooLong),
            unit_case(10, "array_too_long", ReadError::ArrayTooLong),
            unit_case(11, "invalid_utf8", ReadError::InvalidUtf8),
        ],
    )
}

fn build_write_error_encoding() -> crate::errors::Result<Encoding<WriteError>> {
    union(
        TagSize::Uint8,
        vec![
            unit_case(0, "size_limit_exceeded", WriteError::SizeLimitExceeded),
            unit_case(1, "no_case_matched", WriteError::NoCaseMatched),
            case(
                CaseTag::Tag(2),
                "invalid_int",
                int_range_encoding()?,
                |e: &WriteError| match e {
                    WriteError::InvalidInt { min, value, max } => Some((*min, *value, *max)),
                    _ => None,
                },
                |(min, value, max)| WriteError::InvalidInt { min, value, max },
            ),
            case(
                CaseTag::Tag(3),
                "invalid_float",
                float_range_encoding()?,
                |e: &WriteError| match e {
                    WriteError::InvalidFloat { min, value, max } => Some((*min, *value, *max)),
                    _ => None,
                },
                |(min, value, max)| WriteError::InvalidFloat { min, value, max },
            ),
            case(
                CaseTag::Tag(4),
                "invalid_bytes_length",
                length_mismatch_encoding()?,
                |e: &WriteError| match e {
                    WriteError::InvalidBytesLength { expected, found } => {
                        Some((*expected as i64, *found as i64))
                    }
                    _ => None,
                },
                |(expected, found)| WriteError::InvalidBytesLength {
                    expected: expected as usize,
                    found: found as usize,
                },
            ),
            case(
                CaseTag::Tag(5),
                "invalid_string_length",
                length_mismatch_encoding()?,
                |e: &WriteError| match e {
                    WriteError::InvalidStringLength { expected, found } => {
                        Some((*expected as i64, *found as i64))
                    }
                    _ => None,
                },
                |(expected, found)| WriteError::InvalidStringLength {
                    expected: expected as usize,
                    found: found as usize,
                },
            ),
            unit_case(6, "invalid_natural", WriteError::InvalidNatural),
            unit_case(7, "list_too_long", WriteError::ListTooLong),
            unit_case(8, "array_too_long", WriteError::ArrayTooLong),
        ],
    )
}

lazy_static! {
    static ref READ_ERROR_ENCODING: Encoding<ReadError> =
        build_read_error_encoding().unwrap();
    static ref WRITE_ERROR_ENCODING: Encoding<WriteError> =
        build_write_error_encoding().unwrap();
}

pub fn read_error_encoding() -> Encoding<ReadError> {
    READ_ERROR_ENCODING.clone()
}

pub fn write_error_encoding() -> Encoding<WriteError> {
    WRITE_ERROR_ENCODING.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_roundtrip_test() {
        let enc = read_error_encoding();

        let errors = vec![
            ReadError::NotEnoughData,
            ReadError::UnexpectedTag(300),
            ReadError::InvalidSize(-4),
            ReadError::InvalidInt { min: -5, value: 11, max: 10 },
            ReadError::TrailingZero,
            ReadError::InvalidUtf8,
        ];

        for error in errors {
            let data = enc.to_bytes(&error).unwrap();
            assert_eq!(enc.of_bytes(&data).unwrap(), error);
        }
    }

    #[test]
    fn write_error_roundtrip_test() {
        let enc = write_error_encoding();

        let errors = vec![
            WriteError::SizeLimitExceeded,
            WriteError::InvalidBytesLength { expected: 4, found: 7 },
            WriteError::InvalidStringLength { expected: 2, found: 0 },
            WriteError::InvalidNatural,
        ];

        for error in errors {
            let data = enc.to_bytes(&error).unwrap();
            assert_eq!(enc.of_bytes(&data).unwrap(), error);
        }
    }

    #[test]
    fn string_and_bytes_lengths_are_distinct_test() {
        // The two length mismatch errors share a payload shape but must not
        // collapse into one another across a roundtrip.
        let enc = write_error_encoding();

        let bytes_error = WriteError::InvalidBytesLength { expected: 1, found: 2 };
        let string_error = WriteError::InvalidStringLength { expected: 1, found: 2 };

        let a = enc.to_bytes(&bytes_error).unwrap();
        let b = enc.to_bytes(&string_error).unwrap();

        assert_ne!(a, b);
        assert_eq!(enc.of_bytes(&a).unwrap(), bytes_error);
        assert_eq!(enc.of_bytes(&b).unwrap(), string_error);
    }

    #[test]
    fn display_test() {
        assert_eq!(
            ReadError::InvalidInt { min: 0, value: 300, max: 255 }.to_string(),
            "Integer 300 outside of range [0, 255]"
        );
        assert_eq!(
            WriteError::InvalidStringLength { expected: 4, found: 2 }.to_string(),
            "Expected a string of length 4 but got 2"
        );
    }
}
