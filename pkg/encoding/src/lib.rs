//! Combinators describing both a compact binary wire format and the host
//! types it maps to. One descriptor drives exact length computation,
//! serialization, one shot parsing, and incremental parsing, all agreeing on
//! the same value space.
//!
//! The format is tagless: no type information is written beyond the tags and
//! size headers a descriptor explicitly introduces, so the descriptor itself
//! is required to make sense of the bytes.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate lazy_static;

pub mod errors;

mod encoding;
mod error;
mod kind;
mod primitives;
mod product;
mod reader;
mod recursive;
mod seq;
mod size;
mod stream;
mod union;
mod varint;
mod writer;

pub use crate::encoding::{
    check_size, conv, def, describe, dynamic_size, padded, splitted, Documentation, Encoding,
};
pub use crate::error::{
    read_error_encoding, write_error_encoding, ReadError, ReadResult, WriteError, WriteResult,
};
pub use crate::kind::Kind;
pub use crate::primitives::{
    boolean, bounded_bytes, bounded_string, bytes, constant, empty, fixed_bytes, fixed_string,
    float, ignore, int16, int31, int32, int64, int8, null, ranged_float, ranged_int, string,
    string_enum, uint16, uint8, variable_bytes, variable_string,
};
pub use crate::product::{
    dft, merge_objs, merge_tups, obj1, obj10, obj2, obj3, obj4, obj5, obj6, obj7, obj8, obj9,
    opt, option, req, tup1, tup10, tup2, tup3, tup4, tup5, tup6, tup7, tup8, tup9, Field,
};
pub use crate::recursive::{delayed, mu};
pub use crate::seq::{array, bounded_array, bounded_list, list, variable_array, variable_list};
pub use crate::size::SizeWidth;
pub use crate::stream::{check_stream, read_stream, StreamChecker, StreamReader, StreamStatus};
pub use crate::union::{case, result, union, Case, CaseTag, TagSize};
pub use crate::varint::{n, z};

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        id: u16,
        label: String,
        balance: BigInt,
        tags: Vec<u8>,
    }

    fn record_encoding() -> Encoding<Record> {
        conv(
            |r: &Record| (r.id, r.label.clone(), r.balance.clone(), r.tags.clone()),
            |(id, label, balance, tags)| Record {
                id,
                label,
                balance,
                tags,
            },
            obj4(
                req("id", uint16()),
                req("label", string()),
                req("balance", z()),
                req("tags", list(uint8()).unwrap()),
            )
            .unwrap(),
        )
    }

    fn record_strategy() -> impl Strategy<Value = Record> {
        (
            any::<u16>(),
            ".{0,16}",
            any::<i64>(),
            proptest::collection::vec(any::<u8>(), 0..16),
        )
            .prop_map(|(id, label, balance, tags)| Record {
                id,
                label,
                balance: BigInt::from(balance),
                tags,
            })
    }

    proptest! {
        #[test]
        fn roundtrip_test(record in record_strategy()) {
            let enc = record_encoding();
            let data = enc.to_bytes(&record).unwrap();

            // Length agreement and the exact roundtrip.
            prop_assert_eq!(enc.length(&record).unwrap(), data.len());
            prop_assert_eq!(enc.of_bytes(&data).unwrap(), record);
        }

        #[test]
        fn extra_byte_rejection_test(record in record_strategy()) {
            let enc = record_encoding();
            let mut data = enc.to_bytes(&record).unwrap();
            data.push(0x00);
            prop_assert_eq!(enc.of_bytes(&data), Err(ReadError::ExtraBytes));
        }

        #[test]
        fn fixed_classification_test(a in any::<i8>(), b in any::<u16>()) {
            let enc = tup2(int8(), uint16()).unwrap();
            let kind = enc.classify();
            prop_assert_eq!(kind, Kind::Fixed(3));

            let data = enc.to_bytes(&(a, b)).unwrap();
            prop_assert_eq!(data.len(), 3);
        }

        #[test]
        fn z_canonical_test(value in any::<i64>()) {
            let value = BigInt::from(value);
            let data = z().to_bytes(&value).unwrap();
            prop_assert_eq!(z().of_bytes(&data).unwrap(), value);

            // Appending a continuation-zero never yields a longer valid form.
            let mut padded_form = data.clone();
            let last = padded_form.len() - 1;
            padded_form[last] |= 0x80;
            padded_form.push(0x00);
            prop_assert_eq!(z().of_bytes(&padded_form), Err(ReadError::TrailingZero));
        }
    }

    #[test]
    fn write_at_offset_test() {
        let enc = record_encoding();
        let record = Record {
            id: 3,
            label: "x".to_string(),
            balance: BigInt::from(-7),
            tags: vec![1],
        };

        let length = enc.length(&record).unwrap();
        let mut buf = vec![0xee; length + 4];
        let end = enc.write(&record, &mut buf, 2).unwrap();
        assert_eq!(end, 2 + length);

        let (consumed, parsed) = enc.read(&buf, 2, length).unwrap();
        assert_eq!(consumed, length);
        assert_eq!(parsed, record);
    }

    #[test]
    fn fixed_length_test() {
        assert_eq!(tup2(int8(), uint16()).unwrap().fixed_length(), Some(3));
        assert_eq!(string().fixed_length(), None);
    }
}
