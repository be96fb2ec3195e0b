//! Arbitrary precision integers as little-endian groups of seven value bits
//! per byte, high bit flagging continuation. Signed values store their sign
//! in bit 6 of the first byte, leaving that byte six value bits.

use std::sync::Arc;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

use crate::encoding::{Codec, Encoding};
use crate::error::{ReadError, ReadResult, WriteResult};
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::stream::ScanPlan;
use crate::writer::WriteState;

fn low_bits(value: &BigUint, mask: u32) -> u8 {
    (value.iter_u32_digits().next().unwrap_or(0) & mask) as u8
}

fn group_count(num_bits: u64, first_byte_bits: u64) -> usize {
    if num_bits <= first_byte_bits {
        1
    } else {
        1 + ((num_bits - first_byte_bits) as usize + 6) / 7
    }
}

fn write_groups(
    mut rest: BigUint,
    mut first: u8,
    out: &mut WriteState,
) -> WriteResult<()> {
    if !rest.is_zero() {
        first |= 0x80;
    }
    out.write_u8(first)?;

    while !rest.is_zero() {
        let mut byte = low_bits(&rest, 0x7f);
        rest >>= 7usize;
        if !rest.is_zero() {
            byte |= 0x80;
        }
        out.write_u8(byte)?;
    }
    Ok(())
}

/// Reads continuation groups after the first byte, shifting them in above
/// the `shift` bits already consumed.
fn read_groups(
    mut magnitude: BigUint,
    mut shift: u64,
    continued: bool,
    input: &mut ReadState,
) -> ReadResult<BigUint> {
    let mut more = continued;
    while more {
        let byte = input.read_u8()?;
        more = byte & 0x80 != 0;
        if !more && byte == 0 {
            return Err(ReadError::TrailingZero);
        }

        magnitude |= BigUint::from((byte & 0x7f) as u32) << shift;
        shift += 7;
    }
    Ok(magnitude)
}

struct ZCodec;

impl Codec<BigInt> for ZCodec {
    fn kind(&self) -> Kind {
        Kind::Dynamic
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Varint)
    }

    fn encoded_len(&self, value: &BigInt) -> WriteResult<usize> {
        Ok(group_count(value.magnitude().bits(), 6))
    }

    fn write_value(&self, value: &BigInt, out: &mut WriteState) -> WriteResult<()> {
        let magnitude = value.magnitude();

        let mut first = low_bits(magnitude, 0x3f);
        if value.sign() == Sign::Minus {
            first |= 0x40;
        }

        write_groups(magnitude >> 6usize, first, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<BigInt> {
        let first = input.read_u8()?;
        let negative = first & 0x40 != 0;

        let magnitude = read_groups(
            BigUint::from((first & 0x3f) as u32),
            6,
            first & 0x80 != 0,
            input,
        )?;

        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(BigInt::from_biguint(sign, magnitude))
    }
}

/// Arbitrary precision signed integer.
pub fn z() -> Encoding<BigInt> {
    Encoding::from_codec(ZCodec)
}

struct NCodec;

impl Codec<BigUint> for NCodec {
    fn kind(&self) -> Kind {
        Kind::Dynamic
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Varint)
    }

    fn encoded_len(&self, value: &BigUint) -> WriteResult<usize> {
        Ok(group_count(value.bits(), 7))
    }

    fn write_value(&self, value: &BigUint, out: &mut WriteState) -> WriteResult<()> {
        write_groups(value >> 7usize, low_bits(value, 0x7f), out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<BigUint> {
        let first = input.read_u8()?;
        read_groups(
            BigUint::from((first & 0x7f) as u32),
            7,
            first & 0x80 != 0,
            input,
        )
    }
}

/// Arbitrary precision non-negative integer.
pub fn n() -> Encoding<BigUint> {
    Encoding::from_codec(NCodec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z_of(value: i64) -> BigInt {
        BigInt::from(value)
    }

    #[test]
    fn z_small_values_test() {
        assert_eq!(z().to_bytes(&z_of(0)).unwrap(), vec![0x00]);
        assert_eq!(z().to_bytes(&z_of(1)).unwrap(), vec![0x01]);
        assert_eq!(z().to_bytes(&z_of(-1)).unwrap(), vec![0x41]);
        assert_eq!(z().to_bytes(&z_of(63)).unwrap(), vec![0x3f]);
        assert_eq!(z().to_bytes(&z_of(64)).unwrap(), vec![0x80, 0x01]);
    }

    #[test]
    fn z_negative_test() {
        // -300: magnitude 0b100101100, six low bits then the rest.
        let data = z().to_bytes(&z_of(-300)).unwrap();
        assert_eq!(&data, &[0xec, 0x04]);
        assert_eq!(z().of_bytes(&data).unwrap(), z_of(-300));
    }

    #[test]
    fn z_roundtrip_test() {
        let values = [0i64, 1, -1, 63, 64, -64, 65, 300, -300, i64::MAX, i64::MIN + 1];
        for v in values {
            let value = z_of(v);
            let data = z().to_bytes(&value).unwrap();
            assert_eq!(z().length(&value).unwrap(), data.len());
            assert_eq!(z().of_bytes(&data).unwrap(), value);
        }

        let huge = BigInt::from(7) << 200;
        let data = z().to_bytes(&huge).unwrap();
        assert_eq!(z().of_bytes(&data).unwrap(), huge);
    }

    #[test]
    fn z_trailing_zero_test() {
        // 0x80 0x00 spells zero with a useless continuation byte.
        assert_eq!(z().of_bytes(&[0x80, 0x00]), Err(ReadError::TrailingZero));
        assert_eq!(z().of_bytes(&[0xc1, 0x80, 0x00]), Err(ReadError::TrailingZero));
        // A single zero byte is the canonical zero.
        assert_eq!(z().of_bytes(&[0x00]).unwrap(), z_of(0));
    }

    #[test]
    fn z_truncated_test() {
        assert_eq!(z().of_bytes(&[0x80]), Err(ReadError::NotEnoughData));
    }

    #[test]
    fn n_test() {
        assert_eq!(n().to_bytes(&BigUint::from(0u32)).unwrap(), vec![0x00]);
        assert_eq!(n().to_bytes(&BigUint::from(127u32)).unwrap(), vec![0x7f]);
        assert_eq!(n().to_bytes(&BigUint::from(128u32)).unwrap(), vec![0x80, 0x01]);

        let values = [0u64, 1, 127, 128, 300, 16384, u64::MAX];
        for v in values {
            let value = BigUint::from(v);
            let data = n().to_bytes(&value).unwrap();
            assert_eq!(n().length(&value).unwrap(), data.len());
            assert_eq!(n().of_bytes(&data).unwrap(), value);
        }

        assert_eq!(n().of_bytes(&[0x80, 0x00]), Err(ReadError::TrailingZero));
    }
}
