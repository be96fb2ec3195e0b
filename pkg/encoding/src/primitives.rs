use std::sync::Arc;

use crate::encoding::{dynamic_size, Codec, Encoding};
use crate::error::{ReadError, ReadResult, WriteError, WriteResult};
use crate::errors::*;
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::size::{self, IntWidth, SizeWidth};
use crate::stream::ScanPlan;
use crate::writer::WriteState;

macro_rules! scalar_codec {
    ($codec:ident, $ctor:ident, $ty:ty, $size:expr, $read:ident, $write:ident) => {
        struct $codec;

        impl Codec<$ty> for $codec {
            fn kind(&self) -> Kind {
                Kind::Fixed($size)
            }

            fn scan_plan(&self) -> Arc<ScanPlan> {
                Arc::new(ScanPlan::Bytes($size))
            }

            fn encoded_len(&self, _value: &$ty) -> WriteResult<usize> {
                Ok($size)
            }

            fn write_value(&self, value: &$ty, out: &mut WriteState) -> WriteResult<()> {
                out.$write(*value)
            }

            fn read_value(&self, input: &mut ReadState) -> ReadResult<$ty> {
                input.$read()
            }
        }

        pub fn $ctor() -> Encoding<$ty> {
            Encoding::from_codec($codec)
        }
    };
}

scalar_codec!(Int8Codec, int8, i8, size::INT8, read_i8, write_i8);
scalar_codec!(Uint8Codec, uint8, u8, size::UINT8, read_u8, write_u8);
scalar_codec!(Int16Codec, int16, i16, size::INT16, read_i16, write_i16);
scalar_codec!(Uint16Codec, uint16, u16, size::UINT16, read_u16, write_u16);
scalar_codec!(Int32Codec, int32, i32, size::INT32, read_i32, write_i32);
scalar_codec!(Int64Codec, int64, i64, size::INT64, read_i64, write_i64);
scalar_codec!(FloatCodec, float, f64, size::FLOAT64, read_f64, write_f64);

struct BoolCodec;

impl Codec<bool> for BoolCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(size::BOOLEAN)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(size::BOOLEAN))
    }

    fn encoded_len(&self, _value: &bool) -> WriteResult<usize> {
        Ok(size::BOOLEAN)
    }

    fn write_value(&self, value: &bool, out: &mut WriteState) -> WriteResult<()> {
        out.write_u8(if *value { 1 } else { 0 })
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<bool> {
        Ok(input.read_u8()? != 0)
    }
}

pub fn boolean() -> Encoding<bool> {
    Encoding::from_codec(BoolCodec)
}

struct Int31Codec;

impl Codec<i32> for Int31Codec {
    fn kind(&self) -> Kind {
        Kind::Fixed(size::INT31)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(size::INT31))
    }

    fn encoded_len(&self, _value: &i32) -> WriteResult<usize> {
        Ok(size::INT31)
    }

    fn write_value(&self, value: &i32, out: &mut WriteState) -> WriteResult<()> {
        if *value < size::MIN_INT31 || *value > size::MAX_INT31 {
            return Err(WriteError::InvalidInt {
                min: size::MIN_INT31 as i64,
                value: *value as i64,
                max: size::MAX_INT31 as i64,
            });
        }
        out.write_i32(*value)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<i32> {
        let value = input.read_i32()?;
        if value < size::MIN_INT31 || value > size::MAX_INT31 {
            return Err(ReadError::InvalidInt {
                min: size::MIN_INT31 as i64,
                value: value as i64,
                max: size::MAX_INT31 as i64,
            });
        }
        Ok(value)
    }
}

/// Signed integer restricted to `[-2^30, 2^30 - 1]`, stored in four bytes.
pub fn int31() -> Encoding<i32> {
    Encoding::from_codec(Int31Codec)
}

struct RangedIntCodec {
    min: i32,
    max: i32,
    width: IntWidth,
}

impl RangedIntCodec {
    fn offset(&self) -> i64 {
        if self.min > 0 {
            self.min as i64
        } else {
            0
        }
    }
}

impl Codec<i32> for RangedIntCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(self.width.num_bytes())
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(self.width.num_bytes()))
    }

    fn encoded_len(&self, _value: &i32) -> WriteResult<usize> {
        Ok(self.width.num_bytes())
    }

    fn write_value(&self, value: &i32, out: &mut WriteState) -> WriteResult<()> {
        if *value < self.min || *value > self.max {
            return Err(WriteError::InvalidInt {
                min: self.min as i64,
                value: *value as i64,
                max: self.max as i64,
            });
        }

        let adjusted = (*value as i64 - self.offset()) as i32;
        match self.width {
            IntWidth::Int8 => out.write_i8(adjusted as i8),
            IntWidth::Uint8 => out.write_u8(adjusted as u8),
            IntWidth::Int16 => out.write_i16(adjusted as i16),
            IntWidth::Uint16 => out.write_u16(adjusted as u16),
            IntWidth::Int31 => out.write_i32(adjusted),
        }
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<i32> {
        let raw = match self.width {
            IntWidth::Int8 => input.read_i8()? as i64,
            IntWidth::Uint8 => input.read_u8()? as i64,
            IntWidth::Int16 => input.read_i16()? as i64,
            IntWidth::Uint16 => input.read_u16()? as i64,
            IntWidth::Int31 => input.read_i32()? as i64,
        };

        let value = raw + self.offset();
        if value < self.min as i64 || value > self.max as i64 {
            return Err(ReadError::InvalidInt {
                min: self.min as i64,
                value,
                max: self.max as i64,
            });
        }
        Ok(value as i32)
    }
}

/// Integer within `[min, max]`, stored in the smallest width able to hold the
/// range. Ranges with a positive minimum are stored shifted down by `min`.
pub fn ranged_int(min: i32, max: i32) -> Result<Encoding<i32>> {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if min < size::MIN_INT31 || max > size::MAX_INT31 {
        return Err(format_err!(
            "Ranged integer bounds [{}, {}] exceed 31 bits",
            min,
            max
        ));
    }

    Ok(Encoding::from_codec(RangedIntCodec {
        min,
        max,
        width: size::ranged_int_width(min, max),
    }))
}

struct RangedFloatCodec {
    min: f64,
    max: f64,
}

impl Codec<f64> for RangedFloatCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(size::FLOAT64)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(size::FLOAT64))
    }

    fn encoded_len(&self, _value: &f64) -> WriteResult<usize> {
        Ok(size::FLOAT64)
    }

    fn write_value(&self, value: &f64, out: &mut WriteState) -> WriteResult<()> {
        // NaN compares false against both bounds and is a member of no range.
        if value.is_nan() || *value < self.min || *value > self.max {
            return Err(WriteError::InvalidFloat {
                min: self.min,
                value: *value,
                max: self.max,
            });
        }
        out.write_f64(*value)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<f64> {
        let value = input.read_f64()?;
        if value.is_nan() || value < self.min || value > self.max {
            return Err(ReadError::InvalidFloat {
                min: self.min,
                value,
                max: self.max,
            });
        }
        Ok(value)
    }
}

/// IEEE-754 binary64 with a range check on both write and read.
pub fn ranged_float(min: f64, max: f64) -> Result<Encoding<f64>> {
    if min.is_nan() || max.is_nan() {
        return Err(err_msg("Ranged float bounds must not be NaN"));
    }

    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    Ok(Encoding::from_codec(RangedFloatCodec { min, max }))
}

struct NullCodec;

impl Codec<()> for NullCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(0)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(0))
    }

    fn encoded_len(&self, _value: &()) -> WriteResult<usize> {
        Ok(0)
    }

    fn write_value(&self, _value: &(), _out: &mut WriteState) -> WriteResult<()> {
        Ok(())
    }

    fn read_value(&self, _input: &mut ReadState) -> ReadResult<()> {
        Ok(())
    }
}

pub fn null() -> Encoding<()> {
    Encoding::from_codec(NullCodec)
}

struct EmptyCodec;

impl Codec<()> for EmptyCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(0)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(0))
    }

    fn is_obj(&self) -> bool {
        true
    }

    fn is_tup(&self) -> bool {
        true
    }

    fn encoded_len(&self, _value: &()) -> WriteResult<usize> {
        Ok(0)
    }

    fn write_value(&self, _value: &(), _out: &mut WriteState) -> WriteResult<()> {
        Ok(())
    }

    fn read_value(&self, _input: &mut ReadState) -> ReadResult<()> {
        Ok(())
    }
}

/// Zero bytes on the wire. Distinct from [`null`] only in how textual
/// interpretations render the value.
pub fn empty() -> Encoding<()> {
    Encoding::from_codec(EmptyCodec)
}

struct ConstantCodec {
    // Rendered only by textual interpretations of the descriptor.
    #[allow(dead_code)]
    literal: String,
}

impl Codec<()> for ConstantCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(0)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(0))
    }

    fn encoded_len(&self, _value: &()) -> WriteResult<usize> {
        Ok(0)
    }

    fn write_value(&self, _value: &(), _out: &mut WriteState) -> WriteResult<()> {
        Ok(())
    }

    fn read_value(&self, _input: &mut ReadState) -> ReadResult<()> {
        Ok(())
    }
}

pub fn constant(literal: &str) -> Encoding<()> {
    Encoding::from_codec(ConstantCodec {
        literal: literal.to_string(),
    })
}

struct IgnoreCodec;

impl Codec<()> for IgnoreCodec {
    fn kind(&self) -> Kind {
        Kind::Variable
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Remainder)
    }

    fn is_obj(&self) -> bool {
        true
    }

    fn is_tup(&self) -> bool {
        true
    }

    fn encoded_len(&self, _value: &()) -> WriteResult<usize> {
        Ok(0)
    }

    fn write_value(&self, _value: &(), _out: &mut WriteState) -> WriteResult<()> {
        Ok(())
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<()> {
        let remaining = input.remaining();
        input.skip(remaining)?;
        Ok(())
    }
}

/// Writes nothing and discards whatever is left in the surrounding context.
pub fn ignore() -> Encoding<()> {
    Encoding::from_codec(IgnoreCodec)
}

struct FixedBytesCodec {
    length: usize,
}

impl Codec<Vec<u8>> for FixedBytesCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(self.length)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(self.length))
    }

    fn encoded_len(&self, _value: &Vec<u8>) -> WriteResult<usize> {
        Ok(self.length)
    }

    fn write_value(&self, value: &Vec<u8>, out: &mut WriteState) -> WriteResult<()> {
        if value.len() != self.length {
            return Err(WriteError::InvalidBytesLength {
                expected: self.length,
                found: value.len(),
            });
        }
        out.write_bytes(value)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<Vec<u8>> {
        Ok(input.read_slice(self.length)?.to_vec())
    }
}

pub fn fixed_bytes(length: usize) -> Result<Encoding<Vec<u8>>> {
    if length == 0 {
        return Err(err_msg("Fixed size byte sequences must not be empty"));
    }
    Ok(Encoding::from_codec(FixedBytesCodec { length }))
}

struct VariableBytesCodec;

impl Codec<Vec<u8>> for VariableBytesCodec {
    fn kind(&self) -> Kind {
        Kind::Variable
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Remainder)
    }

    fn encoded_len(&self, value: &Vec<u8>) -> WriteResult<usize> {
        Ok(value.len())
    }

    fn write_value(&self, value: &Vec<u8>, out: &mut WriteState) -> WriteResult<()> {
        out.write_bytes(value)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<Vec<u8>> {
        let remaining = input.remaining();
        Ok(input.read_slice(remaining)?.to_vec())
    }
}

/// Raw bytes filling the surrounding context.
pub fn variable_bytes() -> Encoding<Vec<u8>> {
    Encoding::from_codec(VariableBytesCodec)
}

/// Raw bytes behind a four byte length header.
pub fn bytes() -> Encoding<Vec<u8>> {
    dynamic_size(SizeWidth::Uint30, variable_bytes())
}

struct FixedStringCodec {
    length: usize,
}

impl Codec<String> for FixedStringCodec {
    fn kind(&self) -> Kind {
        Kind::Fixed(self.length)
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Bytes(self.length))
    }

    fn encoded_len(&self, _value: &String) -> WriteResult<usize> {
        Ok(self.length)
    }

    fn write_value(&self, value: &String, out: &mut WriteState) -> WriteResult<()> {
        if value.len() != self.length {
            return Err(WriteError::InvalidStringLength {
                expected: self.length,
                found: value.len(),
            });
        }
        out.write_bytes(value.as_bytes())
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<String> {
        let data = input.read_slice(self.length)?;
        let value = std::str::from_utf8(data).map_err(|_| ReadError::InvalidUtf8)?;
        Ok(value.to_string())
    }
}

pub fn fixed_string(length: usize) -> Result<Encoding<String>> {
    if length == 0 {
        return Err(err_msg("Fixed size strings must not be empty"));
    }
    Ok(Encoding::from_codec(FixedStringCodec { length }))
}

struct VariableStringCodec;

impl Codec<String> for VariableStringCodec {
    fn kind(&self) -> Kind {
        Kind::Variable
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Remainder)
    }

    fn encoded_len(&self, value: &String) -> WriteResult<usize> {
        Ok(value.len())
    }

    fn write_value(&self, value: &String, out: &mut WriteState) -> WriteResult<()> {
        out.write_bytes(value.as_bytes())
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<String> {
        let remaining = input.remaining();
        let data = input.read_slice(remaining)?;
        let value = std::str::from_utf8(data).map_err(|_| ReadError::InvalidUtf8)?;
        Ok(value.to_string())
    }
}

/// A string filling the surrounding context.
pub fn variable_string() -> Encoding<String> {
    Encoding::from_codec(VariableStringCodec)
}

/// A string behind a four byte length header.
pub fn string() -> Encoding<String> {
    dynamic_size(SizeWidth::Uint30, variable_string())
}

struct BoundedBytesCodec {
    max_length: usize,
    width: SizeWidth,
}

impl BoundedBytesCodec {
    fn read_length(&self, input: &mut ReadState) -> ReadResult<usize> {
        let size = match self.width {
            SizeWidth::Uint8 => input.read_u8()? as i64,
            SizeWidth::Uint16 => input.read_u16()? as i64,
            SizeWidth::Uint30 => input.read_i32()? as i64,
        };
        if size < 0 || size > self.max_length as i64 {
            return Err(ReadError::InvalidSize(size));
        }
        Ok(size as usize)
    }

    fn write_length(&self, length: usize, out: &mut WriteState) -> WriteResult<()> {
        match self.width {
            SizeWidth::Uint8 => out.write_u8(length as u8),
            SizeWidth::Uint16 => out.write_u16(length as u16),
            SizeWidth::Uint30 => out.write_i32(length as i32),
        }
    }
}

impl Codec<Vec<u8>> for BoundedBytesCodec {
    fn kind(&self) -> Kind {
        Kind::Dynamic
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::DynSize {
            width: self.width,
            max: Some(self.max_length),
            inner: Arc::new(ScanPlan::Remainder),
        })
    }

    fn encoded_len(&self, value: &Vec<u8>) -> WriteResult<usize> {
        if value.len() > self.max_length {
            return Err(WriteError::InvalidBytesLength {
                expected: self.max_length,
                found: value.len(),
            });
        }
        Ok(self.width.num_bytes() + value.len())
    }

    fn write_value(&self, value: &Vec<u8>, out: &mut WriteState) -> WriteResult<()> {
        self.encoded_len(value)?;
        self.write_length(value.len(), out)?;
        out.write_bytes(value)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<Vec<u8>> {
        let length = self.read_length(input)?;
        Ok(input.read_slice(length)?.to_vec())
    }
}

/// Length headed bytes of at most `max_length`, with the smallest header
/// width able to express the bound.
pub fn bounded_bytes(max_length: usize) -> Encoding<Vec<u8>> {
    Encoding::from_codec(BoundedBytesCodec {
        max_length,
        width: SizeWidth::for_limit(max_length),
    })
}

struct BoundedStringCodec {
    inner: BoundedBytesCodec,
}

impl Codec<String> for BoundedStringCodec {
    fn kind(&self) -> Kind {
        Kind::Dynamic
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        self.inner.scan_plan()
    }

    fn encoded_len(&self, value: &String) -> WriteResult<usize> {
        if value.len() > self.inner.max_length {
            return Err(WriteError::InvalidStringLength {
                expected: self.inner.max_length,
                found: value.len(),
            });
        }
        Ok(self.inner.width.num_bytes() + value.len())
    }

    fn write_value(&self, value: &String, out: &mut WriteState) -> WriteResult<()> {
        self.encoded_len(value)?;
        self.inner.write_length(value.len(), out)?;
        out.write_bytes(value.as_bytes())
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<String> {
        let length = self.inner.read_length(input)?;
        let data = input.read_slice(length)?;
        let value = std::str::from_utf8(data).map_err(|_| ReadError::InvalidUtf8)?;
        Ok(value.to_string())
    }
}

/// Length headed string of at most `max_length` bytes.
pub fn bounded_string(max_length: usize) -> Encoding<String> {
    Encoding::from_codec(BoundedStringCodec {
        inner: BoundedBytesCodec {
            max_length,
            width: SizeWidth::for_limit(max_length),
        },
    })
}

struct StringEnumCodec<T> {
    cases: Vec<(String, T)>,
    width: SizeWidth,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Codec<T> for StringEnumCodec<T> {
    fn kind(&self) -> Kind {
        Kind::Fixed(self.width.num_bytes())
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::EnumIndex {
            width: self.width,
            count: self.cases.len(),
        })
    }

    fn encoded_len(&self, _value: &T) -> WriteResult<usize> {
        Ok(self.width.num_bytes())
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        let index = self
            .cases
            .iter()
            .position(|(_, case)| case == value)
            .ok_or(WriteError::NoCaseMatched)?;

        match self.width {
            SizeWidth::Uint8 => out.write_u8(index as u8),
            SizeWidth::Uint16 => out.write_u16(index as u16),
            SizeWidth::Uint30 => out.write_i32(index as i32),
        }
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        let index = match self.width {
            SizeWidth::Uint8 => input.read_u8()? as u32,
            SizeWidth::Uint16 => input.read_u16()? as u32,
            SizeWidth::Uint30 => input.read_u32()?,
        };

        if index as usize >= self.cases.len() {
            return Err(ReadError::UnexpectedTag(index));
        }
        Ok(self.cases[index as usize].1.clone())
    }
}

/// Value from a closed set, stored as an index of minimum width into the
/// case table. The labels are only rendered by textual interpretations.
pub fn string_enum<T: Clone + PartialEq + Send + Sync + 'static>(
    cases: Vec<(&str, T)>,
) -> Result<Encoding<T>> {
    if cases.len() < 2 {
        return Err(err_msg("String enums need at least two cases"));
    }

    let mut labels = std::collections::HashSet::new();
    for (label, _) in &cases {
        if !labels.insert(*label) {
            return Err(format_err!("Duplicate enum label: {:?}", label));
        }
    }

    let width = SizeWidth::for_enum(cases.len());
    Ok(Encoding::from_codec(StringEnumCodec {
        cases: cases
            .into_iter()
            .map(|(label, value)| (label.to_string(), value))
            .collect(),
        width,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip_test() {
        let data = int16().to_bytes(&-2).unwrap();
        assert_eq!(&data, &[0xff, 0xfe]);
        assert_eq!(int16().of_bytes(&data).unwrap(), -2);

        let data = int64().to_bytes(&0x0102030405060708).unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(int64().of_bytes(&data).unwrap(), 0x0102030405060708);

        let data = float().to_bytes(&1.5).unwrap();
        assert_eq!(&data, &[0x3f, 0xf8, 0, 0, 0, 0, 0, 0]);
        assert_eq!(float().of_bytes(&data).unwrap(), 1.5);
    }

    #[test]
    fn boolean_test() {
        assert_eq!(boolean().to_bytes(&true).unwrap(), vec![1]);
        assert_eq!(boolean().to_bytes(&false).unwrap(), vec![0]);
        // Any non-zero byte reads back as true.
        assert_eq!(boolean().of_bytes(&[0xff]).unwrap(), true);
    }

    #[test]
    fn int31_test() {
        assert!(int31().to_bytes(&0x3fffffff).is_ok());
        assert_eq!(
            int31().to_bytes(&0x40000000),
            Err(WriteError::InvalidInt {
                min: -(1 << 30),
                value: 1 << 30,
                max: (1 << 30) - 1
            })
        );
        assert!(matches!(
            int31().of_bytes(&[0x7f, 0xff, 0xff, 0xff]),
            Err(ReadError::InvalidInt { .. })
        ));
    }

    #[test]
    fn ranged_int_signed_test() {
        let enc = ranged_int(-5, 10).unwrap();
        assert_eq!(enc.classify(), Kind::Fixed(1));

        let data = enc.to_bytes(&-5).unwrap();
        assert_eq!(&data, &[0xfb]);
        assert_eq!(enc.of_bytes(&data).unwrap(), -5);

        assert!(matches!(
            enc.to_bytes(&11),
            Err(WriteError::InvalidInt { min: -5, value: 11, max: 10 })
        ));
        assert!(matches!(
            enc.of_bytes(&[0x0b]),
            Err(ReadError::InvalidInt { .. })
        ));
    }

    #[test]
    fn ranged_int_offset_test() {
        // A positive minimum shifts the stored value down by the minimum.
        let enc = ranged_int(100, 400).unwrap();
        assert_eq!(enc.classify(), Kind::Fixed(2));

        let data = enc.to_bytes(&150).unwrap();
        assert_eq!(&data, &[0x00, 0x32]);
        assert_eq!(enc.of_bytes(&data).unwrap(), 150);

        // Bounds are normalized.
        let swapped = ranged_int(400, 100).unwrap();
        assert_eq!(swapped.to_bytes(&150).unwrap(), data);

        assert!(ranged_int(0, 1 << 30).is_err());
    }

    #[test]
    fn ranged_float_test() {
        let enc = ranged_float(-1.0, 1.0).unwrap();
        let data = enc.to_bytes(&0.5).unwrap();
        assert_eq!(enc.of_bytes(&data).unwrap(), 0.5);

        assert!(matches!(
            enc.to_bytes(&1.5),
            Err(WriteError::InvalidFloat { .. })
        ));

        let raw = float().to_bytes(&2.0).unwrap();
        assert!(matches!(
            enc.of_bytes(&raw),
            Err(ReadError::InvalidFloat { .. })
        ));
    }

    #[test]
    fn ranged_float_nan_test() {
        let enc = ranged_float(-1.0, 1.0).unwrap();

        assert!(matches!(
            enc.to_bytes(&f64::NAN),
            Err(WriteError::InvalidFloat { .. })
        ));

        let raw = float().to_bytes(&f64::NAN).unwrap();
        assert!(matches!(
            enc.of_bytes(&raw),
            Err(ReadError::InvalidFloat { .. })
        ));
    }

    #[test]
    fn fixed_bytes_test() {
        let enc = fixed_bytes(3).unwrap();
        let data = enc.to_bytes(&vec![1, 2, 3]).unwrap();
        assert_eq!(&data, &[1, 2, 3]);

        assert_eq!(
            enc.to_bytes(&vec![1, 2]),
            Err(WriteError::InvalidBytesLength { expected: 3, found: 2 })
        );
        assert!(fixed_bytes(0).is_err());
    }

    #[test]
    fn string_test() {
        let enc = string();
        let data = enc.to_bytes(&"hi".to_string()).unwrap();
        assert_eq!(&data, &[0, 0, 0, 2, 0x68, 0x69]);
        assert_eq!(enc.of_bytes(&data).unwrap(), "hi");

        assert_eq!(
            enc.of_bytes(&[0, 0, 0, 1, 0xff]),
            Err(ReadError::InvalidUtf8)
        );
    }

    #[test]
    fn fixed_string_test() {
        let enc = fixed_string(2).unwrap();
        assert_eq!(
            enc.to_bytes(&"abc".to_string()),
            Err(WriteError::InvalidStringLength { expected: 2, found: 3 })
        );
        assert_eq!(enc.of_bytes(&[0x68, 0x69]).unwrap(), "hi");
    }

    #[test]
    fn bounded_bytes_test() {
        let enc = bounded_bytes(4);
        assert_eq!(enc.classify(), Kind::Dynamic);

        let data = enc.to_bytes(&vec![7, 8]).unwrap();
        assert_eq!(&data, &[2, 7, 8]);
        assert_eq!(enc.of_bytes(&data).unwrap(), vec![7, 8]);

        assert_eq!(
            enc.to_bytes(&vec![0; 5]),
            Err(WriteError::InvalidBytesLength { expected: 4, found: 5 })
        );
        assert_eq!(enc.of_bytes(&[5, 0, 0, 0, 0, 0]), Err(ReadError::InvalidSize(5)));
    }

    #[test]
    fn bounded_string_test() {
        let enc = bounded_string(300);
        let data = enc.to_bytes(&"hi".to_string()).unwrap();
        assert_eq!(&data, &[0, 2, 0x68, 0x69]);
        assert_eq!(enc.of_bytes(&data).unwrap(), "hi");
    }

    #[test]
    fn zero_width_test() {
        for enc in [null(), empty(), constant("version")] {
            assert_eq!(enc.classify(), Kind::Fixed(0));
            assert_eq!(enc.to_bytes(&()).unwrap(), Vec::<u8>::new());
            assert_eq!(enc.of_bytes(&[]).unwrap(), ());
        }
    }

    #[test]
    fn ignore_test() {
        let enc = crate::product::obj2(
            crate::product::req("id", uint8()),
            crate::product::req("padding", ignore()),
        )
        .unwrap();

        assert_eq!(enc.classify(), Kind::Variable);
        assert_eq!(enc.of_bytes(&[1, 9, 9, 9]).unwrap(), (1, ()));
        assert_eq!(enc.to_bytes(&(1, ())).unwrap(), vec![1]);
    }

    #[test]
    fn string_enum_test() {
        #[derive(Debug, Clone, PartialEq)]
        enum Version {
            A,
            B,
            C,
        }

        let enc = string_enum(vec![
            ("a", Version::A),
            ("b", Version::B),
            ("c", Version::C),
        ])
        .unwrap();

        assert_eq!(enc.classify(), Kind::Fixed(1));
        assert_eq!(enc.to_bytes(&Version::B).unwrap(), vec![0x01]);
        assert_eq!(enc.of_bytes(&[0x01]).unwrap(), Version::B);
        assert_eq!(enc.of_bytes(&[0x03]), Err(ReadError::UnexpectedTag(3)));

        assert!(string_enum(vec![("a", Version::A)]).is_err());
        assert!(string_enum(vec![("a", Version::A), ("a", Version::B)]).is_err());
    }
}
