//! Homogeneous sequences. The bare forms write their elements back to back
//! with no framing and rely on the surrounding context to know where to
//! stop; the plain forms wrap that in a four byte size header.

use std::sync::Arc;

use crate::encoding::{dynamic_size, Codec, Encoding};
use crate::error::{ReadError, ReadResult, WriteError, WriteResult};
use crate::errors::*;
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::size::SizeWidth;
use crate::stream::ScanPlan;
use crate::writer::WriteState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqFlavor {
    List,
    Array,
}

impl SeqFlavor {
    fn read_overflow(&self) -> ReadError {
        match self {
            SeqFlavor::List => ReadError::ListTooLong,
            SeqFlavor::Array => ReadError::ArrayTooLong,
        }
    }

    fn write_overflow(&self) -> WriteError {
        match self {
            SeqFlavor::List => WriteError::ListTooLong,
            SeqFlavor::Array => WriteError::ArrayTooLong,
        }
    }
}

struct SeqCodec<T> {
    element: Encoding<T>,
    max_length: Option<usize>,
    flavor: SeqFlavor,
}

impl<T: 'static> Codec<Vec<T>> for SeqCodec<T> {
    fn kind(&self) -> Kind {
        Kind::Variable
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        Arc::new(ScanPlan::Seq {
            element: self.element.codec.scan_plan(),
            max_length: self.max_length,
            array: self.flavor == SeqFlavor::Array,
        })
    }

    fn encoded_len(&self, value: &Vec<T>) -> WriteResult<usize> {
        if let Some(max) = self.max_length {
            if value.len() > max {
                return Err(self.flavor.write_overflow());
            }
        }

        let mut total = 0;
        for element in value {
            total += self.element.codec.encoded_len(element)?;
        }
        Ok(total)
    }

    fn write_value(&self, value: &Vec<T>, out: &mut WriteState) -> WriteResult<()> {
        if let Some(max) = self.max_length {
            if value.len() > max {
                return Err(self.flavor.write_overflow());
            }
        }

        for element in value {
            self.element.codec.write_value(element, out)?;
        }
        Ok(())
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<Vec<T>> {
        let mut elements = vec![];
        while input.remaining() > 0 {
            if let Some(max) = self.max_length {
                if elements.len() == max {
                    return Err(self.flavor.read_overflow());
                }
            }
            elements.push(self.element.codec.read_value(input)?);
        }
        Ok(elements)
    }
}

fn seq<T: 'static>(
    element: Encoding<T>,
    max_length: Option<usize>,
    flavor: SeqFlavor,
) -> Result<Encoding<Vec<T>>> {
    match element.classify() {
        Kind::Variable => {
            return Err(err_msg(
                "Sequence elements must be sized. Wrap them with a size header.",
            ));
        }
        Kind::Fixed(0) => {
            // A zero width element would never shrink the remaining context,
            // so reading could not terminate.
            return Err(err_msg("Sequence elements must occupy at least one byte"));
        }
        _ => {}
    }

    Ok(Encoding::from_codec(SeqCodec {
        element,
        max_length,
        flavor,
    }))
}

/// Elements written back to back until the end of the surrounding context.
pub fn variable_list<T: 'static>(element: Encoding<T>) -> Result<Encoding<Vec<T>>> {
    seq(element, None, SeqFlavor::List)
}

pub fn variable_array<T: 'static>(element: Encoding<T>) -> Result<Encoding<Vec<T>>> {
    seq(element, None, SeqFlavor::Array)
}

/// A list behind a four byte size header.
pub fn list<T: 'static>(element: Encoding<T>) -> Result<Encoding<Vec<T>>> {
    Ok(dynamic_size(SizeWidth::Uint30, variable_list(element)?))
}

pub fn array<T: 'static>(element: Encoding<T>) -> Result<Encoding<Vec<T>>> {
    Ok(dynamic_size(SizeWidth::Uint30, variable_array(element)?))
}

/// Like [`list`] but refuses more than `max_length` elements on both write
/// and read.
pub fn bounded_list<T: 'static>(
    max_length: usize,
    element: Encoding<T>,
) -> Result<Encoding<Vec<T>>> {
    Ok(dynamic_size(
        SizeWidth::Uint30,
        seq(element, Some(max_length), SeqFlavor::List)?,
    ))
}

pub fn bounded_array<T: 'static>(
    max_length: usize,
    element: Encoding<T>,
) -> Result<Encoding<Vec<T>>> {
    Ok(dynamic_size(
        SizeWidth::Uint30,
        seq(element, Some(max_length), SeqFlavor::Array)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{empty, uint16, uint8, variable_bytes};

    #[test]
    fn list_test() {
        let enc = list(uint8()).unwrap();
        assert_eq!(enc.classify(), Kind::Dynamic);

        let data = enc.to_bytes(&vec![1, 2, 3]).unwrap();
        assert_eq!(&data, &[0, 0, 0, 3, 1, 2, 3]);
        assert_eq!(enc.of_bytes(&data).unwrap(), vec![1, 2, 3]);

        assert_eq!(enc.to_bytes(&vec![]).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(enc.of_bytes(&[0, 0, 0, 0]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn variable_list_test() {
        let enc = variable_list(uint16()).unwrap();
        assert_eq!(enc.classify(), Kind::Variable);

        let data = enc.to_bytes(&vec![0x0102, 0x0304]).unwrap();
        assert_eq!(&data, &[1, 2, 3, 4]);
        assert_eq!(enc.of_bytes(&data).unwrap(), vec![0x0102, 0x0304]);

        // A context that ends mid-element is malformed.
        assert_eq!(enc.of_bytes(&[1, 2, 3]), Err(ReadError::NotEnoughData));
    }

    #[test]
    fn nested_list_test() {
        let enc = list(list(uint8()).unwrap()).unwrap();
        let value = vec![vec![1], vec![2, 3]];
        let data = enc.to_bytes(&value).unwrap();
        assert_eq!(
            &data,
            &[0, 0, 0, 11, 0, 0, 0, 1, 1, 0, 0, 0, 2, 2, 3]
        );
        assert_eq!(enc.of_bytes(&data).unwrap(), value);
    }

    #[test]
    fn illegal_elements_test() {
        assert!(variable_list(variable_bytes()).is_err());
        assert!(variable_list(empty()).is_err());
    }

    #[test]
    fn bounded_list_test() {
        let enc = bounded_list(2, uint8()).unwrap();

        assert!(enc.to_bytes(&vec![1, 2]).is_ok());
        assert_eq!(enc.to_bytes(&vec![1, 2, 3]), Err(WriteError::ListTooLong));
        assert_eq!(
            enc.of_bytes(&[0, 0, 0, 3, 1, 2, 3]),
            Err(ReadError::ListTooLong)
        );

        let arrays = bounded_array(1, uint8()).unwrap();
        assert_eq!(arrays.to_bytes(&vec![1, 2]), Err(WriteError::ArrayTooLong));
        assert_eq!(
            arrays.of_bytes(&[0, 0, 0, 2, 1, 2]),
            Err(ReadError::ArrayTooLong)
        );
    }
}
