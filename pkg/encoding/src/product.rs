//! Products of heterogeneous encodings: tuples, named objects, and optional
//! fields. Object and tuple forms share the same wire format; the names only
//! matter to textual interpretations and to the shape checks performed by
//! [`merge_objs`] and [`merge_tups`].

use std::sync::Arc;

use crate::encoding::{Codec, Encoding};
use crate::error::{ReadError, ReadResult, WriteResult};
use crate::errors::*;
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::stream::ScanPlan;
use crate::writer::WriteState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Obj,
    Tup,
}

/// One named component of an object encoding.
pub struct Field<T> {
    name: String,
    encoding: Encoding<T>,
    default: Option<Arc<T>>,
}

impl<T> Field<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value textual interpretations substitute when the field is omitted.
    pub fn default_value(&self) -> Option<&T> {
        self.default.as_deref()
    }
}

/// A field that is always present.
pub fn req<T>(name: &str, encoding: Encoding<T>) -> Field<T> {
    Field {
        name: name.to_string(),
        encoding,
        default: None,
    }
}

/// A field that may be absent. Costs one presence byte unless the payload is
/// variable, in which case absence is an empty tail.
pub fn opt<T: 'static>(name: &str, encoding: Encoding<T>) -> Field<Option<T>> {
    Field {
        name: name.to_string(),
        encoding: option(encoding),
        default: None,
    }
}

/// A field with a fallback value. Encoded exactly like [`req`]; the default
/// only matters to textual interpretations.
pub fn dft<T>(name: &str, encoding: Encoding<T>, default: T) -> Field<T> {
    Field {
        name: name.to_string(),
        encoding,
        default: Some(Arc::new(default)),
    }
}

struct OptionCodec<T> {
    inner: Encoding<T>,
    kind: Kind,
}

impl<T: 'static> Codec<Option<T>> for OptionCodec<T> {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        let inner = self.inner.codec.scan_plan();
        Arc::new(match self.kind {
            Kind::Variable => ScanPlan::OptTail(inner),
            _ => ScanPlan::OptFlag(inner),
        })
    }

    fn encoded_len(&self, value: &Option<T>) -> WriteResult<usize> {
        let flag = match self.kind {
            Kind::Variable => 0,
            _ => 1,
        };
        match value {
            Some(inner) => Ok(flag + self.inner.codec.encoded_len(inner)?),
            None => Ok(flag),
        }
    }

    fn write_value(&self, value: &Option<T>, out: &mut WriteState) -> WriteResult<()> {
        if self.kind == Kind::Variable {
            return match value {
                Some(inner) => self.inner.codec.write_value(inner, out),
                None => Ok(()),
            };
        }

        match value {
            Some(inner) => {
                out.write_u8(1)?;
                self.inner.codec.write_value(inner, out)
            }
            None => out.write_u8(0),
        }
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<Option<T>> {
        if self.kind == Kind::Variable {
            if input.remaining() == 0 {
                return Ok(None);
            }
            return Ok(Some(self.inner.codec.read_value(input)?));
        }

        match input.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.inner.codec.read_value(input)?)),
            flag => Err(ReadError::UnexpectedTag(flag as u32)),
        }
    }
}

/// Optional value. One presence byte followed by the payload, or, for
/// variable payloads, presence indicated by a non-empty tail.
pub fn option<T: 'static>(inner: Encoding<T>) -> Encoding<Option<T>> {
    let kind = if inner.classify().is_variable() {
        Kind::Variable
    } else {
        Kind::Dynamic
    };
    Encoding::from_codec(OptionCodec { inner, kind })
}

fn combine_kinds(kinds: &[Kind]) -> Result<Kind> {
    let mut combined = kinds[0];
    for kind in &kinds[1..] {
        combined = Kind::pair(combined, *kind)?;
    }
    Ok(combined)
}

/// Position of the variable length component, if any, along with the summed
/// width of the fixed size components after it.
fn variable_split(kinds: &[Kind]) -> (Option<usize>, usize) {
    let var_index = kinds.iter().position(|k| k.is_variable());
    let trailing_fixed = match var_index {
        Some(index) => kinds[(index + 1)..]
            .iter()
            .map(|k| k.fixed_size().unwrap_or(0))
            .sum(),
        None => 0,
    };
    (var_index, trailing_fixed)
}

struct ShapeCodec<T> {
    inner: Encoding<T>,
    shape: Shape,
}

impl<T: 'static> Codec<T> for ShapeCodec<T> {
    fn kind(&self) -> Kind {
        self.inner.codec.kind()
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        self.inner.codec.scan_plan()
    }

    fn is_obj(&self) -> bool {
        self.shape == Shape::Obj
    }

    fn is_tup(&self) -> bool {
        self.shape == Shape::Tup
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        self.inner.codec.encoded_len(value)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.inner.codec.write_value(value, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        self.inner.codec.read_value(input)
    }
}

pub fn obj1<T: 'static>(field: Field<T>) -> Encoding<T> {
    Encoding::from_codec(ShapeCodec {
        inner: field.encoding,
        shape: Shape::Obj,
    })
}

pub fn tup1<T: 'static>(encoding: Encoding<T>) -> Encoding<T> {
    Encoding::from_codec(ShapeCodec {
        inner: encoding,
        shape: Shape::Tup,
    })
}

macro_rules! product_codec {
    ($codec:ident, $objf:ident, $tupf:ident, $(($T:ident, $bind:ident, $idx:tt)),+) => {
        struct $codec<$($T),+> {
            parts: ($(Encoding<$T>,)+),
            kind: Kind,
            shape: Shape,
            var_index: Option<usize>,
            trailing_fixed: usize,
        }

        impl<$($T: 'static),+> $codec<$($T),+> {
            fn build(
                shape: Shape,
                parts: ($(Encoding<$T>,)+),
            ) -> Result<Encoding<($($T,)+)>> {
                let kinds = [$(parts.$idx.classify()),+];
                let kind = combine_kinds(&kinds)?;
                let (var_index, trailing_fixed) = variable_split(&kinds);

                Ok(Encoding::from_codec(Self {
                    parts,
                    kind,
                    shape,
                    var_index,
                    trailing_fixed,
                }))
            }
        }

        impl<$($T: 'static),+> Codec<($($T,)+)> for $codec<$($T),+> {
            fn kind(&self) -> Kind {
                self.kind
            }

            fn scan_plan(&self) -> Arc<ScanPlan> {
                Arc::new(ScanPlan::Group {
                    parts: vec![$(self.parts.$idx.codec.scan_plan()),+],
                    var_index: self.var_index,
                    trailing_fixed: self.trailing_fixed,
                })
            }

            fn is_obj(&self) -> bool {
                self.shape == Shape::Obj
            }

            fn is_tup(&self) -> bool {
                self.shape == Shape::Tup
            }

            fn encoded_len(&self, value: &($($T,)+)) -> WriteResult<usize> {
                let mut total = 0;
                $( total += self.parts.$idx.codec.encoded_len(&value.$idx)?; )+
                Ok(total)
            }

            fn write_value(
                &self,
                value: &($($T,)+),
                out: &mut WriteState,
            ) -> WriteResult<()> {
                $( self.parts.$idx.codec.write_value(&value.$idx, out)?; )+
                Ok(())
            }

            fn read_value(&self, input: &mut ReadState) -> ReadResult<($($T,)+)> {
                let saved = match self.kind {
                    Kind::Fixed(n) => Some(input.enter(n)?),
                    _ => None,
                };

                $(
                    let $bind = if self.var_index == Some($idx) && self.trailing_fixed > 0 {
                        // The variable part ends where the fixed tail begins.
                        input.reserve_tail(self.trailing_fixed)?;
                        let value = self.parts.$idx.codec.read_value(input)?;
                        input.release_tail(self.trailing_fixed);
                        value
                    } else {
                        self.parts.$idx.codec.read_value(input)?
                    };
                )+

                if let Some(saved) = saved {
                    input.exit(saved)?;
                }

                Ok(($($bind,)+))
            }
        }

        pub fn $tupf<$($T: 'static),+>(
            $($bind: Encoding<$T>),+
        ) -> Result<Encoding<($($T,)+)>> {
            $codec::build(Shape::Tup, ($($bind,)+))
        }

        pub fn $objf<$($T: 'static),+>(
            $($bind: Field<$T>),+
        ) -> Result<Encoding<($($T,)+)>> {
            $codec::build(Shape::Obj, ($($bind.encoding,)+))
        }
    };
}

product_codec!(Product2Codec, obj2, tup2, (A, f0, 0), (B, f1, 1));
product_codec!(Product3Codec, obj3, tup3, (A, f0, 0), (B, f1, 1), (C, f2, 2));
product_codec!(Product4Codec, obj4, tup4, (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3));
product_codec!(
    Product5Codec, obj5, tup5,
    (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3), (E, f4, 4)
);
product_codec!(
    Product6Codec, obj6, tup6,
    (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3), (E, f4, 4), (F, f5, 5)
);
product_codec!(
    Product7Codec, obj7, tup7,
    (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3), (E, f4, 4), (F, f5, 5),
    (G, f6, 6)
);
product_codec!(
    Product8Codec, obj8, tup8,
    (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3), (E, f4, 4), (F, f5, 5),
    (G, f6, 6), (H, f7, 7)
);
product_codec!(
    Product9Codec, obj9, tup9,
    (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3), (E, f4, 4), (F, f5, 5),
    (G, f6, 6), (H, f7, 7), (I, f8, 8)
);
product_codec!(
    Product10Codec, obj10, tup10,
    (A, f0, 0), (B, f1, 1), (C, f2, 2), (D, f3, 3), (E, f4, 4), (F, f5, 5),
    (G, f6, 6), (H, f7, 7), (I, f8, 8), (J, f9, 9)
);

/// Concatenates two object shaped encodings into one.
pub fn merge_objs<A: 'static, B: 'static>(
    left: Encoding<A>,
    right: Encoding<B>,
) -> Result<Encoding<(A, B)>> {
    if !left.codec.is_obj() || !right.codec.is_obj() {
        return Err(err_msg("Both sides of an object merge must be objects"));
    }
    Product2Codec::build(Shape::Obj, (left, right))
}

/// Concatenates two tuple shaped encodings into one.
pub fn merge_tups<A: 'static, B: 'static>(
    left: Encoding<A>,
    right: Encoding<B>,
) -> Result<Encoding<(A, B)>> {
    if !left.codec.is_tup() || !right.codec.is_tup() {
        return Err(err_msg("Both sides of a tuple merge must be tuples"));
    }
    Product2Codec::build(Shape::Tup, (left, right))
}
