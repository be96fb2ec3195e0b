use crate::errors::*;

/// Binary shape of a descriptor.
///
/// `Fixed(n)` encodings always serialize to exactly `n` bytes. `Dynamic`
/// encodings vary with the value but are self-delimiting (the bytes alone
/// determine where the value ends). `Variable` encodings vary with the value
/// and only end where the surrounding context ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Fixed(usize),
    Dynamic,
    Variable,
}

impl Kind {
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Kind::Fixed(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Kind::Variable)
    }

    /// Combines the kinds of two adjacent encodings (left bytes first).
    ///
    /// Two adjacent variable parts cannot be separated again, and a variable
    /// part followed by a dynamic one leaves the end of the left part
    /// undetermined. Both compositions are rejected here so that every
    /// accepted pair can be parsed without lookahead.
    pub(crate) fn pair(left: Kind, right: Kind) -> Result<Kind> {
        match (left, right) {
            (Kind::Fixed(a), Kind::Fixed(b)) => Ok(Kind::Fixed(a + b)),
            (Kind::Fixed(_), Kind::Dynamic)
            | (Kind::Dynamic, Kind::Fixed(_))
            | (Kind::Dynamic, Kind::Dynamic) => Ok(Kind::Dynamic),
            (Kind::Fixed(_), Kind::Variable) | (Kind::Dynamic, Kind::Variable) => {
                Ok(Kind::Variable)
            }
            (Kind::Variable, Kind::Fixed(_)) => Ok(Kind::Variable),
            (Kind::Variable, Kind::Dynamic) => Err(err_msg(
                "Variable length part followed by a dynamic one: the end of the \
                 variable part is undetermined. Wrap it with a size header.",
            )),
            (Kind::Variable, Kind::Variable) => Err(err_msg(
                "Two adjacent variable length parts cannot be separated. Wrap \
                 one of them with a size header.",
            )),
        }
    }

    /// Combined kind of the payloads of a tagged union (tag bytes excluded).
    pub(crate) fn merge_cases(kinds: &[Kind]) -> Kind {
        let mut fixed = kinds.first().and_then(|k| k.fixed_size());
        let mut variable = false;
        for kind in kinds {
            match kind {
                Kind::Fixed(n) => {
                    if fixed != Some(*n) {
                        fixed = None;
                    }
                }
                Kind::Dynamic => fixed = None,
                Kind::Variable => {
                    fixed = None;
                    variable = true;
                }
            }
        }

        if let Some(n) = fixed {
            Kind::Fixed(n)
        } else if variable {
            Kind::Variable
        } else {
            Kind::Dynamic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_test() {
        assert_eq!(
            Kind::pair(Kind::Fixed(2), Kind::Fixed(3)).unwrap(),
            Kind::Fixed(5)
        );
        assert_eq!(
            Kind::pair(Kind::Fixed(2), Kind::Dynamic).unwrap(),
            Kind::Dynamic
        );
        assert_eq!(
            Kind::pair(Kind::Dynamic, Kind::Variable).unwrap(),
            Kind::Variable
        );
        assert_eq!(
            Kind::pair(Kind::Variable, Kind::Fixed(4)).unwrap(),
            Kind::Variable
        );
        assert!(Kind::pair(Kind::Variable, Kind::Variable).is_err());
        assert!(Kind::pair(Kind::Variable, Kind::Dynamic).is_err());
    }

    #[test]
    fn merge_cases_test() {
        assert_eq!(
            Kind::merge_cases(&[Kind::Fixed(4), Kind::Fixed(4)]),
            Kind::Fixed(4)
        );
        assert_eq!(
            Kind::merge_cases(&[Kind::Fixed(4), Kind::Fixed(8)]),
            Kind::Dynamic
        );
        assert_eq!(
            Kind::merge_cases(&[Kind::Fixed(4), Kind::Dynamic]),
            Kind::Dynamic
        );
        assert_eq!(
            Kind::merge_cases(&[Kind::Fixed(4), Kind::Variable]),
            Kind::Variable
        );
    }
}
