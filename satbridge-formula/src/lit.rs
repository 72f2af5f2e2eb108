//! Literals and variables.
use std::{fmt, num::NonZeroI32, ops};

use crate::extend::FormatError;

/// The backing type used to represent literals and variables.
pub type LitIdx = i32;

/// A boolean variable.
///
/// Variables use the 1-based numbering of the DIMACS CNF format throughout. The 0-based
/// [`index`](Var::index) is only provided for indexing into vectors.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var {
    number: NonZeroI32,
}

impl Var {
    /// Creates a variable from a 1-based index as used in the DIMCAS CNF encoding.
    ///
    /// The parameter must be positive and may not represent a variable past `Var::max_var()`.
    #[inline]
    pub fn from_dimacs(number: isize) -> Var {
        debug_assert!(number > 0 && number <= Var::max_count() as isize);
        Var {
            number: NonZeroI32::new(number as LitIdx).unwrap_or(Var::max_var().number),
        }
    }

    /// Creates a variable from a 0-based index.
    #[inline]
    pub fn from_index(index: usize) -> Var {
        Var::from_dimacs(index as isize + 1)
    }

    /// The 1-based index representing this variable in the DIMACS CNF encoding.
    #[inline]
    pub fn to_dimacs(self) -> isize {
        self.number.get() as isize
    }

    /// The 0-based index representing this variable.
    #[inline]
    pub fn index(self) -> usize {
        self.number.get() as usize - 1
    }

    /// The variable with largest index that is supported.
    pub fn max_var() -> Var {
        Var {
            number: NonZeroI32::new(LitIdx::max_value()).unwrap(),
        }
    }

    /// Largest number of variables supported.
    ///
    /// This is also the largest magnitude of a literal.
    pub const fn max_count() -> usize {
        LitIdx::max_value() as usize
    }

    /// Creates a literal from this var and a `bool` that is `true` when the literal is positive.
    #[inline]
    pub fn lit(self, polarity: bool) -> Lit {
        Lit::from_var(self, polarity)
    }

    #[inline]
    pub fn positive(self) -> Lit {
        Lit::positive(self)
    }

    #[inline]
    pub fn negative(self) -> Lit {
        Lit::negative(self)
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A boolean literal.
///
/// A literal is a nonzero signed integer: its magnitude is the 1-based variable number and its
/// sign is the polarity. This is exactly the representation used on the wire, so converting to
/// and from DIMACS is free. The integer `0` is the clause terminator of the DIMACS format and
/// never a literal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Lit {
    number: NonZeroI32,
}

impl Lit {
    /// Creates a literal from a `Var` and a `bool` that is `true` when the literal is positive.
    #[inline]
    pub fn from_var(var: Var, polarity: bool) -> Lit {
        if polarity {
            Lit { number: var.number }
        } else {
            !Lit { number: var.number }
        }
    }

    /// Create a positive literal from a `Var`.
    #[inline]
    pub fn positive(var: Var) -> Lit {
        Lit::from_var(var, true)
    }

    /// Create a negative literal from a `Var`.
    #[inline]
    pub fn negative(var: Var) -> Lit {
        Lit::from_var(var, false)
    }

    /// Creates a literal from a nonzero integer.
    ///
    /// Use [`try_from_dimacs`](Lit::try_from_dimacs) for untrusted input.
    #[inline]
    pub fn from_dimacs(number: isize) -> Lit {
        Lit::from_var(Var::from_dimacs(number.abs()), number > 0)
    }

    /// Creates a literal from an integer, rejecting the terminator `0` and out of range values.
    pub fn try_from_dimacs(number: isize) -> Result<Lit, FormatError> {
        if number == 0 {
            Err(FormatError::ZeroLiteral)
        } else if number.unsigned_abs() > Var::max_count() {
            Err(FormatError::LiteralTooLarge {
                number,
                max: Var::max_count(),
            })
        } else {
            Ok(Lit::from_dimacs(number))
        }
    }

    /// 1-based Integer representation of the literal, opposite of `from_dimacs`.
    #[inline]
    pub fn to_dimacs(self) -> isize {
        self.number.get() as isize
    }

    /// 0-based index of the literal's _variable_.
    #[inline]
    pub fn index(self) -> usize {
        self.var().index()
    }

    /// The literal's variable.
    #[inline]
    pub fn var(self) -> Var {
        Var {
            number: NonZeroI32::new(self.number.get().abs()).unwrap_or(self.number),
        }
    }

    /// Whether the literal is negative, i.e. a negated variable.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.number.get() < 0
    }

    /// Whether the literal is positive, i.e. a non-negated variable.
    #[inline]
    pub fn is_positive(self) -> bool {
        !self.is_negative()
    }
}

impl ops::Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit {
            number: NonZeroI32::new(-self.number.get()).unwrap_or(self.number),
        }
    }
}

impl ops::BitXor<bool> for Lit {
    type Output = Lit;

    #[inline]
    fn bitxor(self, rhs: bool) -> Lit {
        if rhs {
            !self
        } else {
            self
        }
    }
}

impl From<Var> for Lit {
    #[inline]
    fn from(var: Var) -> Lit {
        Lit::positive(var)
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;
    use proptest::{prelude::*, *};

    pub fn var(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Var> {
        index.prop_map(Var::from_index)
    }

    pub fn lit(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Lit> {
        (var(index), bool::ANY).prop_map(|(var, polarity)| var.lit(polarity))
    }
}
