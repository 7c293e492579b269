//! Variables and literals.
//!
//! A literal is stored as its nonzero signed code: positive asserts the
//! variable, negative negates it, and the variable id is the absolute
//! value. Id 0 is reserved as null and never constructed.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var {
    /// 1-based id, matching the DIMACS numbering
    id: u32,
}

impl Var {
    pub(crate) const MAX_VAR: Var = Var { id: i32::MAX as u32 };

    pub fn from_index(index: u32) -> Self {
        assert!(index < Self::MAX_VAR.id);
        Self { id: index + 1 }
    }

    pub fn from_dimacs(var: i32) -> Self {
        assert!(var > 0);
        Self { id: var.unsigned_abs() }
    }

    pub fn to_dimacs(self) -> i32 {
        self.id.try_into().expect("ids are bounded by MAX_VAR")
    }

    pub(crate) fn as_index(self) -> usize {
        usize::try_from(self.id).unwrap() - 1
    }

    pub(crate) fn positive(self) -> Lit {
        self.lit(true)
    }

    pub(crate) fn negative(self) -> Lit {
        self.lit(false)
    }

    /// The literal of this variable with the provided polarity.
    pub(crate) fn lit(self, polarity: bool) -> Lit {
        let code = self.id as i32;
        Lit { code: if polarity { code } else { -code } }
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    /// signed code; never zero
    code: i32,
}

const _: () = assert!(std::mem::size_of::<Lit>() == 4);

impl Lit {
    pub(crate) const MIN_LIT: Lit = Lit { code: -(Var::MAX_VAR.id as i32) };
    pub(crate) const MAX_LIT: Lit = Lit { code: Var::MAX_VAR.id as i32 };

    pub(crate) const fn positive(variable: Var) -> Self {
        Self { code: variable.id as i32 }
    }

    pub(crate) const fn negative(variable: Var) -> Self {
        Self { code: -(variable.id as i32) }
    }

    pub(crate) fn var(self) -> Var {
        Var { id: self.code.unsigned_abs() }
    }

    pub(crate) fn is_negative(self) -> bool {
        self.code < 0
    }

    pub(crate) fn is_positive(self) -> bool {
        self.code > 0
    }

    pub fn from_dimacs(lit: i32) -> Self {
        assert!(lit != 0 && lit != i32::MIN);
        Self { code: lit }
    }

    pub fn to_dimacs(self) -> i32 {
        self.code
    }
}

/// Literals order by variable, positive polarity first; the conflict
/// analyzer's worklist relies on resolving the largest variable next.
impl Ord for Lit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.var(), self.is_negative()).cmp(&(other.var(), other.is_negative()))
    }
}

impl PartialOrd for Lit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl std::ops::Not for Lit {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self { code: -self.code }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn negation() {
        let a = Var::from_dimacs(1);
        let l = Lit::positive(a);
        let neg_l = !l;
        assert_ne!(l, neg_l);
        assert_eq!(neg_l, Lit::negative(a));
        assert_eq!(l, !neg_l);
    }

    #[test]
    fn polarity() {
        let a = Var::from_dimacs(3);
        assert_eq!(a.lit(true), Lit::positive(a));
        assert_eq!(a.lit(false), Lit::negative(a));
        assert_eq!(Lit::from_dimacs(-3), Lit::negative(a));
    }

    #[test]
    fn ordering_groups_by_variable() {
        let small = Var::from_dimacs(2);
        let large = Var::from_dimacs(7);
        // both polarities of a variable sort together, below larger ids
        assert!(small.positive() < small.negative());
        assert!(small.negative() < large.positive());
        assert!(large.positive() < large.negative());
    }

    #[test]
    fn index_conversion() {
        let var = Var::from_index(4);
        assert_eq!(var.to_dimacs(), 5);
        assert_eq!(var.as_index(), 4);
    }

    #[test]
    #[should_panic]
    fn zero_literal_rejected() {
        let _ = Lit::from_dimacs(0);
    }
}

/// Provides a strategy for randomly generating variables and literals.
#[cfg(test)]
pub(crate) mod strategy {
    use super::{Lit, Var};
    use proptest::{bool, prelude::*};

    fn var(index: impl Strategy<Value = u32>) -> impl Strategy<Value = Var> {
        index.prop_map(Var::from_index)
    }

    pub(crate) fn lit(index: impl Strategy<Value = u32>) -> impl Strategy<Value = Lit> {
        (var(index), bool::ANY).prop_map(|(var, polarity)| var.lit(polarity))
    }
}
