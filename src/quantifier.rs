use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantTy {
    Exists,
    Forall,
}

impl Display for QuantTy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantTy::Exists => write!(f, "e"),
            QuantTy::Forall => write!(f, "a"),
        }
    }
}

/// Position of a variable in the (2QBF) quantifier prefix.
///
/// Scope 0 holds the outer existentials (including free and purely
/// propositional variables), scope 1 the universals, and scope 2 the inner
/// existentials. A variable may depend on all universals bound in scopes
/// strictly before its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScopeId(u32);

impl ScopeId {
    pub(crate) const OUTER: ScopeId = ScopeId(0);
    pub(crate) const UNIVERSAL: ScopeId = ScopeId(1);
    pub(crate) const INNER: ScopeId = ScopeId(2);

    /// The largest scope a variable bound in this scope may depend on.
    pub(crate) fn allowed_dependencies(self) -> ScopeId {
        if self == Self::INNER {
            Self::UNIVERSAL
        } else {
            Self::OUTER
        }
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
