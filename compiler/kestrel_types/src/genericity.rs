//! Genericity classification.

/// How far a type or signature is from being usable at runtime.
///
/// Ordered: joining two classifications keeps the more generic one.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Genericity {
    /// Every generic formal is substituted.
    Concrete,
    /// Every unsubstituted formal has a default.
    GenericWithDefaults,
    /// Some unsubstituted formal has no default.
    Generic,
}

impl Genericity {
    #[must_use]
    pub fn join(self, other: Genericity) -> Genericity {
        self.max(other)
    }

    pub fn is_concrete(self) -> bool {
        self == Genericity::Concrete
    }
}
