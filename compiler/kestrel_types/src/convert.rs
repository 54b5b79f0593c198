//! Implicit conversions between types and the specificity order over formals.

use crate::{QualifiedType, TypeId, TypeInterner};
use crate::ParamValue;

/// How an actual reaches a formal's type. Variants are listed from the
/// best match to the worst.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum PassKind {
    Exact,
    /// An integer `param` whose value fits in a narrower integer type.
    ParamNarrowing,
    Numeric,
    StringToCString,
    /// Subclass to parent class.
    Subtype,
    /// The formal is generic and the actual's type instantiates it.
    Instantiates,
}

impl PassKind {
    pub fn is_exact(self) -> bool {
        self == PassKind::Exact
    }
}

/// Signedness and bit width of an integral primitive.
fn integral(id: TypeId) -> Option<(bool, u32)> {
    Some(match id {
        TypeId::INT8 => (true, 8),
        TypeId::INT16 => (true, 16),
        TypeId::INT32 => (true, 32),
        TypeId::INT64 => (true, 64),
        TypeId::UINT8 => (false, 8),
        TypeId::UINT16 => (false, 16),
        TypeId::UINT32 => (false, 32),
        TypeId::UINT64 => (false, 64),
        _ => return None,
    })
}

fn fits(value: i128, signed: bool, bits: u32) -> bool {
    if signed {
        let max = (1i128 << (bits - 1)) - 1;
        value >= -max - 1 && value <= max
    } else {
        value >= 0 && value < (1i128 << bits)
    }
}

impl TypeInterner {
    /// How an actual with qualified type `actual` converts to `formal`, or
    /// `None` when it does not.
    pub fn pass_kind(&self, actual: &QualifiedType, formal: TypeId) -> Option<PassKind> {
        let from = actual.ty;
        if from == formal {
            return Some(PassKind::Exact);
        }
        if formal == TypeId::ANY {
            return Some(PassKind::Instantiates);
        }
        if from.is_erroneous() || formal.is_erroneous() || from.is_unknown() {
            return None;
        }
        if let Some(kind) = Self::param_narrowing(actual, formal) {
            return Some(kind);
        }
        if Self::widens(from, formal) {
            return Some(PassKind::Numeric);
        }
        if from == TypeId::STRING && formal == TypeId::CSTRING && actual.param.is_some() {
            return Some(PassKind::StringToCString);
        }
        if from.is_primitive() || formal.is_primitive() {
            return None;
        }
        if self.instantiates(from, formal) {
            return Some(PassKind::Instantiates);
        }
        if self
            .ancestors(from)
            .into_iter()
            .any(|p| p == formal || self.instantiates(p, formal))
        {
            return Some(PassKind::Subtype);
        }
        None
    }

    fn param_narrowing(actual: &QualifiedType, formal: TypeId) -> Option<PassKind> {
        let value = match actual.param? {
            ParamValue::Int(v) => i128::from(v),
            ParamValue::Uint(v) => i128::from(v),
            _ => return None,
        };
        integral(actual.ty)?;
        let (signed, bits) = integral(formal)?;
        fits(value, signed, bits).then_some(PassKind::ParamNarrowing)
    }

    /// Numeric widening that never loses a value.
    pub fn widens(from: TypeId, to: TypeId) -> bool {
        if let (Some((fs, fb)), Some((ts, tb))) = (integral(from), integral(to)) {
            return tb > fb && (fs == ts || (!fs && ts));
        }
        if let Some((_, bits)) = integral(from) {
            return to == TypeId::REAL64 || (to == TypeId::REAL32 && bits <= 16);
        }
        from == TypeId::REAL32 && to == TypeId::REAL64
    }

    /// Whether concrete-ish `actual` is an instantiation of generic `generic`.
    pub fn instantiates(&self, actual: TypeId, generic: TypeId) -> bool {
        if generic == TypeId::ANY {
            return actual != TypeId::ANY;
        }
        if actual == generic {
            return false;
        }
        let (Some(a), Some(g)) = (self.composite(actual), self.composite(generic)) else {
            return false;
        };
        a.decl == g.decl
            && a.subs.iter().zip(&g.subs).all(|(sa, sg)| match (sa, sg) {
                (_, None) => true,
                (Some(sa), Some(sg)) => {
                    sa == sg || (sa.is_type() && sg.is_type() && self.instantiates(sa.ty, sg.ty))
                }
                (None, Some(_)) => false,
            })
    }

    /// `a` converts to `b` without the reverse holding.
    pub fn is_narrower(&self, a: TypeId, b: TypeId) -> bool {
        a != b && self.type_converts(a, b) && !self.type_converts(b, a)
    }

    fn type_converts(&self, from: TypeId, to: TypeId) -> bool {
        self.pass_kind(&QualifiedType::new(crate::QualKind::Var, from), to)
            .is_some()
    }
}
