//! Qualified types: a type plus how the value may be used.

use crate::TypeId;
use kestrel_ir::{Intent, Name, StringLookup, VarKind};
use std::fmt;

/// Storage/usage qualifier of a resolved expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum QualKind {
    Unknown,
    Erroneous,
    /// Mutable value.
    Var,
    /// Immutable value.
    ConstVar,
    Ref,
    ConstRef,
    /// Value received through an `in` formal.
    In,
    /// Compile-time constant; the value is in `QualifiedType::param`.
    Param,
    /// The expression denotes a type.
    Type,
    Function,
    Module,
}

impl QualKind {
    /// Qualifier of a formal passed with `intent`.
    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::Default | Intent::Const | Intent::ConstRef => QualKind::ConstRef,
            Intent::Ref | Intent::Out => QualKind::Ref,
            Intent::In => QualKind::In,
            Intent::Param => QualKind::Param,
            Intent::Type => QualKind::Type,
        }
    }

    pub fn for_var(kind: VarKind) -> Self {
        match kind {
            VarKind::Var => QualKind::Var,
            VarKind::Const => QualKind::ConstVar,
            VarKind::Ref => QualKind::Ref,
            VarKind::Param => QualKind::Param,
            VarKind::Type => QualKind::Type,
        }
    }

    /// Whether an expression with this qualifier names storage that can be
    /// bound to a `ref` formal.
    pub fn is_mutable_lvalue(self) -> bool {
        matches!(self, QualKind::Var | QualKind::Ref | QualKind::In)
    }

    pub fn is_value(self) -> bool {
        matches!(
            self,
            QualKind::Var
                | QualKind::ConstVar
                | QualKind::Ref
                | QualKind::ConstRef
                | QualKind::In
                | QualKind::Param
        )
    }
}

/// Compile-time value. Reals are stored as bits so the type stays `Hash`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParamValue {
    Int(i64),
    Uint(u64),
    Real(u64),
    Bool(bool),
    Str(Name),
    CStr(Name),
}

impl ParamValue {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Integer value as `i128`, covering both signed and unsigned params.
    pub fn as_integer(self) -> Option<i128> {
        match self {
            ParamValue::Int(v) => Some(i128::from(v)),
            ParamValue::Uint(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "param folding follows runtime int-to-real conversion"
    )]
    pub fn as_real(self) -> Option<f64> {
        match self {
            ParamValue::Real(bits) => Some(f64::from_bits(bits)),
            ParamValue::Int(v) => Some(v as f64),
            ParamValue::Uint(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn display<'a>(&'a self, names: &'a dyn StringLookup) -> impl fmt::Display + 'a {
        DisplayParam { value: self, names }
    }
}

struct DisplayParam<'a> {
    value: &'a ParamValue,
    names: &'a dyn StringLookup,
}

impl fmt::Display for DisplayParam<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.value {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Uint(v) => write!(f, "{v}"),
            ParamValue::Real(bits) => write!(f, "{}", f64::from_bits(bits)),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Str(s) => write!(f, "\"{}\"", self.names.lookup(s)),
            ParamValue::CStr(s) => write!(f, "c\"{}\"", self.names.lookup(s)),
        }
    }
}

/// Result of resolving any expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct QualifiedType {
    pub kind: QualKind,
    pub ty: TypeId,
    pub param: Option<ParamValue>,
}

impl QualifiedType {
    pub const ERRONEOUS: QualifiedType = QualifiedType {
        kind: QualKind::Erroneous,
        ty: TypeId::ERRONEOUS,
        param: None,
    };

    pub const UNKNOWN: QualifiedType = QualifiedType {
        kind: QualKind::Unknown,
        ty: TypeId::UNKNOWN,
        param: None,
    };

    pub const VOID: QualifiedType = QualifiedType {
        kind: QualKind::ConstVar,
        ty: TypeId::VOID,
        param: None,
    };

    pub const fn new(kind: QualKind, ty: TypeId) -> Self {
        QualifiedType {
            kind,
            ty,
            param: None,
        }
    }

    pub const fn type_(ty: TypeId) -> Self {
        Self::new(QualKind::Type, ty)
    }

    pub const fn param(ty: TypeId, value: ParamValue) -> Self {
        QualifiedType {
            kind: QualKind::Param,
            ty,
            param: Some(value),
        }
    }

    pub const fn param_bool(value: bool) -> Self {
        Self::param(TypeId::BOOL, ParamValue::Bool(value))
    }

    #[must_use]
    pub const fn with_kind(self, kind: QualKind) -> Self {
        QualifiedType {
            kind,
            ty: self.ty,
            param: if matches!(kind, QualKind::Param) {
                self.param
            } else {
                None
            },
        }
    }

    pub const fn is_erroneous(&self) -> bool {
        matches!(self.kind, QualKind::Erroneous) || self.ty.is_erroneous()
    }

    pub const fn is_type(&self) -> bool {
        matches!(self.kind, QualKind::Type)
    }

    pub const fn is_param(&self) -> bool {
        matches!(self.kind, QualKind::Param) && self.param.is_some()
    }

    /// Value of a `param` bool, if this is one.
    pub fn as_param_bool(&self) -> Option<bool> {
        if self.kind == QualKind::Param {
            self.param.and_then(ParamValue::as_bool)
        } else {
            None
        }
    }
}
