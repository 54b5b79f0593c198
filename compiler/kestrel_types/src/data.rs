//! Structural type descriptions stored in the interner.

use crate::{QualifiedType, TypeId};
use kestrel_ir::{Name, NodeId, RecordKind};

/// Whether a generic formal of a composite takes a type or a compile-time value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum GenericKind {
    Type,
    Param,
}

/// A `type` or `param` field of a record; together they make it generic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct GenericFormal {
    pub name: Name,
    pub decl: NodeId,
    pub kind: GenericKind,
    pub has_default: bool,
}

/// Record or class, possibly partially instantiated.
///
/// `subs` runs parallel to `formals`; `None` means the formal is still
/// generic. Two composites with the same declaration and substitutions
/// intern to the same `TypeId`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct CompositeType {
    pub decl: NodeId,
    pub name: Name,
    pub kind: RecordKind,
    pub parent: Option<TypeId>,
    pub formals: Vec<GenericFormal>,
    pub subs: Vec<Option<QualifiedType>>,
}

impl CompositeType {
    /// Substitution of the formal called `name`, if it is a formal and bound.
    pub fn sub_named(&self, name: Name) -> Option<QualifiedType> {
        self.formal_index(name).and_then(|i| self.subs[i])
    }

    pub fn formal_index(&self, name: Name) -> Option<usize> {
        self.formals.iter().position(|f| f.name == name)
    }

    pub fn is_fully_substituted(&self) -> bool {
        self.subs.iter().all(Option::is_some)
    }

    /// Same declaration, nothing substituted.
    #[must_use]
    pub fn generic_root(&self) -> CompositeType {
        CompositeType {
            subs: vec![None; self.formals.len()],
            ..self.clone()
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FunctionType {
    pub formals: Vec<QualifiedType>,
    pub ret: QualifiedType,
}

/// Closed set of type shapes.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeData {
    Unknown,
    Erroneous,
    Void,
    Any,
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Real(RealWidth),
    String,
    CString,
    Composite(CompositeType),
    Function(FunctionType),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    pub const fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            8 => Some(IntWidth::W8),
            16 => Some(IntWidth::W16),
            32 => Some(IntWidth::W32),
            64 => Some(IntWidth::W64),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum RealWidth {
    W32,
    W64,
}

impl RealWidth {
    pub const fn bits(self) -> u32 {
        match self {
            RealWidth::W32 => 32,
            RealWidth::W64 => 64,
        }
    }
}

impl TypeData {
    /// Fixed `TypeId` of a primitive, or `None` for interned compounds.
    pub const fn primitive_id(&self) -> Option<TypeId> {
        Some(match self {
            TypeData::Unknown => TypeId::UNKNOWN,
            TypeData::Erroneous => TypeId::ERRONEOUS,
            TypeData::Void => TypeId::VOID,
            TypeData::Any => TypeId::ANY,
            TypeData::Bool => TypeId::BOOL,
            TypeData::Int(IntWidth::W8) => TypeId::INT8,
            TypeData::Int(IntWidth::W16) => TypeId::INT16,
            TypeData::Int(IntWidth::W32) => TypeId::INT32,
            TypeData::Int(IntWidth::W64) => TypeId::INT64,
            TypeData::Uint(IntWidth::W8) => TypeId::UINT8,
            TypeData::Uint(IntWidth::W16) => TypeId::UINT16,
            TypeData::Uint(IntWidth::W32) => TypeId::UINT32,
            TypeData::Uint(IntWidth::W64) => TypeId::UINT64,
            TypeData::Real(RealWidth::W32) => TypeId::REAL32,
            TypeData::Real(RealWidth::W64) => TypeId::REAL64,
            TypeData::String => TypeId::STRING,
            TypeData::CString => TypeId::CSTRING,
            TypeData::Composite(_) | TypeData::Function(_) => return None,
        })
    }

    /// Primitives in `TypeId` slot order.
    pub(crate) const PRIMITIVES: [TypeData; 17] = [
        TypeData::Unknown,
        TypeData::Erroneous,
        TypeData::Void,
        TypeData::Any,
        TypeData::Bool,
        TypeData::Int(IntWidth::W8),
        TypeData::Int(IntWidth::W16),
        TypeData::Int(IntWidth::W32),
        TypeData::Int(IntWidth::W64),
        TypeData::Uint(IntWidth::W8),
        TypeData::Uint(IntWidth::W16),
        TypeData::Uint(IntWidth::W32),
        TypeData::Uint(IntWidth::W64),
        TypeData::Real(RealWidth::W32),
        TypeData::Real(RealWidth::W64),
        TypeData::String,
        TypeData::CString,
    ];

    pub fn as_composite(&self) -> Option<&CompositeType> {
        match self {
            TypeData::Composite(c) => Some(c),
            _ => None,
        }
    }
}
