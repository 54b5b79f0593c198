//! Kestrel type model.
//!
//! All types are immutable values interned in a [`TypeInterner`]:
//! primitives live at fixed [`TypeId`] slots, composites (records and
//! classes) carry their generic substitutions, and function types carry
//! their formals and return. A [`QualifiedType`] pairs a type with how an
//! expression may be used (value, ref, param, type, ...).

mod convert;
mod data;
mod genericity;
mod interner;
mod qualified;
mod type_id;

pub use convert::PassKind;
pub use data::{
    CompositeType, FunctionType, GenericFormal, GenericKind, IntWidth, RealWidth, TypeData,
};
pub use genericity::Genericity;
pub use interner::{SharedTypeInterner, TypeInternError, TypeInterner};
pub use qualified::{ParamValue, QualKind, QualifiedType};
pub use type_id::TypeId;

#[cfg(test)]
mod tests;
