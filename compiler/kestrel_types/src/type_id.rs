//! Interned type handle.

use std::fmt;

/// Interned type handle: 4-bit shard plus 28-bit slot, like `Name`.
///
/// Primitives are pre-interned in shard 0 at the fixed slots below, so
/// checking for a primitive never touches the interner.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Not yet known (e.g. an untyped formal before inference).
    pub const UNKNOWN: TypeId = TypeId(0);
    /// Result of a failed resolution; absorbs further errors.
    pub const ERRONEOUS: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    /// Fully generic placeholder (`type t` formal, untyped formal).
    pub const ANY: TypeId = TypeId(3);
    pub const BOOL: TypeId = TypeId(4);
    pub const INT8: TypeId = TypeId(5);
    pub const INT16: TypeId = TypeId(6);
    pub const INT32: TypeId = TypeId(7);
    pub const INT64: TypeId = TypeId(8);
    pub const UINT8: TypeId = TypeId(9);
    pub const UINT16: TypeId = TypeId(10);
    pub const UINT32: TypeId = TypeId(11);
    pub const UINT64: TypeId = TypeId(12);
    pub const REAL32: TypeId = TypeId(13);
    pub const REAL64: TypeId = TypeId(14);
    pub const STRING: TypeId = TypeId(15);
    pub const CSTRING: TypeId = TypeId(16);

    pub const INT: TypeId = Self::INT64;
    pub const UINT: TypeId = Self::UINT64;
    pub const REAL: TypeId = Self::REAL64;

    /// First slot of shard 0 available for interned compound types.
    pub const FIRST_COMPOUND: u32 = 17;

    pub const MAX_LOCAL: u32 = 0x0FFF_FFFF;

    #[inline]
    pub const fn from_shard_local(shard: u32, local: u32) -> Self {
        debug_assert!(shard < 16);
        debug_assert!(local <= Self::MAX_LOCAL);
        TypeId((shard << 28) | local)
    }

    #[inline]
    pub const fn shard(self) -> usize {
        (self.0 >> 28) as usize
    }

    #[inline]
    pub const fn local(self) -> usize {
        (self.0 & Self::MAX_LOCAL) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_COMPOUND
    }

    #[inline]
    pub const fn is_erroneous(self) -> bool {
        self.0 == Self::ERRONEOUS.0
    }

    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }

    #[inline]
    pub const fn is_int(self) -> bool {
        self.0 >= Self::INT8.0 && self.0 <= Self::INT64.0
    }

    #[inline]
    pub const fn is_uint(self) -> bool {
        self.0 >= Self::UINT8.0 && self.0 <= Self::UINT64.0
    }

    #[inline]
    pub const fn is_real(self) -> bool {
        self.0 == Self::REAL32.0 || self.0 == Self::REAL64.0
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.is_int() || self.is_uint() || self.is_real()
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TypeId::UNKNOWN => write!(f, "TypeId(unknown)"),
            TypeId::ERRONEOUS => write!(f, "TypeId(erroneous)"),
            TypeId::ANY => write!(f, "TypeId(any)"),
            _ => write!(f, "TypeId({}:{})", self.shard(), self.local()),
        }
    }
}
