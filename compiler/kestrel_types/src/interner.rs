//! Sharded type interner.
//!
//! Structurally identical type descriptions intern to the same `TypeId`, so
//! type equality everywhere in the resolver is integer equality.

use crate::data::{CompositeType, FunctionType, IntWidth, RealWidth, TypeData};
use crate::{Genericity, QualKind, QualifiedType, TypeId};
use kestrel_ir::{RecordKind, StringLookup};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInternError {
    ShardOverflow { shard_idx: usize },
}

impl std::fmt::Display for TypeInternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeInternError::ShardOverflow { shard_idx } => {
                write!(f, "type interner shard {shard_idx} is full")
            }
        }
    }
}

impl std::error::Error for TypeInternError {}

struct TypeShard {
    map: FxHashMap<Arc<TypeData>, u32>,
    types: Vec<Arc<TypeData>>,
}

impl TypeShard {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            types: Vec::with_capacity(64),
        }
    }

    fn with_primitives() -> Self {
        let mut shard = Self::new();
        for (slot, data) in (0u32..).zip(TypeData::PRIMITIVES) {
            let data = Arc::new(data);
            shard.map.insert(Arc::clone(&data), slot);
            shard.types.push(data);
        }
        shard
    }
}

const NUM_SHARDS: usize = 16;

/// Session-wide type table.
pub struct TypeInterner {
    shards: [RwLock<TypeShard>; NUM_SHARDS],
}

impl TypeInterner {
    pub fn new() -> Self {
        let shards = std::array::from_fn(|i| {
            if i == 0 {
                RwLock::new(TypeShard::with_primitives())
            } else {
                RwLock::new(TypeShard::new())
            }
        });
        Self { shards }
    }

    fn shard_for(data: &TypeData) -> usize {
        let mut hasher = rustc_hash::FxHasher::default();
        data.hash(&mut hasher);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "truncation is fine for hash-based shard selection"
        )]
        let hash = hasher.finish() as usize;
        hash % NUM_SHARDS
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "shard_idx is bounded by NUM_SHARDS (16)"
    )]
    pub fn try_intern(&self, data: TypeData) -> Result<TypeId, TypeInternError> {
        if let Some(id) = data.primitive_id() {
            return Ok(id);
        }
        let shard_idx = Self::shard_for(&data);
        let shard = &self.shards[shard_idx];

        if let Some(&local) = shard.read().map.get(&data) {
            return Ok(TypeId::from_shard_local(shard_idx as u32, local));
        }

        let mut guard = shard.write();
        if let Some(&local) = guard.map.get(&data) {
            return Ok(TypeId::from_shard_local(shard_idx as u32, local));
        }
        let local = u32::try_from(guard.types.len())
            .ok()
            .filter(|l| *l <= TypeId::MAX_LOCAL)
            .ok_or(TypeInternError::ShardOverflow { shard_idx })?;
        let data = Arc::new(data);
        guard.types.push(Arc::clone(&data));
        guard.map.insert(data, local);
        Ok(TypeId::from_shard_local(shard_idx as u32, local))
    }

    /// Intern `data`.
    ///
    /// # Panics
    /// Panics if a shard exceeds 2^28 types.
    pub fn intern(&self, data: TypeData) -> TypeId {
        self.try_intern(data).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Structural description of `id`. Unknown ids read as `Erroneous`.
    pub fn lookup(&self, id: TypeId) -> Arc<TypeData> {
        let guard = self.shards[id.shard()].read();
        guard
            .types
            .get(id.local())
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeData::Erroneous))
    }

    pub fn composite(&self, id: TypeId) -> Option<CompositeType> {
        if id.is_primitive() {
            return None;
        }
        self.lookup(id).as_composite().cloned()
    }

    pub fn is_record(&self, id: TypeId) -> bool {
        self.composite(id)
            .is_some_and(|c| c.kind == RecordKind::Record)
    }

    pub fn is_class(&self, id: TypeId) -> bool {
        self.composite(id).is_some_and(|c| c.kind == RecordKind::Class)
    }

    pub fn int(&self, width: IntWidth) -> TypeId {
        self.intern(TypeData::Int(width))
    }

    pub fn uint(&self, width: IntWidth) -> TypeId {
        self.intern(TypeData::Uint(width))
    }

    pub fn real(&self, width: RealWidth) -> TypeId {
        self.intern(TypeData::Real(width))
    }

    pub fn function(&self, formals: Vec<QualifiedType>, ret: QualifiedType) -> TypeId {
        self.intern(TypeData::Function(FunctionType { formals, ret }))
    }

    /// Replace the substitutions of composite `generic`.
    ///
    /// Returns `generic` unchanged when it is not a composite or the
    /// substitution list has the wrong length.
    pub fn instantiate(&self, generic: TypeId, subs: Vec<Option<QualifiedType>>) -> TypeId {
        match self.composite(generic) {
            Some(c) if c.formals.len() == subs.len() => {
                self.intern(TypeData::Composite(CompositeType { subs, ..c }))
            }
            _ => generic,
        }
    }

    /// The fully generic version of a composite; other types map to themselves.
    pub fn generic_root(&self, id: TypeId) -> TypeId {
        match self.composite(id) {
            Some(c) => self.intern(TypeData::Composite(c.generic_root())),
            None => id,
        }
    }

    /// Parent chain of a class, nearest first.
    pub fn ancestors(&self, id: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut current = self.composite(id).and_then(|c| c.parent);
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = self.composite(parent).and_then(|c| c.parent);
        }
        out
    }

    /// Classify `id` as concrete, generic, or generic with usable defaults.
    pub fn genericity(&self, id: TypeId) -> Genericity {
        if id == TypeId::ANY {
            return Genericity::Generic;
        }
        if id.is_primitive() {
            return Genericity::Concrete;
        }
        match &*self.lookup(id) {
            TypeData::Composite(c) => {
                let own = if c.is_fully_substituted() {
                    Genericity::Concrete
                } else if c
                    .formals
                    .iter()
                    .zip(&c.subs)
                    .all(|(f, s)| s.is_some() || f.has_default)
                {
                    Genericity::GenericWithDefaults
                } else {
                    Genericity::Generic
                };
                let nested = c
                    .subs
                    .iter()
                    .flatten()
                    .filter(|s| s.kind == QualKind::Type)
                    .map(|s| self.genericity(s.ty))
                    .fold(Genericity::Concrete, Genericity::join);
                let parent = c
                    .parent
                    .map_or(Genericity::Concrete, |p| self.genericity(p));
                own.join(nested).join(parent)
            }
            TypeData::Function(f) => f
                .formals
                .iter()
                .chain(std::iter::once(&f.ret))
                .map(|q| self.genericity(q.ty))
                .fold(Genericity::Concrete, Genericity::join),
            _ => Genericity::Concrete,
        }
    }

    /// Render `id` the way it is spelled in source.
    pub fn display(&self, id: TypeId, names: &dyn StringLookup) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id, names);
        out
    }

    fn write_type(&self, out: &mut String, id: TypeId, names: &dyn StringLookup) {
        let _ = match &*self.lookup(id) {
            TypeData::Unknown => write!(out, "<unknown>"),
            TypeData::Erroneous => write!(out, "<error>"),
            TypeData::Void => write!(out, "void"),
            TypeData::Any => write!(out, "?"),
            TypeData::Bool => write!(out, "bool"),
            TypeData::Int(IntWidth::W64) => write!(out, "int"),
            TypeData::Int(w) => write!(out, "int({})", w.bits()),
            TypeData::Uint(IntWidth::W64) => write!(out, "uint"),
            TypeData::Uint(w) => write!(out, "uint({})", w.bits()),
            TypeData::Real(RealWidth::W64) => write!(out, "real"),
            TypeData::Real(w) => write!(out, "real({})", w.bits()),
            TypeData::String => write!(out, "string"),
            TypeData::CString => write!(out, "c_string"),
            TypeData::Composite(c) => {
                out.push_str(names.lookup(c.name));
                if !c.formals.is_empty() {
                    out.push('(');
                    for (i, sub) in c.subs.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_qualified(out, sub.as_ref(), names);
                    }
                    out.push(')');
                }
                Ok(())
            }
            TypeData::Function(f) => {
                out.push_str("proc(");
                for (i, formal) in f.formals.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, formal.ty, names);
                }
                out.push_str("): ");
                self.write_type(out, f.ret.ty, names);
                Ok(())
            }
        };
    }

    fn write_qualified(
        &self,
        out: &mut String,
        qt: Option<&QualifiedType>,
        names: &dyn StringLookup,
    ) {
        match qt {
            None => out.push('?'),
            Some(QualifiedType {
                param: Some(value), ..
            }) => {
                let _ = write!(out, "{}", value.display(names));
            }
            Some(qt) => self.write_type(out, qt.ty, names),
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference-counted type table shared across resolver threads.
#[derive(Clone, Default)]
pub struct SharedTypeInterner(Arc<TypeInterner>);

impl SharedTypeInterner {
    pub fn new() -> Self {
        SharedTypeInterner(Arc::new(TypeInterner::new()))
    }
}

impl std::ops::Deref for SharedTypeInterner {
    type Target = TypeInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
