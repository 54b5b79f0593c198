//! Sharded string interner.
//!
//! Interning is O(1) amortized and safe to call from several resolver
//! threads at once: each shard has its own lock, and strings are leaked so
//! a `Name` stays valid for the rest of the process.

use super::Name;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct InternShard {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl InternShard {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(128),
        }
    }

    fn insert(&mut self, text: &'static str) -> Option<u32> {
        let local = u32::try_from(self.strings.len())
            .ok()
            .filter(|local| *local <= Name::MAX_LOCAL)?;
        self.strings.push(text);
        self.map.insert(text, local);
        Some(local)
    }
}

/// Error when a shard runs out of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    ShardOverflow { shard_idx: usize, count: usize },
}

impl std::fmt::Display for InternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternError::ShardOverflow { shard_idx, count } => write!(
                f,
                "interner shard {shard_idx} is full ({count} strings, limit {})",
                Name::MAX_LOCAL
            ),
        }
    }
}

impl std::error::Error for InternError {}

/// Session-wide string table.
pub struct StringInterner {
    shards: [RwLock<InternShard>; Name::NUM_SHARDS],
    total_count: AtomicUsize,
}

impl StringInterner {
    /// Words the resolver looks up by name on every method call.
    const PRELUDE: &'static [&'static str] = &[
        "this", "init", "init=", "deinit", "=", "type", "param", "int", "uint", "real", "bool",
        "string", "c_string", "void", "true", "false",
    ];

    pub fn new() -> Self {
        let shards = std::array::from_fn(|_| RwLock::new(InternShard::new()));
        let interner = Self {
            shards,
            total_count: AtomicUsize::new(0),
        };
        // The empty string must land in slot 0 of shard 0 so that it equals Name::EMPTY.
        {
            let mut shard = interner.shards[0].write();
            shard.insert("");
        }
        interner.total_count.store(1, Ordering::Relaxed);
        for word in Self::PRELUDE {
            interner.intern(word);
        }
        interner
    }

    #[inline]
    fn shard_for(s: &str) -> usize {
        if s.is_empty() {
            return 0;
        }
        let mut hash = 0u32;
        for byte in s.bytes().take(8) {
            hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
        }
        (hash as usize) % Name::NUM_SHARDS
    }

    /// Intern `s`, failing only when its shard is full.
    pub fn try_intern(&self, s: &str) -> Result<Name, InternError> {
        let shard_idx = Self::shard_for(s);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard_idx is bounded by NUM_SHARDS (16)"
        )]
        let shard_bits = shard_idx as u32;
        let shard = &self.shards[shard_idx];

        if let Some(&local) = shard.read().map.get(s) {
            return Ok(Name::new(shard_bits, local));
        }

        let mut guard = shard.write();
        if let Some(&local) = guard.map.get(s) {
            return Ok(Name::new(shard_bits, local));
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let count = guard.strings.len();
        let local = guard
            .insert(leaked)
            .ok_or(InternError::ShardOverflow { shard_idx, count })?;
        self.total_count.fetch_add(1, Ordering::Relaxed);
        Ok(Name::new(shard_bits, local))
    }

    /// Intern `s`.
    ///
    /// # Panics
    /// Panics if a shard exceeds 2^28 strings.
    #[inline]
    pub fn intern(&self, s: &str) -> Name {
        self.try_intern(s).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Text of an interned name.
    pub fn lookup(&self, name: Name) -> &'static str {
        let guard = self.shards[name.shard()].read();
        guard.strings.get(name.local()).copied().unwrap_or("<?>")
    }

    /// Look up `s` without interning it.
    pub fn get(&self, s: &str) -> Option<Name> {
        let shard_idx = Self::shard_for(s);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard_idx is bounded by NUM_SHARDS (16)"
        )]
        let shard_bits = shard_idx as u32;
        let guard = self.shards[shard_idx].read();
        guard.map.get(s).map(|&local| Name::new(shard_bits, local))
    }

    pub fn len(&self) -> usize {
        self.total_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to interned text without depending on the concrete interner.
pub trait StringLookup {
    fn lookup(&self, name: Name) -> &str;
}

impl StringLookup for StringInterner {
    fn lookup(&self, name: Name) -> &str {
        StringInterner::lookup(self, name)
    }
}

/// Reference-counted interner handle shared by the resolver context, its
/// worker threads and the incremental driver.
#[derive(Clone, Default)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    pub fn new() -> Self {
        SharedInterner(Arc::new(StringInterner::new()))
    }

    /// Whether two handles point at the same table.
    pub fn same_table(&self, other: &SharedInterner) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for SharedInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedInterner({} strings)", self.len())
    }
}
