//! Memoizing query engine.
//!
//! Every resolution step is a query: a pure function of a hashable key that
//! may call other queries. The engine caches each result in a typed
//! [`QueryTable`], records which queries each computation read, and keeps
//! the diagnostics a computation emitted next to its cached value so they
//! are reported exactly once no matter how often the result is reused.
//!
//! # Concurrency
//!
//! Queries can run on several threads at once. A key being computed is
//! *claimed* by its thread; other threads asking for it block until the
//! owner finishes and then read the cached value. A thread asking for a key
//! it already claimed, or whose wait would close a cycle through other
//! threads, gets [`ResolveError::RecursionDetected`] instead of
//! deadlocking. Failed computations are never cached.
//!
//! # Invalidation
//!
//! Inputs are recorded as [`QueryKey::ModuleInput`] reads. Replacing an
//! input walks the reverse dependency edges and evicts every transitively
//! dependent entry together with its diagnostics.

use crate::error::{QueryResult, ResolveError};
use crate::lifecycle::LifecycleKey;
use crate::methods::MethodCandidatesKey;
use crate::signature::SigId;
use kestrel_diagnostic::Diagnostic;
use kestrel_ir::{Name, NodeId};
use kestrel_types::TypeId;
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use tracing::trace;

mod table;

pub use table::QueryTable;

#[cfg(test)]
mod tests;

/// Identity of one query invocation.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum QueryKey {
    /// A module's syntax tree. Never computed; only read and invalidated.
    ModuleInput(Name),
    ScopeDecls(NodeId),
    MethodIndex(Name),
    MethodCandidates(MethodCandidatesKey),
    RecordType(NodeId),
    DefaultsApplied(TypeId),
    Fields(TypeId),
    UntypedSignature(NodeId),
    Signature(SigId),
    WhereClause(SigId),
    ReturnType(SigId),
    ResolvedFunction(SigId),
    ModuleStmt(NodeId),
    ResolvedModule(Name),
    TypeForSymbol(NodeId),
    Lifecycle(LifecycleKey),
    /// Keys used by engine tests.
    #[cfg(test)]
    Test(u32),
}

impl QueryKey {
    /// Declaration node the query is about, when it has one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            QueryKey::ScopeDecls(n)
            | QueryKey::RecordType(n)
            | QueryKey::UntypedSignature(n)
            | QueryKey::ModuleStmt(n)
            | QueryKey::TypeForSymbol(n) => Some(*n),
            _ => None,
        }
    }

    /// Short query name for trace output.
    pub fn label(&self) -> &'static str {
        match self {
            QueryKey::ModuleInput(_) => "module_input",
            QueryKey::ScopeDecls(_) => "scope_decls",
            QueryKey::MethodIndex(_) => "method_index",
            QueryKey::MethodCandidates(_) => "method_candidates",
            QueryKey::RecordType(_) => "record_type",
            QueryKey::DefaultsApplied(_) => "defaults_applied",
            QueryKey::Fields(_) => "fields",
            QueryKey::UntypedSignature(_) => "untyped_signature",
            QueryKey::Signature(_) => "signature",
            QueryKey::WhereClause(_) => "where_clause",
            QueryKey::ReturnType(_) => "return_type",
            QueryKey::ResolvedFunction(_) => "resolved_function",
            QueryKey::ModuleStmt(_) => "module_stmt",
            QueryKey::ResolvedModule(_) => "resolved_module",
            QueryKey::TypeForSymbol(_) => "type_for_symbol",
            QueryKey::Lifecycle(_) => "lifecycle",
            #[cfg(test)]
            QueryKey::Test(_) => "test",
        }
    }
}

/// Bookkeeping for one running computation.
struct Frame {
    key: QueryKey,
    deps: Vec<QueryKey>,
    diagnostics: Vec<Diagnostic>,
}

/// Which thread computes which key, and which key each blocked thread
/// waits for.
#[derive(Default)]
struct InFlight {
    owners: FxHashMap<QueryKey, ThreadId>,
    waiting: FxHashMap<ThreadId, QueryKey>,
}

impl InFlight {
    /// Whether `me` waiting on a key owned by `owner` closes a wait cycle.
    fn would_deadlock(&self, me: ThreadId, owner: ThreadId) -> bool {
        let mut current = owner;
        for _ in 0..=self.waiting.len() {
            if current == me {
                return true;
            }
            let Some(next) = self
                .waiting
                .get(&current)
                .and_then(|key| self.owners.get(key))
            else {
                return false;
            };
            current = *next;
        }
        false
    }
}

#[derive(Default)]
struct DepGraph {
    /// `key -> queries that read it`.
    dependents: FxHashMap<QueryKey, FxHashSet<QueryKey>>,
    /// `key -> queries it read`.
    dependencies: FxHashMap<QueryKey, Vec<QueryKey>>,
}

#[derive(Default)]
struct DiagnosticStore {
    /// Diagnostics of cached queries, tagged with their completion order.
    by_query: FxHashMap<QueryKey, (u64, Vec<Diagnostic>)>,
    /// Diagnostics reported outside any query, in first-report order.
    session: Vec<Diagnostic>,
    session_seen: FxHashSet<Diagnostic>,
}

/// Dependency tracking, claims and diagnostics shared by all query tables.
pub struct Engine {
    in_flight: Mutex<InFlight>,
    released: Condvar,
    frames: Mutex<FxHashMap<ThreadId, Vec<Frame>>>,
    graph: RwLock<DepGraph>,
    diagnostics: Mutex<DiagnosticStore>,
    sequence: AtomicU64,
    executions: AtomicU64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases a claim even if the computation panics.
struct Claim<'a> {
    engine: &'a Engine,
    key: &'a QueryKey,
    thread: ThreadId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.engine.in_flight.lock().owners.remove(self.key);
        self.engine.released.notify_all();
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            in_flight: Mutex::new(InFlight::default()),
            released: Condvar::new(),
            frames: Mutex::new(FxHashMap::default()),
            graph: RwLock::new(DepGraph::default()),
            diagnostics: Mutex::new(DiagnosticStore::default()),
            sequence: AtomicU64::new(0),
            executions: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or compute, cache and return it.
    ///
    /// `qkey` is the engine-wide identity of the same query; `compute`
    /// receives `owner` back so it can call further queries.
    pub fn memo<C, K, V>(
        &self,
        owner: &C,
        table: &QueryTable<K, V>,
        key: K,
        qkey: QueryKey,
        compute: impl FnOnce(&C) -> QueryResult<V>,
    ) -> QueryResult<V>
    where
        K: Clone + Eq + Hash,
        V: Clone,
    {
        self.record_read(&qkey);
        if let Some(value) = table.get(&key) {
            trace!(query = qkey.label(), "cache hit");
            return Ok(value);
        }

        let me = thread::current().id();
        {
            let mut flight = self.in_flight.lock();
            loop {
                if let Some(value) = table.get(&key) {
                    return Ok(value);
                }
                match flight.owners.get(&qkey).copied() {
                    None => {
                        flight.owners.insert(qkey.clone(), me);
                        break;
                    }
                    Some(owner) if owner == me || flight.would_deadlock(me, owner) => {
                        return Err(ResolveError::RecursionDetected { query: qkey });
                    }
                    Some(_) => {
                        flight.waiting.insert(me, qkey.clone());
                        self.released.wait(&mut flight);
                        flight.waiting.remove(&me);
                    }
                }
            }
        }

        let claim = Claim {
            engine: self,
            key: &qkey,
            thread: me,
        };
        trace!(query = qkey.label(), "compute");
        self.push_frame(me, qkey.clone());
        let result = compute(owner);
        let frame = self.pop_frame(claim.thread);

        if let Ok(value) = &result {
            table.insert(key, value.clone());
            if let Some(frame) = frame {
                self.complete(frame);
            }
            self.executions.fetch_add(1, Ordering::Relaxed);
        }
        drop(claim);
        result
    }

    /// Note that the query running on this thread read `key`.
    pub fn record_read(&self, key: &QueryKey) {
        let me = thread::current().id();
        let mut frames = self.frames.lock();
        if let Some(frame) = frames.get_mut(&me).and_then(|stack| stack.last_mut()) {
            if !frame.deps.contains(key) {
                frame.deps.push(key.clone());
            }
        }
    }

    /// Attach `diag` to the query running on this thread, or to the
    /// session when no query is running. A session diagnostic equal to
    /// one already reported is dropped.
    pub fn report(&self, diag: Diagnostic) {
        let me = thread::current().id();
        {
            let mut frames = self.frames.lock();
            if let Some(frame) = frames.get_mut(&me).and_then(|stack| stack.last_mut()) {
                frame.diagnostics.push(diag);
                return;
            }
        }
        let mut store = self.diagnostics.lock();
        if store.session_seen.insert(diag.clone()) {
            store.session.push(diag);
        }
    }

    /// Diagnostics of every cached query in completion order, followed by
    /// session-level ones.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let store = self.diagnostics.lock();
        let mut tagged: Vec<_> = store.by_query.values().collect();
        tagged.sort_by_key(|(seq, _)| *seq);
        tagged
            .into_iter()
            .flat_map(|(_, diags)| diags.iter().cloned())
            .chain(store.session.iter().cloned())
            .collect()
    }

    /// Number of query computations that completed successfully.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Every query that transitively read `root`, excluding `root`.
    ///
    /// Their edges and diagnostics are dropped here; the caller evicts the
    /// cached values from the tables.
    pub fn invalidate(&self, root: &QueryKey) -> Vec<QueryKey> {
        let mut graph = self.graph.write();
        let mut seen: FxHashSet<QueryKey> = FxHashSet::default();
        let mut queue: VecDeque<QueryKey> = VecDeque::new();
        queue.push_back(root.clone());
        let mut stale = Vec::new();

        while let Some(key) = queue.pop_front() {
            let Some(dependents) = graph.dependents.remove(&key) else {
                continue;
            };
            for dependent in dependents {
                if seen.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                    stale.push(dependent);
                }
            }
        }

        let mut store = self.diagnostics.lock();
        for key in &stale {
            if let Some(deps) = graph.dependencies.remove(key) {
                for dep in deps {
                    if let Some(set) = graph.dependents.get_mut(&dep) {
                        set.remove(key);
                    }
                }
            }
            store.by_query.remove(key);
        }
        trace!(root = root.label(), stale = stale.len(), "invalidated");
        stale
    }

    fn push_frame(&self, thread: ThreadId, key: QueryKey) {
        self.frames.lock().entry(thread).or_default().push(Frame {
            key,
            deps: Vec::new(),
            diagnostics: Vec::new(),
        });
    }

    fn pop_frame(&self, thread: ThreadId) -> Option<Frame> {
        let mut frames = self.frames.lock();
        let stack = frames.get_mut(&thread)?;
        let frame = stack.pop();
        if stack.is_empty() {
            frames.remove(&thread);
        }
        frame
    }

    fn complete(&self, frame: Frame) {
        let Frame {
            key,
            deps,
            diagnostics,
        } = frame;
        {
            let mut graph = self.graph.write();
            for dep in &deps {
                graph
                    .dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(key.clone());
            }
            graph.dependencies.insert(key.clone(), deps);
        }
        if !diagnostics.is_empty() {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            self.diagnostics
                .lock()
                .by_query
                .insert(key, (seq, diagnostics));
        }
    }
}
