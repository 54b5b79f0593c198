//! Salsa database.
//!
//! Holds Salsa's storage, the string interner every syntax tree was lowered
//! with, and the loaded modules by name so `use` can find its target.

use crate::input::SourceModule;
use kestrel_ir::{Name, SharedInterner, StringInterner, SyntaxTree};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Database access for driver queries.
#[salsa::db]
pub trait Db: salsa::Database {
    /// Interner shared with every resolution context created by a query.
    fn interner(&self) -> &SharedInterner;

    /// Loaded module called `name`.
    fn module(&self, name: Name) -> Option<SourceModule>;
}

/// Concrete compiler database.
///
/// Clone shares the interner, the module table and the event log.
#[salsa::db]
#[derive(Clone)]
pub struct CompilerDb {
    storage: salsa::Storage<Self>,
    interner: SharedInterner,
    modules: Arc<Mutex<FxHashMap<Name, SourceModule>>>,
    /// Salsa execution events, when logging is enabled.
    logs: Arc<Mutex<Option<Vec<String>>>>,
}

impl Default for CompilerDb {
    fn default() -> Self {
        Self {
            storage: salsa::Storage::default(),
            interner: SharedInterner::new(),
            modules: Arc::default(),
            logs: Arc::default(),
        }
    }
}

impl CompilerDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interner to lower syntax trees with before adding them.
    pub fn strings(&self) -> &StringInterner {
        &self.interner
    }

    /// Register a module tree, or return the existing input of that name.
    ///
    /// Replacing the tree of an existing module goes through
    /// `SourceModule::set_tree` so dependent queries are invalidated.
    pub fn add_module(&self, tree: SyntaxTree) -> SourceModule {
        let name = tree.module();
        if let Some(&existing) = self.modules.lock().get(&name) {
            return existing;
        }
        let module = SourceModule::new(self, name, tree);
        self.modules.lock().insert(name, module);
        module
    }

    /// Start recording Salsa execution events.
    pub fn enable_logging(&self) {
        let mut logs = self.logs.lock();
        if logs.is_none() {
            *logs = Some(vec![]);
        }
    }

    /// Take the recorded events.
    pub fn take_logs(&self) -> Vec<String> {
        self.logs.lock().as_mut().map(std::mem::take).unwrap_or_default()
    }
}

#[salsa::db]
impl Db for CompilerDb {
    fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    fn module(&self, name: Name) -> Option<SourceModule> {
        self.modules.lock().get(&name).copied()
    }
}

#[salsa::db]
impl salsa::Database for CompilerDb {
    fn salsa_event(&self, event: &dyn Fn() -> salsa::Event) {
        if let Some(logs) = &mut *self.logs.lock() {
            let event = event();
            // Executions are what incrementality tests count.
            if let salsa::EventKind::WillExecute { .. } = event.kind {
                logs.push(format!("{event:?}"));
            }
        }
    }
}
