//! Resolution context: loaded modules, shared interners and every memo table.
//!
//! A `Context` is the single owner of resolution state for a session. All
//! queries take `&Context`, so independent functions can be resolved from
//! several threads against the same caches.

use crate::config::ResolverConfig;
use crate::lifecycle::{LifecycleFn, LifecycleKey};
use crate::methods::{CandidateLevels, MethodCandidatesKey, MethodIndex};
use crate::query::{Engine, QueryKey, QueryTable};
use crate::record::FieldInfo;
use crate::results::{ResolvedExpression, ResolvedFunction, ResolvedModule};
use crate::scope::ScopeDecls;
use crate::signature::{SigId, SigInterner, TypedSignature, UntypedSignature, WhereOutcome};
use crate::{QueryResult, ResolveError};
use kestrel_diagnostic::Diagnostic;
use kestrel_ir::{Name, NodeId, NodeKind, SharedInterner, StringInterner, SyntaxTree};
use kestrel_types::{QualifiedType, SharedTypeInterner, TypeId, TypeInterner};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Names the resolver compares against, interned once.
pub(crate) struct WellKnown {
    pub this: Name,
    pub init: Name,
    pub init_eq: Name,
    pub deinit: Name,
    pub assign: Name,
    pub type_: Name,
    builtins: FxHashMap<Name, TypeId>,
}

impl WellKnown {
    fn new(interner: &StringInterner) -> Self {
        let builtins = [
            ("int", TypeId::INT),
            ("uint", TypeId::UINT),
            ("real", TypeId::REAL),
            ("bool", TypeId::BOOL),
            ("string", TypeId::STRING),
            ("c_string", TypeId::CSTRING),
            ("void", TypeId::VOID),
        ]
        .into_iter()
        .map(|(text, ty)| (interner.intern(text), ty))
        .collect();
        WellKnown {
            this: interner.intern("this"),
            init: interner.intern("init"),
            init_eq: interner.intern("init="),
            deinit: interner.intern("deinit"),
            assign: interner.intern("="),
            type_: interner.intern("type"),
            builtins,
        }
    }
}

/// One memo table per query kind.
#[derive(Default)]
pub(crate) struct Tables {
    pub scope_decls: QueryTable<NodeId, Arc<ScopeDecls>>,
    pub method_index: QueryTable<Name, Arc<MethodIndex>>,
    pub method_candidates: QueryTable<MethodCandidatesKey, CandidateLevels>,
    pub record_type: QueryTable<NodeId, TypeId>,
    pub defaults_applied: QueryTable<TypeId, TypeId>,
    pub fields: QueryTable<TypeId, Arc<Vec<FieldInfo>>>,
    pub untyped_signature: QueryTable<NodeId, Arc<UntypedSignature>>,
    pub signature: QueryTable<SigId, Arc<TypedSignature>>,
    pub where_clause: QueryTable<SigId, WhereOutcome>,
    pub return_type: QueryTable<SigId, QualifiedType>,
    pub resolved_function: QueryTable<SigId, Arc<ResolvedFunction>>,
    pub module_stmt: QueryTable<NodeId, Arc<FxHashMap<NodeId, ResolvedExpression>>>,
    pub resolved_module: QueryTable<Name, Arc<ResolvedModule>>,
    pub type_for_symbol: QueryTable<NodeId, QualifiedType>,
    pub lifecycle: QueryTable<LifecycleKey, LifecycleFn>,
}

impl Tables {
    /// Evict the cached value of `key`.
    fn forget(&self, key: &QueryKey) {
        match key {
            QueryKey::ModuleInput(_) => {}
            QueryKey::ScopeDecls(k) => {
                self.scope_decls.remove(k);
            }
            QueryKey::MethodIndex(k) => {
                self.method_index.remove(k);
            }
            QueryKey::MethodCandidates(k) => {
                self.method_candidates.remove(k);
            }
            QueryKey::RecordType(k) => {
                self.record_type.remove(k);
            }
            QueryKey::DefaultsApplied(k) => {
                self.defaults_applied.remove(k);
            }
            QueryKey::Fields(k) => {
                self.fields.remove(k);
            }
            QueryKey::UntypedSignature(k) => {
                self.untyped_signature.remove(k);
            }
            QueryKey::Signature(k) => {
                self.signature.remove(k);
            }
            QueryKey::WhereClause(k) => {
                self.where_clause.remove(k);
            }
            QueryKey::ReturnType(k) => {
                self.return_type.remove(k);
            }
            QueryKey::ResolvedFunction(k) => {
                self.resolved_function.remove(k);
            }
            QueryKey::ModuleStmt(k) => {
                self.module_stmt.remove(k);
            }
            QueryKey::ResolvedModule(k) => {
                self.resolved_module.remove(k);
            }
            QueryKey::TypeForSymbol(k) => {
                self.type_for_symbol.remove(k);
            }
            QueryKey::Lifecycle(k) => {
                self.lifecycle.remove(k);
            }
            #[cfg(test)]
            QueryKey::Test(_) => {}
        }
    }
}

/// Session state shared by every query.
pub struct Context {
    interner: SharedInterner,
    pub(crate) types: SharedTypeInterner,
    config: ResolverConfig,
    pub(crate) engine: Engine,
    pub(crate) tables: Tables,
    pub(crate) sigs: SigInterner,
    modules: RwLock<FxHashMap<Name, Arc<SyntaxTree>>>,
    pub(crate) names: WellKnown,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_interner(SharedInterner::new())
    }

    /// Context over an interner the parser already filled.
    pub fn with_interner(interner: SharedInterner) -> Self {
        let names = WellKnown::new(&interner);
        Context {
            interner,
            types: SharedTypeInterner::new(),
            config: ResolverConfig::default(),
            engine: Engine::new(),
            tables: Tables::default(),
            sigs: SigInterner::default(),
            modules: RwLock::new(FxHashMap::default()),
            names,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn types(&self) -> &TypeInterner {
        &self.types
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Load or replace a module's syntax tree.
    ///
    /// Replacing a tree evicts every cached result that read it. Loading a
    /// tree equal to the current one keeps all caches.
    pub fn set_module(&self, tree: SyntaxTree) {
        let name = tree.module();
        {
            let mut modules = self.modules.write();
            if modules.get(&name).is_some_and(|t| **t == tree) {
                return;
            }
            modules.insert(name, Arc::new(tree));
        }
        let stale = self.engine.invalidate(&QueryKey::ModuleInput(name));
        debug!(module = self.interner.lookup(name), stale = stale.len(), "module replaced");
        for key in &stale {
            self.tables.forget(key);
        }
    }

    /// Syntax tree of `module`, recorded as an input of the running query.
    pub(crate) fn tree(&self, module: Name) -> QueryResult<Arc<SyntaxTree>> {
        self.engine.record_read(&QueryKey::ModuleInput(module));
        self.loaded(module)
            .ok_or(ResolveError::UnknownModule { module })
    }

    /// Syntax tree of `module` if it is loaded. Also recorded as a read so a
    /// later `set_module` of the same name invalidates the reader.
    pub(crate) fn loaded(&self, module: Name) -> Option<Arc<SyntaxTree>> {
        self.engine.record_read(&QueryKey::ModuleInput(module));
        self.modules.read().get(&module).cloned()
    }

    pub(crate) fn builtin_type(&self, name: Name) -> Option<TypeId> {
        self.names.builtins.get(&name).copied()
    }

    pub(crate) fn is_record_decl(&self, decl: NodeId) -> QueryResult<bool> {
        let tree = self.tree(decl.module)?;
        Ok(matches!(tree.kind(decl), Some(NodeKind::Record(_))))
    }

    /// Kind of `decl`, cloned out of its tree.
    pub(crate) fn decl_kind(&self, decl: NodeId) -> QueryResult<NodeKind> {
        let tree = self.tree(decl.module)?;
        tree.kind(decl)
            .cloned()
            .ok_or(ResolveError::malformed(decl, "node is not in its module"))
    }

    /// Attach `diag` to the running query, located at `node`.
    pub(crate) fn report_at(&self, node: NodeId, diag: Diagnostic) {
        let span = self
            .loaded(node.module)
            .map_or(kestrel_ir::Span::DUMMY, |t| t.span(node));
        self.engine.report(diag.at(node, span));
    }

    /// Display a name.
    pub(crate) fn name_str(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    /// Display a type.
    pub fn display_type(&self, ty: TypeId) -> String {
        self.types.display(ty, &*self.interner)
    }
}
