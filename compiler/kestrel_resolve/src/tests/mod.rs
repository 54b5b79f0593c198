//! Resolver tests over whole programs.
//!
//! Programs are built with `kestrel_ir::build` and loaded into a fresh
//! [`Context`]; nodes are located by name so expectations survive changes
//! to the lowering order.
//!
//! - `lifecycle_tests`: default/copy initialization, assignment, moves and
//!   destruction order
//! - `call_tests`: free functions, methods, overload specificity
//! - `generic_tests`: instantiation, defaults, `where` clauses, params
//! - `module_tests`: module statements, `use`, symbols, records
//! - `session_tests`: caching, invalidation and parallel resolution

mod generic_tests;
mod lifecycle_tests;
mod module_tests;
mod session_tests;

use crate::results::{ActionKind, ResolvedFunction};
use crate::Context;
use kestrel_diagnostic::Diagnostic;
use kestrel_ir::build::ModuleSyn;
use kestrel_ir::{Name, NodeId, NodeKind, Op, SyntaxTree};
use kestrel_types::QualifiedType;
use std::sync::Arc;

/// One or more modules loaded into a context; the first is the main one.
pub(crate) struct Program {
    pub cx: Context,
    pub trees: Vec<SyntaxTree>,
}

impl Program {
    pub fn new(main: ModuleSyn) -> Self {
        Self::with_modules(vec![main])
    }

    pub fn with_modules(modules: Vec<ModuleSyn>) -> Self {
        Self::in_context(Context::new(), modules)
    }

    pub fn in_context(cx: Context, modules: Vec<ModuleSyn>) -> Self {
        let trees: Vec<SyntaxTree> = modules
            .iter()
            .map(|m| m.lower(cx.interner()).unwrap())
            .collect();
        for tree in &trees {
            cx.set_module(tree.clone());
        }
        Program { cx, trees }
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.trees[0]
    }

    pub fn name(&self, s: &str) -> Name {
        self.cx.interner().intern(s)
    }

    pub fn module(&self) -> Name {
        self.tree().module()
    }

    fn nodes_in(&self, scope: NodeId) -> impl Iterator<Item = (NodeId, &NodeKind)> + '_ {
        let tree = self.tree();
        tree.subtree(scope).filter_map(move |id| tree.kind(id).map(|k| (id, k)))
    }

    /// First function declared with `name` that has no receiver.
    pub fn func(&self, name: &str) -> NodeId {
        self.funcs(name)[0]
    }

    /// Functions declared with `name` that have no receiver, in postorder.
    pub fn funcs(&self, name: &str) -> Vec<NodeId> {
        let name = self.name(name);
        self.tree()
            .iter()
            .filter(|(_, n)| {
                n.kind
                    .as_function()
                    .is_some_and(|f| f.name == name && f.receiver.is_none())
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Declaration of the single function call `call` resolved to.
    pub fn callee(&self, func: NodeId, call: NodeId) -> Option<NodeId> {
        let sig = self.resolve(func).by_node(call)?.most_specific()?;
        Some(self.cx.signature(sig).unwrap().decl())
    }

    /// Qualified type of local `name` of `func`.
    pub fn local_type(&self, func: NodeId, name: &str) -> QualifiedType {
        self.cx.type_for_symbol(self.var_in(func, name)).unwrap()
    }

    /// Variable declared as `name` anywhere under `scope`.
    pub fn var_in(&self, scope: NodeId, name: &str) -> NodeId {
        let name = self.name(name);
        self.nodes_in(scope)
            .find(|(_, k)| matches!(k, NodeKind::Variable(v) if v.name == name))
            .map(|(id, _)| id)
            .unwrap()
    }

    /// Module-level variable `name`.
    pub fn global(&self, name: &str) -> NodeId {
        self.var_in(self.tree().root(), name)
    }

    pub fn body(&self, func: NodeId) -> NodeId {
        self.tree()
            .kind(func)
            .and_then(NodeKind::as_function)
            .and_then(|f| f.body)
            .unwrap()
    }

    /// Assignments under `scope`, in source order.
    pub fn assigns(&self, scope: NodeId) -> Vec<NodeId> {
        self.nodes_in(scope)
            .filter(|(_, k)| matches!(k, NodeKind::OpCall { op: Op::Assign, .. }))
            .map(|(id, _)| id)
            .collect()
    }

    /// Calls of `callee` by bare name under `scope`, in source order.
    pub fn calls(&self, scope: NodeId, callee: &str) -> Vec<NodeId> {
        let callee = self.name(callee);
        let tree = self.tree();
        self.nodes_in(scope)
            .filter(|(_, k)| match k {
                NodeKind::Call { callee: c, .. } => {
                    matches!(tree.kind(*c), Some(NodeKind::Identifier { name }) if *name == callee)
                }
                _ => false,
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Identifiers spelled `name` under `scope`, in source order.
    pub fn idents(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        let name = self.name(name);
        self.nodes_in(scope)
            .filter(|(_, k)| matches!(k, NodeKind::Identifier { name: n } if *n == name))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn resolve(&self, func: NodeId) -> Arc<ResolvedFunction> {
        self.cx.resolve_concrete_function(func, &[]).unwrap()
    }

    /// `(kind, at, acted_on)` of every action of `func`, in emission order.
    pub fn actions(&self, func: NodeId) -> Vec<(ActionKind, NodeId, Option<NodeId>)> {
        self.resolve(func)
            .actions
            .iter()
            .map(|a| (a.kind, a.at, a.acted_on))
            .collect()
    }

    pub fn global_type(&self, name: &str) -> QualifiedType {
        self.cx.type_for_symbol(self.global(name)).unwrap()
    }

    pub fn display(&self, qt: QualifiedType) -> String {
        self.cx.display_type(qt.ty)
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.cx
            .diagnostics()
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect()
    }

    /// Symbolic names of the reported errors.
    pub fn error_names(&self) -> Vec<&'static str> {
        self.errors().iter().map(Diagnostic::code_name).collect()
    }

    pub fn assert_no_errors(&self) {
        let errors = self.errors();
        assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    }
}
