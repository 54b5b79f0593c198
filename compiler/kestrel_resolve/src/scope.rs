//! Scopes and name lookup.
//!
//! Lookup walks the enclosing scopes of a use point, innermost first.
//! Each scope that declares the name contributes one [`Level`]; the first
//! level wins for ordinary identifiers, while calls consider every level in
//! order so outer overloads are reached when inner ones do not apply.

use crate::query::QueryKey;
use crate::{Context, QueryResult};
use kestrel_ir::{Name, NodeId, NodeKind};
use kestrel_types::TypeId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Names declared directly in one scope node.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScopeDecls {
    by_name: FxHashMap<Name, SmallVec<[NodeId; 2]>>,
    uses: Vec<Name>,
}

impl ScopeDecls {
    pub fn get(&self, name: Name) -> &[NodeId] {
        self.by_name.get(&name).map_or(&[], |d| d.as_slice())
    }

    /// Modules brought in by `use` statements, in source order.
    pub fn uses(&self) -> &[Name] {
        &self.uses
    }

    fn add(&mut self, name: Name, decl: NodeId) {
        self.by_name.entry(name).or_default().push(decl);
    }
}

/// What a name resolved to at one scope level.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Binding {
    /// Variable, formal, record or function declaration.
    Decl(NodeId),
    /// The implicit receiver of the enclosing method.
    This,
    Builtin(TypeId),
    Module(Name),
}

/// Bindings contributed by one scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    pub scope: NodeId,
    pub bindings: SmallVec<[Binding; 2]>,
    /// Members of the enclosing method's receiver, reached through `this`.
    pub via_receiver: bool,
}

impl Context {
    pub(crate) fn scope_decls(&self, scope: NodeId) -> QueryResult<Arc<ScopeDecls>> {
        self.engine.memo(
            self,
            &self.tables.scope_decls,
            scope,
            QueryKey::ScopeDecls(scope),
            |cx| compute_scope_decls(cx, scope).map(Arc::new),
        )
    }

    /// Members of `record` named `name`, including inherited ones.
    pub(crate) fn record_members(&self, record: NodeId, name: Name) -> QueryResult<Vec<NodeId>> {
        let mut out = Vec::new();
        for decl in self.record_lineage(record)? {
            out.extend_from_slice(self.scope_decls(decl)?.get(name));
        }
        Ok(out)
    }

    /// `record` followed by the declarations of its ancestor classes.
    pub(crate) fn record_lineage(&self, record: NodeId) -> QueryResult<Vec<NodeId>> {
        let ty = self.record_type(record)?;
        let mut lineage = vec![record];
        lineage.extend(
            self.types
                .ancestors(ty)
                .into_iter()
                .filter_map(|p| self.types.composite(p).map(|c| c.decl)),
        );
        Ok(lineage)
    }
}

fn compute_scope_decls(cx: &Context, scope: NodeId) -> QueryResult<ScopeDecls> {
    let tree = cx.tree(scope.module)?;
    let mut decls = ScopeDecls::default();
    match tree.kind(scope) {
        Some(NodeKind::Module { stmts, .. } | NodeKind::Block { stmts }) => {
            for &stmt in stmts {
                match tree.kind(stmt) {
                    Some(NodeKind::Use { module }) => decls.uses.push(*module),
                    // Functions with a receiver are methods and only found
                    // through their receiver type.
                    Some(NodeKind::Function(f)) if f.receiver.is_some() => {}
                    Some(kind) => {
                        if let Some(name) = kind.decl_name() {
                            decls.add(name, stmt);
                        }
                    }
                    None => {}
                }
            }
        }
        Some(NodeKind::Record(rec)) => {
            for &member in &rec.members {
                if let Some(name) = tree.kind(member).and_then(NodeKind::decl_name) {
                    decls.add(name, member);
                }
            }
        }
        Some(NodeKind::Function(func)) => {
            for &formal in &func.formals {
                if let Some(name) = tree.kind(formal).and_then(NodeKind::decl_name) {
                    decls.add(name, formal);
                }
            }
        }
        _ => {}
    }
    Ok(decls)
}

/// Every scope level that binds `name` as seen from `at`, innermost first,
/// followed by builtin types and module names.
pub(crate) fn lookup_levels(cx: &Context, at: NodeId, name: Name) -> QueryResult<Vec<Level>> {
    let tree = cx.tree(at.module)?;
    let mut levels = Vec::new();
    let mut push = |scope: NodeId, bindings: SmallVec<[Binding; 2]>, via_receiver: bool| {
        if !bindings.is_empty() {
            levels.push(Level {
                scope,
                bindings,
                via_receiver,
            });
        }
    };

    for scope in tree.ancestors(at) {
        match tree.kind(scope) {
            Some(NodeKind::Block { .. }) => {
                let decls = cx.scope_decls(scope)?;
                let visible = decls
                    .get(name)
                    .iter()
                    .copied()
                    .filter(|d| !is_variable(cx, *d) || d.index < at.index)
                    .map(Binding::Decl)
                    .collect();
                push(scope, visible, false);
                for &module in decls.uses() {
                    push(scope, module_level(cx, module, name)?, false);
                }
            }
            Some(NodeKind::Function(func)) => {
                // The receiver type is resolved outside the function.
                if func.receiver.is_some_and(|r| tree.is_within(at, r)) {
                    continue;
                }
                let formals: SmallVec<[Binding; 2]> = cx
                    .scope_decls(scope)?
                    .get(name)
                    .iter()
                    .copied()
                    .map(Binding::Decl)
                    .collect();
                if !formals.is_empty() {
                    push(scope, formals, false);
                    continue;
                }
                let sig = cx.untyped_signature(scope)?;
                if !sig.is_method() {
                    continue;
                }
                if name == cx.names.this {
                    push(scope, SmallVec::from_elem(Binding::This, 1), false);
                } else if let Some(record) = sig.receiver_record() {
                    let members = cx
                        .record_members(record, name)?
                        .into_iter()
                        .map(Binding::Decl)
                        .collect();
                    push(scope, members, true);
                }
            }
            Some(NodeKind::Record(_)) => {
                let members = cx
                    .scope_decls(scope)?
                    .get(name)
                    .iter()
                    .copied()
                    .map(Binding::Decl)
                    .collect();
                push(scope, members, false);
            }
            Some(NodeKind::Module { .. }) => {
                let decls = cx.scope_decls(scope)?;
                push(
                    scope,
                    decls.get(name).iter().copied().map(Binding::Decl).collect(),
                    false,
                );
                for &module in decls.uses() {
                    push(scope, module_level(cx, module, name)?, false);
                }
            }
            _ => {}
        }
    }

    let root = tree.root();
    if let Some(ty) = cx.builtin_type(name) {
        push(root, SmallVec::from_elem(Binding::Builtin(ty), 1), false);
    }
    if cx.loaded(name).is_some() {
        push(root, SmallVec::from_elem(Binding::Module(name), 1), false);
    }
    Ok(levels)
}

/// Bindings of the innermost scope that declares `name`.
pub(crate) fn lookup(
    cx: &Context,
    at: NodeId,
    name: Name,
) -> QueryResult<SmallVec<[Binding; 2]>> {
    Ok(lookup_levels(cx, at, name)?
        .into_iter()
        .next()
        .map(|level| level.bindings)
        .unwrap_or_default())
}

/// Top-level declarations of another module. Modules that are not loaded
/// contribute nothing; `resolve_module` reports them.
fn module_level(cx: &Context, module: Name, name: Name) -> QueryResult<SmallVec<[Binding; 2]>> {
    let Some(tree) = cx.loaded(module) else {
        return Ok(SmallVec::new());
    };
    Ok(cx
        .scope_decls(tree.root())?
        .get(name)
        .iter()
        .copied()
        .map(Binding::Decl)
        .collect())
}

fn is_variable(cx: &Context, decl: NodeId) -> bool {
    cx.loaded(decl.module)
        .is_some_and(|t| matches!(t.kind(decl), Some(NodeKind::Variable(_))))
}
