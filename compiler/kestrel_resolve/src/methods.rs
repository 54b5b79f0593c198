//! Method candidate discovery.
//!
//! Methods of a type come in three tiers, searched in order:
//! - primary: declared inside the record body (and its ancestor classes)
//! - secondary: `proc R.f()` in the module that declares `R`
//! - tertiary: `proc R.f()` in the calling module or a module it uses

use crate::query::QueryKey;
use crate::signature::Receiver;
use crate::{Context, QueryResult};
use kestrel_ir::{Name, NodeId, NodeKind};
use kestrel_types::TypeId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Type a method is attached to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ReceiverTarget {
    /// A record or class, by declaration.
    Record(NodeId),
    Builtin(TypeId),
    /// The receiver expression does not name a type.
    Unresolved,
}

/// Module-level methods of one module, by name.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MethodIndex {
    by_name: FxHashMap<Name, Vec<(NodeId, ReceiverTarget)>>,
}

impl MethodIndex {
    fn matching<'a>(
        &'a self,
        name: Name,
        targets: &'a [ReceiverTarget],
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.by_name
            .get(&name)
            .into_iter()
            .flatten()
            .filter(move |(_, t)| targets.contains(t))
            .map(|(f, _)| *f)
    }
}

/// Method candidates for `name` on `target`, as seen from module `site`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MethodCandidatesKey {
    pub target: ReceiverTarget,
    pub name: Name,
    pub site: Name,
}

/// Candidate function declarations grouped by tier; empty tiers are omitted.
pub type CandidateLevels = Arc<Vec<Vec<NodeId>>>;

impl Context {
    pub(crate) fn method_index(&self, module: Name) -> QueryResult<Arc<MethodIndex>> {
        self.engine.memo(
            self,
            &self.tables.method_index,
            module,
            QueryKey::MethodIndex(module),
            |cx| compute_method_index(cx, module).map(Arc::new),
        )
    }

    pub(crate) fn method_candidates(
        &self,
        key: MethodCandidatesKey,
    ) -> QueryResult<CandidateLevels> {
        self.engine.memo(
            self,
            &self.tables.method_candidates,
            key,
            QueryKey::MethodCandidates(key),
            |cx| compute_method_candidates(cx, key).map(Arc::new),
        )
    }

    /// Method target of a value or type of type `ty`.
    pub(crate) fn receiver_target(&self, ty: TypeId) -> ReceiverTarget {
        match self.types.composite(ty) {
            Some(c) => ReceiverTarget::Record(c.decl),
            None if ty.is_primitive() && !ty.is_erroneous() && !ty.is_unknown() => {
                ReceiverTarget::Builtin(ty)
            }
            None => ReceiverTarget::Unresolved,
        }
    }

    /// Modules searched for tertiary methods from `site`.
    pub(crate) fn visible_modules(&self, site: Name) -> QueryResult<Vec<Name>> {
        let mut modules = vec![site];
        if let Some(tree) = self.loaded(site) {
            modules.extend(self.scope_decls(tree.root())?.uses().iter().copied());
        }
        Ok(modules)
    }
}

fn compute_method_index(cx: &Context, module: Name) -> QueryResult<MethodIndex> {
    let tree = cx.tree(module)?;
    let mut index = MethodIndex::default();
    for &stmt in tree.module_stmts() {
        let Some(NodeKind::Function(func)) = tree.kind(stmt) else {
            continue;
        };
        if func.receiver.is_none() {
            continue;
        }
        if let Receiver::Secondary { target, .. } = cx.untyped_signature(stmt)?.receiver {
            index
                .by_name
                .entry(func.name)
                .or_default()
                .push((stmt, target));
        }
    }
    Ok(index)
}

fn compute_method_candidates(
    cx: &Context,
    key: MethodCandidatesKey,
) -> QueryResult<Vec<Vec<NodeId>>> {
    let mut levels = Vec::with_capacity(3);
    let mut searched: FxHashSet<Name> = FxHashSet::default();

    let targets: Vec<ReceiverTarget> = match key.target {
        ReceiverTarget::Record(decl) => {
            let lineage = cx.record_lineage(decl)?;

            let mut primary = Vec::new();
            for &record in &lineage {
                primary.extend(
                    cx.scope_decls(record)?
                        .get(key.name)
                        .iter()
                        .copied()
                        .filter(|d| is_function(cx, *d)),
                );
            }
            levels.push(primary);

            let targets: Vec<_> = lineage.iter().map(|d| ReceiverTarget::Record(*d)).collect();
            let mut secondary = Vec::new();
            for record in &lineage {
                if searched.insert(record.module) {
                    let index = cx.method_index(record.module)?;
                    secondary.extend(index.matching(key.name, &targets));
                }
            }
            levels.push(secondary);
            targets
        }
        ReceiverTarget::Builtin(_) => vec![key.target],
        ReceiverTarget::Unresolved => return Ok(Vec::new()),
    };

    let mut tertiary = Vec::new();
    for module in cx.visible_modules(key.site)? {
        if searched.insert(module) && cx.loaded(module).is_some() {
            tertiary.extend(cx.method_index(module)?.matching(key.name, &targets));
        }
    }
    levels.push(tertiary);

    levels.retain(|level| !level.is_empty());
    Ok(levels)
}

fn is_function(cx: &Context, decl: NodeId) -> bool {
    cx.loaded(decl.module)
        .is_some_and(|t| matches!(t.kind(decl), Some(NodeKind::Function(_))))
}
