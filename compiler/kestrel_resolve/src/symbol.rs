//! Qualified type of a declaration, wherever it is declared.

use crate::query::QueryKey;
use crate::signature::FormalSource;
use crate::{Context, QueryResult, ResolveError};
use kestrel_ir::{NodeId, NodeKind};
use kestrel_types::{QualKind, QualifiedType, TypeId};

impl Context {
    pub(crate) fn symbol_type(&self, decl: NodeId) -> QueryResult<QualifiedType> {
        self.engine.memo(
            self,
            &self.tables.type_for_symbol,
            decl,
            QueryKey::TypeForSymbol(decl),
            |cx| compute_symbol_type(cx, decl),
        )
    }
}

fn compute_symbol_type(cx: &Context, decl: NodeId) -> QueryResult<QualifiedType> {
    let tree = cx.tree(decl.module)?;
    let kind = tree
        .kind(decl)
        .ok_or(ResolveError::malformed(decl, "node is not in its module"))?;
    let parent = tree.parent(decl);
    let parent_kind = parent.and_then(|p| tree.kind(p));

    match kind {
        NodeKind::Module { .. } => Ok(QualifiedType::new(QualKind::Module, TypeId::VOID)),
        NodeKind::Record(_) => Ok(QualifiedType::type_(cx.record_type(decl)?)),
        NodeKind::Function(_) => {
            let sig = cx.signature(cx.generic_sig_id(decl))?;
            let formals = sig.formals.iter().map(|f| f.qt).collect();
            // Only a declared return type, so naming a function inside its
            // own body does not need the body.
            let ret = if sig.is_concrete() && sig.untyped.return_type.is_some() {
                cx.return_type(sig.id)?
            } else {
                QualifiedType::UNKNOWN
            };
            Ok(QualifiedType::new(
                QualKind::Function,
                cx.types.function(formals, ret),
            ))
        }
        NodeKind::Formal(_) => {
            let func = parent.ok_or(ResolveError::malformed(decl, "formal outside a function"))?;
            let sig = cx.signature(cx.generic_sig_id(func))?;
            sig.formals
                .iter()
                .find(|f| f.source == FormalSource::Node(decl))
                .map(|f| f.qt)
                .ok_or(ResolveError::malformed(decl, "formal missing from its signature"))
        }
        NodeKind::Variable(var) => match (parent, parent_kind) {
            (_, Some(NodeKind::Module { .. })) => Ok(cx
                .module_stmt(decl)?
                .get(&decl)
                .map_or(QualifiedType::UNKNOWN, |e| e.qt)),
            (Some(record), Some(NodeKind::Record(_))) => {
                let ty = cx.record_type(record)?;
                if let Some((_, qt)) = cx.generic_formal(ty, var.name) {
                    return Ok(qt);
                }
                Ok(cx
                    .fields(ty)?
                    .iter()
                    .find(|f| f.decl == decl)
                    .map_or(QualifiedType::UNKNOWN, |f| f.qt))
            }
            _ => local_type(cx, decl),
        },
        _ => Err(ResolveError::malformed(decl, "expected a declaration")),
    }
}

/// Type of a function local: known once the enclosing function is concrete.
fn local_type(cx: &Context, decl: NodeId) -> QueryResult<QualifiedType> {
    let tree = cx.tree(decl.module)?;
    let Some(func) = tree
        .ancestors(decl)
        .find(|&a| matches!(tree.kind(a), Some(NodeKind::Function(_))))
    else {
        return Ok(QualifiedType::UNKNOWN);
    };
    let sig = cx.signature(cx.generic_sig_id(func))?;
    if !sig.is_concrete() {
        return Ok(QualifiedType::UNKNOWN);
    }
    Ok(cx.resolved_function(sig.id)?.qt(decl))
}
