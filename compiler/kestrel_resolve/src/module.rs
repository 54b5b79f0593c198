//! Module-level statements.
//!
//! Each statement is its own query so the type of one module variable
//! never requires resolving the rest of the module.

use crate::query::QueryKey;
use crate::resolver::Resolver;
use crate::results::{ResolvedExpression, ResolvedModule};
use crate::{Context, QueryResult};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Name, NodeId, NodeKind};
use rustc_hash::FxHashMap;
use std::sync::Arc;

impl Context {
    /// Expressions of one module-level statement.
    pub(crate) fn module_stmt(
        &self,
        stmt: NodeId,
    ) -> QueryResult<Arc<FxHashMap<NodeId, ResolvedExpression>>> {
        self.engine.memo(
            self,
            &self.tables.module_stmt,
            stmt,
            QueryKey::ModuleStmt(stmt),
            |cx| {
                let mut resolver = Resolver::for_unit(cx, stmt)?;
                resolver.resolve_stmt(stmt)?;
                Ok(Arc::new(std::mem::take(&mut resolver.exprs)))
            },
        )
    }

    pub(crate) fn resolved_module(&self, module: Name) -> QueryResult<Arc<ResolvedModule>> {
        self.engine.memo(
            self,
            &self.tables.resolved_module,
            module,
            QueryKey::ResolvedModule(module),
            |cx| compute_resolved_module(cx, module).map(Arc::new),
        )
    }
}

fn compute_resolved_module(cx: &Context, module: Name) -> QueryResult<ResolvedModule> {
    let tree = cx.tree(module)?;
    let mut exprs = FxHashMap::default();
    for &stmt in tree.module_stmts() {
        match tree.kind(stmt) {
            Some(NodeKind::Use { module: used }) => {
                if cx.loaded(*used).is_none() {
                    cx.report_at(
                        stmt,
                        Diagnostic::error(ErrorCode::E2008).with_message(format!(
                            "module `{}` is not part of this session",
                            cx.name_str(*used)
                        )),
                    );
                }
            }
            Some(NodeKind::Function(_) | NodeKind::Record(_)) => {}
            Some(_) => {
                let resolved = cx.module_stmt(stmt)?;
                exprs.extend(resolved.iter().map(|(id, e)| (*id, e.clone())));
            }
            None => return Err(crate::ResolveError::malformed(stmt, "module statement is missing")),
        }
    }
    Ok(ResolvedModule { module, exprs })
}
