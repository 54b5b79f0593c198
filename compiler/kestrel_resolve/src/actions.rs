//! Lifecycle actions of one resolved function body.
//!
//! A single pass over the body decides where record values are default
//! initialized, copied, assigned, converted and destroyed. Locals are
//! destroyed in reverse initialization order when their declaring block
//! ends; temporaries at the end of the statement that created them, unless
//! a variable took ownership.

use crate::lifecycle::{LifecycleFn, LifecycleKey};
use crate::results::{ActionKind, AssociatedAction, ResolvedExpression};
use crate::split_init::{is_record_temp, LocalFlow};
use crate::{Context, QueryResult};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Intent, NodeId, NodeKind, Op, SyntaxTree, VarKind};
use kestrel_types::{QualifiedType, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

/// Values a block destroys when it ends, in initialization order.
struct Frame {
    block: NodeId,
    inits: Vec<NodeId>,
}

struct ActionWalker<'a> {
    cx: &'a Context,
    tree: &'a SyntaxTree,
    exprs: &'a mut FxHashMap<NodeId, ResolvedExpression>,
    flow: LocalFlow<'a>,
    frames: Vec<Frame>,
    /// Locals whose value moved elsewhere.
    moved: FxHashSet<NodeId>,
    actions: Vec<AssociatedAction>,
}

/// Determine the actions of `body`, attaching each to the expression it
/// happens at, and return them in emission order.
pub(crate) fn body_actions(
    cx: &Context,
    tree: &SyntaxTree,
    body: NodeId,
    exprs: &mut FxHashMap<NodeId, ResolvedExpression>,
) -> QueryResult<Vec<AssociatedAction>> {
    let flow = LocalFlow::new(tree, body, exprs);
    let mut walker = ActionWalker {
        cx,
        tree,
        exprs,
        flow,
        frames: Vec::new(),
        moved: FxHashSet::default(),
        actions: Vec::new(),
    };
    walker.block(body)?;
    Ok(walker.actions)
}

impl ActionWalker<'_> {
    fn qt(&self, node: NodeId) -> QualifiedType {
        self.exprs.get(&node).map_or(QualifiedType::UNKNOWN, |e| e.qt)
    }

    /// Record type of a `var`/`const` local, if it has one.
    fn record_local(&self, decl: NodeId) -> Option<TypeId> {
        let var = self.tree.kind(decl)?.as_variable()?;
        if !matches!(var.kind, VarKind::Var | VarKind::Const) {
            return None;
        }
        let qt = self.qt(decl);
        (!qt.is_erroneous() && self.cx.types.is_record(qt.ty)).then_some(qt.ty)
    }

    fn block(&mut self, block: NodeId) -> QueryResult<()> {
        let tree = self.tree;
        let Some(NodeKind::Block { stmts }) = tree.kind(block) else {
            return Ok(());
        };
        self.frames.push(Frame {
            block,
            inits: Vec::new(),
        });
        for &stmt in stmts {
            self.stmt(stmt)?;
        }
        if let Some(frame) = self.frames.pop() {
            for &value in frame.inits.iter().rev() {
                if !self.moved.contains(&value) {
                    self.deinit(block, value)?;
                }
            }
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: NodeId) -> QueryResult<()> {
        let tree = self.tree;
        let Some(kind) = tree.kind(stmt) else {
            return Ok(());
        };
        match kind {
            NodeKind::Variable(var) => {
                let init = var.init;
                match (self.record_local(stmt), init) {
                    (Some(ty), Some(init)) => {
                        let temps = self.init_from(stmt, ty, init)?;
                        self.nested_temps(stmt, init, &[init])?;
                        self.own(stmt, stmt);
                        for temp in temps {
                            self.own(stmt, temp);
                        }
                    }
                    (Some(_), None) if self.flow.split_init(stmt).is_some() => {}
                    (Some(ty), None) => {
                        let found = self.lifecycle(ActionKind::DefaultInit, ty, None, stmt)?;
                        self.emit(ActionKind::DefaultInit, stmt, None, found, ty);
                        self.own(stmt, stmt);
                    }
                    (None, Some(init)) => self.nested_temps(stmt, init, &[])?,
                    (None, None) => {}
                }
            }
            NodeKind::OpCall {
                op: Op::Assign,
                operands,
            } => {
                let (lhs, rhs) = match operands.as_slice() {
                    [lhs, rhs] => (*lhs, *rhs),
                    _ => return Ok(()),
                };
                self.assign(stmt, lhs, rhs)?;
            }
            NodeKind::Block { .. } => self.block(stmt)?,
            NodeKind::Conditional {
                cond,
                then_block,
                else_block,
            } => {
                let (cond, then_block, else_block) = (*cond, *then_block, *else_block);
                self.nested_temps(stmt, cond, &[])?;
                // Blocks of a folded conditional that were never resolved
                // have no actions.
                if self.exprs.contains_key(&then_block) {
                    self.block(then_block)?;
                }
                if let Some(else_block) = else_block.filter(|b| self.exprs.contains_key(b)) {
                    self.block(else_block)?;
                }
            }
            NodeKind::Return { value } => {
                if let Some(value) = *value {
                    self.nested_temps(stmt, value, &[value])?;
                }
            }
            NodeKind::Function(_) | NodeKind::Record(_) | NodeKind::Use { .. } => {}
            _ => self.nested_temps(stmt, stmt, &[])?,
        }
        Ok(())
    }

    fn assign(&mut self, stmt: NodeId, lhs: NodeId, rhs: NodeId) -> QueryResult<()> {
        let target = self.exprs.get(&lhs).and_then(|e| e.to_decl);
        if let Some(decl) = target.filter(|&d| self.flow.split_init(d) == Some(stmt)) {
            if let Some(ty) = self.record_local(decl) {
                let temps = self.init_from(stmt, ty, rhs)?;
                self.own(decl, decl);
                for temp in temps {
                    self.deinit(stmt, temp)?;
                }
                return self.nested_temps(stmt, rhs, &[rhs]);
            }
        }

        let (to, from) = (self.qt(lhs), self.qt(rhs));
        if !to.is_erroneous() && !from.is_erroneous() && self.cx.types.is_record(to.ty) {
            let found = self.lifecycle(ActionKind::Assign, to.ty, Some(from.ty), stmt)?;
            self.emit(ActionKind::Assign, stmt, None, found, to.ty);
        }
        self.nested_temps(stmt, rhs, &[])?;
        self.nested_temps(stmt, lhs, &[])
    }

    /// Initialize a value of record type `ty` at `at` from expression
    /// `init`. Returns temporaries the new value keeps alive.
    fn init_from(&mut self, at: NodeId, ty: TypeId, init: NodeId) -> QueryResult<Vec<NodeId>> {
        let source = self.qt(init);
        if source.is_erroneous() || ty.is_erroneous() {
            return Ok(Vec::new());
        }
        let temp = is_record_temp(self.tree, &self.cx.types, &*self.exprs, init);
        let movable = self.movable_local(init);

        if source.ty == ty {
            if temp {
                // The temporary becomes the variable.
            } else if let Some(decl) = movable {
                self.moved.insert(decl);
            } else {
                let found = self.lifecycle(ActionKind::CopyInit, ty, None, at)?;
                self.emit(ActionKind::CopyInit, at, None, found, ty);
            }
            return Ok(Vec::new());
        }

        let found = self.lifecycle(ActionKind::InitOther, ty, Some(source.ty), at)?;
        let mut temps = Vec::new();
        let takes_ownership = matches!(
            found,
            LifecycleFn::User {
                other_intent: Intent::In,
                ..
            }
        );
        if takes_ownership && self.cx.types.is_record(source.ty) {
            if temp {
                // Moved into the formal.
            } else if let Some(decl) = movable {
                self.moved.insert(decl);
            } else {
                // `in` needs its own copy of a value that stays alive.
                let copy = self.lifecycle(ActionKind::CopyInit, source.ty, None, at)?;
                self.emit(ActionKind::CopyInit, at, None, copy, source.ty);
                temps.push(init);
            }
        } else if temp {
            temps.push(init);
        }
        self.emit(ActionKind::InitOther, at, None, found, ty);
        Ok(temps)
    }

    /// Local named by identifier `node` if this is its movable last mention.
    fn movable_local(&self, node: NodeId) -> Option<NodeId> {
        if !matches!(self.tree.kind(node), Some(NodeKind::Identifier { .. })) {
            return None;
        }
        let decl = self.exprs.get(&node)?.to_decl?;
        self.record_local(decl)?;
        self.flow.is_movable(decl, node).then_some(decl)
    }

    /// Destroy, at `stmt`, the temporaries created within `expr` except
    /// those in `consumed`. Later temporaries go first.
    fn nested_temps(&mut self, stmt: NodeId, expr: NodeId, consumed: &[NodeId]) -> QueryResult<()> {
        let temps: Vec<NodeId> = self
            .tree
            .subtree(expr)
            .filter(|n| !consumed.contains(n))
            .filter(|&n| is_record_temp(self.tree, &self.cx.types, &*self.exprs, n))
            .collect();
        for temp in temps.into_iter().rev() {
            self.deinit(stmt, temp)?;
        }
        Ok(())
    }

    /// Hand `value` to the frame of the block that declares `decl`.
    fn own(&mut self, decl: NodeId, value: NodeId) {
        let declaring = self.tree.parent(decl);
        let frame = match self.frames.iter_mut().rev().find(|f| Some(f.block) == declaring) {
            Some(frame) => frame,
            None => match self.frames.last_mut() {
                Some(frame) => frame,
                None => return,
            },
        };
        frame.inits.push(value);
    }

    fn deinit(&mut self, at: NodeId, value: NodeId) -> QueryResult<()> {
        let ty = self.qt(value).ty;
        let found = self.lifecycle(ActionKind::Deinit, ty, None, at)?;
        self.emit(ActionKind::Deinit, at, Some(value), found, ty);
        Ok(())
    }

    fn lifecycle(
        &self,
        kind: ActionKind,
        ty: TypeId,
        other: Option<TypeId>,
        at: NodeId,
    ) -> QueryResult<LifecycleFn> {
        self.cx.lifecycle(LifecycleKey {
            kind,
            ty,
            other,
            site: at.module,
        })
    }

    fn emit(
        &mut self,
        kind: ActionKind,
        at: NodeId,
        acted_on: Option<NodeId>,
        found: LifecycleFn,
        ty: TypeId,
    ) {
        let action = AssociatedAction {
            kind,
            at,
            acted_on,
            callee: found.sig(),
            erroneous: found.is_missing(),
        };
        if action.erroneous {
            self.cx.report_at(
                at,
                Diagnostic::error(ErrorCode::E4001).with_message(format!(
                    "no function performs {} for `{}`",
                    kind,
                    self.cx.display_type(ty)
                )),
            );
        }
        trace!(?action, "lifecycle action");
        self.exprs
            .entry(at)
            .or_insert_with(|| ResolvedExpression::new(QualifiedType::VOID))
            .actions
            .push(action);
        self.actions.push(action);
    }
}
