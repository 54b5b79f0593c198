//! Split initialization and last-mention analysis for function locals.
//!
//! `var x: R; x = y;` initializes `x` at the assignment instead of
//! default-initializing it first. A local whose last mention is used to
//! initialize another value can be moved from instead of copied.

use crate::results::ResolvedExpression;
use kestrel_ir::{NodeId, NodeKind, Op, SyntaxTree, VarKind};
use kestrel_types::{QualKind, TypeInterner};
use rustc_hash::FxHashMap;

/// Mentions of every local of one function body.
pub(crate) struct LocalFlow<'a> {
    tree: &'a SyntaxTree,
    /// `decl -> identifiers referring to it`, in postorder.
    mentions: FxHashMap<NodeId, Vec<NodeId>>,
    /// `decl -> assignment that initializes it`.
    split: FxHashMap<NodeId, NodeId>,
}

impl<'a> LocalFlow<'a> {
    pub(crate) fn new(
        tree: &'a SyntaxTree,
        body: NodeId,
        exprs: &FxHashMap<NodeId, ResolvedExpression>,
    ) -> Self {
        let mut mentions: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for node in tree.subtree(body) {
            if !matches!(tree.kind(node), Some(NodeKind::Identifier { .. })) {
                continue;
            }
            let Some(decl) = exprs.get(&node).and_then(|e| e.to_decl) else {
                continue;
            };
            if decl.module == node.module && tree.is_within(decl, body) {
                mentions.entry(decl).or_default().push(node);
            }
        }
        let mut flow = LocalFlow {
            tree,
            mentions,
            split: FxHashMap::default(),
        };
        let split: FxHashMap<NodeId, NodeId> = flow
            .mentions
            .keys()
            .filter_map(|&decl| flow.split_target(decl).map(|assign| (decl, assign)))
            .collect();
        flow.split = split;
        flow
    }

    /// Assignment that initializes `decl`, if `decl` is split-initialized.
    pub(crate) fn split_init(&self, decl: NodeId) -> Option<NodeId> {
        self.split.get(&decl).copied()
    }

    /// Local variable (not `ref`, not a formal) that `decl` names.
    fn local_var(&self, decl: NodeId) -> Option<(VarKind, Option<NodeId>)> {
        match self.tree.kind(decl)? {
            NodeKind::Variable(var) if matches!(var.kind, VarKind::Var | VarKind::Const) => {
                Some((var.kind, var.init))
            }
            _ => None,
        }
    }

    fn split_target(&self, decl: NodeId) -> Option<NodeId> {
        let (_, init) = self.local_var(decl)?;
        if init.is_some() {
            return None;
        }
        let mentions = self.mentions.get(&decl)?;
        let first = *mentions.first()?;
        let assign = self.tree.parent(first)?;
        match self.tree.kind(assign)? {
            NodeKind::OpCall {
                op: Op::Assign,
                operands,
            } if operands.first() == Some(&first) => {}
            _ => return None,
        }
        // The rhs must not read the variable being initialized.
        if mentions.get(1).is_some_and(|m| m.index < assign.index) {
            return None;
        }
        let declaring = self.tree.parent(decl)?;
        let stmt_block = self.tree.parent(assign)?;
        if !matches!(self.tree.kind(stmt_block)?, NodeKind::Block { .. }) {
            return None;
        }
        self.only_blocks_between(stmt_block, declaring).then_some(assign)
    }

    /// `from` is `to` or nested in it through blocks alone.
    fn only_blocks_between(&self, from: NodeId, to: NodeId) -> bool {
        let mut current = from;
        loop {
            if current == to {
                return true;
            }
            if !matches!(self.tree.kind(current), Some(NodeKind::Block { .. })) {
                return false;
            }
            match self.tree.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether identifier `mention` of local `decl` may be moved from: it is
    /// the last mention and no conditional separates it from the scope that
    /// declares `decl`.
    pub(crate) fn is_movable(&self, decl: NodeId, mention: NodeId) -> bool {
        if self.local_var(decl).is_none() {
            return false;
        }
        let Some(mentions) = self.mentions.get(&decl) else {
            return false;
        };
        if mentions.last() != Some(&mention) {
            return false;
        }
        let Some(declaring) = self.tree.parent(decl) else {
            return false;
        };
        !self
            .tree
            .ancestors(mention)
            .take_while(|&a| a != declaring)
            .any(|a| matches!(self.tree.kind(a), Some(NodeKind::Conditional { .. })))
    }
}

/// Whether `node` produces a record value nobody owns yet.
pub(crate) fn is_record_temp(
    tree: &SyntaxTree,
    types: &TypeInterner,
    exprs: &FxHashMap<NodeId, ResolvedExpression>,
    node: NodeId,
) -> bool {
    let creates = matches!(
        tree.kind(node),
        Some(NodeKind::Call { .. } | NodeKind::New { .. } | NodeKind::OpCall { .. })
    );
    creates
        && exprs.get(&node).is_some_and(|e| {
            matches!(e.qt.kind, QualKind::Var | QualKind::ConstVar) && types.is_record(e.qt.ty)
        })
}
