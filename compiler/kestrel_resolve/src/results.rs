//! Resolution results handed to later phases.

use crate::signature::SigId;
use kestrel_ir::{Name, NodeId};
use kestrel_types::QualifiedType;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

/// Compiler-inserted lifecycle operation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ActionKind {
    DefaultInit,
    CopyInit,
    Assign,
    /// Initialization from a value of a different type through `init=`.
    InitOther,
    Deinit,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DefaultInit => "DEFAULT_INIT",
            ActionKind::CopyInit => "COPY_INIT",
            ActionKind::Assign => "ASSIGN",
            ActionKind::InitOther => "INIT_OTHER",
            ActionKind::Deinit => "DEINIT",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle action attached to the node where it happens.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct AssociatedAction {
    pub kind: ActionKind,
    pub at: NodeId,
    /// Variable or temporary being destroyed; only set for `Deinit`.
    pub acted_on: Option<NodeId>,
    /// User function implementing the action; `None` when compiler generated.
    pub callee: Option<SigId>,
    /// The required function did not resolve.
    pub erroneous: bool,
}

/// What one expression or declaration resolved to.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ResolvedExpression {
    pub qt: QualifiedType,
    /// Declaration an identifier refers to.
    pub to_decl: Option<NodeId>,
    /// Chosen function for a call; several when the call was ambiguous.
    pub candidates: SmallVec<[SigId; 1]>,
    pub actions: Vec<AssociatedAction>,
}

impl ResolvedExpression {
    pub fn new(qt: QualifiedType) -> Self {
        ResolvedExpression {
            qt,
            to_decl: None,
            candidates: SmallVec::new(),
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_decl(mut self, decl: Option<NodeId>) -> Self {
        self.to_decl = decl;
        self
    }

    /// The single function a call resolved to.
    pub fn most_specific(&self) -> Option<SigId> {
        match self.candidates.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// Body resolution of one concrete function signature.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ResolvedFunction {
    pub sig: SigId,
    pub decl: NodeId,
    pub exprs: FxHashMap<NodeId, ResolvedExpression>,
    /// Every action in the order it was determined.
    pub actions: Vec<AssociatedAction>,
    /// Resolved `return` statements in source order.
    pub returns: Vec<(NodeId, QualifiedType)>,
    /// The signature could not be resolved concretely; nothing else is set.
    pub erroneous: bool,
}

impl ResolvedFunction {
    pub(crate) fn empty(sig: SigId, decl: NodeId, erroneous: bool) -> Self {
        ResolvedFunction {
            sig,
            decl,
            exprs: FxHashMap::default(),
            actions: Vec::new(),
            returns: Vec::new(),
            erroneous,
        }
    }

    pub fn by_node(&self, id: NodeId) -> Option<&ResolvedExpression> {
        self.exprs.get(&id)
    }

    /// Qualified type of `id`, or `UNKNOWN` when it was not resolved.
    pub fn qt(&self, id: NodeId) -> QualifiedType {
        self.exprs.get(&id).map_or(QualifiedType::UNKNOWN, |e| e.qt)
    }
}

/// Module-level statements of one module.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ResolvedModule {
    pub module: Name,
    pub exprs: FxHashMap<NodeId, ResolvedExpression>,
}

impl ResolvedModule {
    pub fn by_node(&self, id: NodeId) -> Option<&ResolvedExpression> {
        self.exprs.get(&id)
    }

    pub fn qt(&self, id: NodeId) -> QualifiedType {
        self.exprs.get(&id).map_or(QualifiedType::UNKNOWN, |e| e.qt)
    }
}
