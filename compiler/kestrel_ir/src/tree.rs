//! Flat postorder syntax tree for one module.

use crate::{Name, Node, NodeId, NodeKind, Span};
use smallvec::SmallVec;

/// Problem found while validating a tree handed over by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// A child reference does not point at an earlier node of this module.
    DanglingChild { node: u32, child: NodeId },
    /// A node other than the last is not referenced by any parent.
    Orphan { node: u32 },
    /// The last node is not a `Module`.
    MissingRoot,
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::DanglingChild { node, child } => {
                write!(f, "node {node} refers to {child:?}, which is not an earlier node")
            }
            TreeError::Orphan { node } => write!(f, "node {node} has no parent"),
            TreeError::MissingRoot => write!(f, "tree does not end with a module node"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Syntax tree of one module. The root `Module` node is stored last.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SyntaxTree {
    module: Name,
    nodes: Vec<Node>,
}

impl SyntaxTree {
    /// Build a tree from postorder nodes, filling in parent links.
    pub fn from_postorder(module: Name, kinds: Vec<(NodeKind, Span)>) -> Result<Self, TreeError> {
        let mut nodes: Vec<Node> = kinds
            .into_iter()
            .map(|(kind, span)| Node {
                kind,
                span,
                parent: None,
            })
            .collect();
        let Some(last) = nodes.last() else {
            return Err(TreeError::MissingRoot);
        };
        if !matches!(last.kind, NodeKind::Module { .. }) {
            return Err(TreeError::MissingRoot);
        }
        for index in 0..nodes.len() {
            let parent_index = u32::try_from(index).map_err(|_| TreeError::MissingRoot)?;
            let parent = NodeId::new(module, parent_index);
            for child in nodes[index].kind.children() {
                let in_range = child.module == module && (child.index as usize) < index;
                if !in_range {
                    return Err(TreeError::DanglingChild {
                        node: parent_index,
                        child,
                    });
                }
                nodes[child.index as usize].parent = Some(parent);
            }
        }
        let root = nodes.len() - 1;
        if let Some(orphan) = nodes[..root].iter().position(|n| n.parent.is_none()) {
            return Err(TreeError::Orphan {
                node: u32::try_from(orphan).unwrap_or(u32::MAX),
            });
        }
        Ok(SyntaxTree { module, nodes })
    }

    pub fn module(&self) -> Name {
        self.module
    }

    pub fn root(&self) -> NodeId {
        NodeId::new(self.module, self.last_index())
    }

    fn last_index(&self) -> u32 {
        u32::try_from(self.nodes.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.module == self.module && (id.index as usize) < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.module != self.module {
            return None;
        }
        self.nodes.get(id.index as usize)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).map_or(Span::DUMMY, |n| n.span)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        self.kind(id).map(NodeKind::children).unwrap_or_default()
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Whether `ancestor` is `id` or contains it.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Top-level statements of the module.
    pub fn module_stmts(&self) -> &[NodeId] {
        match self.nodes.last().map(|n| &n.kind) {
            Some(NodeKind::Module { stmts, .. }) => stmts,
            _ => &[],
        }
    }

    /// All nodes in postorder.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        let module = self.module;
        (0u32..).zip(self.nodes.iter()).map(move |(i, n)| (NodeId::new(module, i), n))
    }

    /// Postorder ids of every node in the subtree rooted at `id`.
    ///
    /// Because storage is postorder, a subtree is the contiguous range that
    /// ends at `id` and starts at its leftmost leaf.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut first = id;
        while let Some(&child) = self.children(first).first() {
            first = child;
        }
        let module = self.module;
        (first.index..=id.index).map(move |i| NodeId::new(module, i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StringInterner;

    #[test]
    fn rejects_forward_references() {
        let interner = StringInterner::new();
        let m = interner.intern("M");
        let kinds = vec![
            (
                NodeKind::Return {
                    value: Some(NodeId::new(m, 1)),
                },
                Span::DUMMY,
            ),
            (
                NodeKind::Module {
                    name: m,
                    stmts: vec![NodeId::new(m, 0)],
                },
                Span::DUMMY,
            ),
        ];
        assert_eq!(
            SyntaxTree::from_postorder(m, kinds),
            Err(TreeError::DanglingChild {
                node: 0,
                child: NodeId::new(m, 1)
            })
        );
    }

    #[test]
    fn rejects_missing_root() {
        let interner = StringInterner::new();
        let m = interner.intern("M");
        let kinds = vec![(NodeKind::Use { module: m }, Span::DUMMY)];
        assert_eq!(
            SyntaxTree::from_postorder(m, kinds),
            Err(TreeError::MissingRoot)
        );
        assert_eq!(
            SyntaxTree::from_postorder(m, Vec::new()),
            Err(TreeError::MissingRoot)
        );
    }

    #[test]
    fn rejects_orphans() {
        let interner = StringInterner::new();
        let m = interner.intern("M");
        let kinds = vec![
            (NodeKind::Use { module: m }, Span::DUMMY),
            (
                NodeKind::Module {
                    name: m,
                    stmts: Vec::new(),
                },
                Span::DUMMY,
            ),
        ];
        assert_eq!(
            SyntaxTree::from_postorder(m, kinds),
            Err(TreeError::Orphan { node: 0 })
        );
    }
}
