//! Syntax node kinds.
//!
//! Nodes are stored flat in postorder: every child has a smaller index than
//! its parent, and siblings appear in source order.

use crate::{Name, Span};
use bitflags::bitflags;
use smallvec::SmallVec;
use std::fmt;

/// Stable identity of one syntax node: owning module plus postorder index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId {
    pub module: Name,
    pub index: u32,
}

impl NodeId {
    #[inline]
    pub const fn new(module: Name, index: u32) -> Self {
        NodeId { module, index }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.module.raw())
    }
}

/// Record or class.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RecordKind {
    /// Value type with compiler-synthesized lifecycle.
    Record,
    /// Reference type; supports single inheritance.
    Class,
}

/// Argument passing intent of a formal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Intent {
    #[default]
    Default,
    Const,
    ConstRef,
    Ref,
    In,
    Out,
    Param,
    Type,
}

/// How a function hands back its result.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ReturnIntent {
    #[default]
    Value,
    ConstRef,
    Ref,
    Param,
    Type,
}

/// Storage kind of a variable declaration (also used for record fields).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VarKind {
    Var,
    Const,
    Ref,
    Param,
    Type,
}

bitflags! {
    /// Properties of a function declaration that are not formals.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FnFlags: u8 {
        /// Declared without parentheses; called as `obj.name`.
        const PARENLESS = 1 << 0;
        /// `proc type R.name()`; the receiver is the type itself.
        const TYPE_METHOD = 1 << 1;
        /// Declared without a body.
        const EXTERN = 1 << 2;
        /// `operator` declaration; receives no `this` formal.
        const OPERATOR = 1 << 3;
    }
}

/// Built-in operator.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Op {
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Not,
    And,
    Or,
}

impl Op {
    /// Source spelling, also used as the name of user-declared operators.
    pub const fn symbol(self) -> &'static str {
        match self {
            Op::Assign => "=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Not => "!",
            Op::And => "&&",
            Op::Or => "||",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Op::Not | Op::And | Op::Or)
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Op::Add | Op::Sub | Op::Mul | Op::Div)
    }
}

/// Literal value. Reals are stored as bits so the node stays `Hash`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Literal {
    Int(i64),
    Uint(u64),
    Real(u64),
    Bool(bool),
    Str(Name),
    CStr(Name),
}

/// Positional or named call argument.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Actual {
    pub name: Option<Name>,
    pub value: NodeId,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct RecordDecl {
    pub name: Name,
    pub kind: RecordKind,
    /// Parent class type expression.
    pub parent: Option<NodeId>,
    pub members: Vec<NodeId>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FunctionDecl {
    pub name: Name,
    pub flags: FnFlags,
    /// Receiver type expression of `proc R.name()`.
    pub receiver: Option<NodeId>,
    pub formals: Vec<NodeId>,
    pub return_intent: ReturnIntent,
    pub return_type: Option<NodeId>,
    pub where_clause: Option<NodeId>,
    pub body: Option<NodeId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FormalDecl {
    pub name: Name,
    pub intent: Intent,
    pub type_expr: Option<NodeId>,
    pub default: Option<NodeId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct VariableDecl {
    pub name: Name,
    pub kind: VarKind,
    pub type_expr: Option<NodeId>,
    pub init: Option<NodeId>,
}

/// Syntactic kind of a node, with child references.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeKind {
    Module {
        name: Name,
        stmts: Vec<NodeId>,
    },
    Use {
        module: Name,
    },
    Record(Box<RecordDecl>),
    Function(Box<FunctionDecl>),
    Formal(FormalDecl),
    Variable(VariableDecl),
    Block {
        stmts: Vec<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Conditional {
        cond: NodeId,
        then_block: NodeId,
        else_block: Option<NodeId>,
    },
    Identifier {
        name: Name,
    },
    Dot {
        receiver: NodeId,
        field: Name,
    },
    Call {
        callee: NodeId,
        actuals: Vec<Actual>,
    },
    OpCall {
        op: Op,
        operands: SmallVec<[NodeId; 2]>,
    },
    New {
        type_expr: NodeId,
        actuals: Vec<Actual>,
    },
    Literal(Literal),
}

impl NodeKind {
    /// Children in source order.
    pub fn children(&self) -> SmallVec<[NodeId; 4]> {
        let mut out = SmallVec::new();
        match self {
            NodeKind::Module { stmts, .. } | NodeKind::Block { stmts } => {
                out.extend(stmts.iter().copied());
            }
            NodeKind::Record(decl) => {
                out.extend(decl.parent);
                out.extend(decl.members.iter().copied());
            }
            NodeKind::Function(decl) => {
                out.extend(decl.receiver);
                out.extend(decl.formals.iter().copied());
                out.extend(decl.return_type);
                out.extend(decl.where_clause);
                out.extend(decl.body);
            }
            NodeKind::Formal(decl) => {
                out.extend(decl.type_expr);
                out.extend(decl.default);
            }
            NodeKind::Variable(decl) => {
                out.extend(decl.type_expr);
                out.extend(decl.init);
            }
            NodeKind::Return { value } => out.extend(*value),
            NodeKind::Conditional {
                cond,
                then_block,
                else_block,
            } => {
                out.push(*cond);
                out.push(*then_block);
                out.extend(*else_block);
            }
            NodeKind::Dot { receiver, .. } => out.push(*receiver),
            NodeKind::Call { callee, actuals } => {
                out.push(*callee);
                out.extend(actuals.iter().map(|a| a.value));
            }
            NodeKind::OpCall { operands, .. } => out.extend(operands.iter().copied()),
            NodeKind::New { type_expr, actuals } => {
                out.push(*type_expr);
                out.extend(actuals.iter().map(|a| a.value));
            }
            NodeKind::Use { .. } | NodeKind::Identifier { .. } | NodeKind::Literal(_) => {}
        }
        out
    }

    /// Name introduced by a declaration node.
    pub fn decl_name(&self) -> Option<Name> {
        match self {
            NodeKind::Record(decl) => Some(decl.name),
            NodeKind::Function(decl) => Some(decl.name),
            NodeKind::Formal(decl) => Some(decl.name),
            NodeKind::Variable(decl) => Some(decl.name),
            NodeKind::Module { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Nodes that open a lexical scope.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Module { .. }
                | NodeKind::Record(_)
                | NodeKind::Function(_)
                | NodeKind::Block { .. }
        )
    }

    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match self {
            NodeKind::Function(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordDecl> {
        match self {
            NodeKind::Record(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableDecl> {
        match self {
            NodeKind::Variable(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_formal(&self) -> Option<&FormalDecl> {
        match self {
            NodeKind::Formal(decl) => Some(decl),
            _ => None,
        }
    }

    /// Short label used in trace output.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Module { .. } => "module",
            NodeKind::Use { .. } => "use",
            NodeKind::Record(_) => "record",
            NodeKind::Function(_) => "function",
            NodeKind::Formal(_) => "formal",
            NodeKind::Variable(_) => "variable",
            NodeKind::Block { .. } => "block",
            NodeKind::Return { .. } => "return",
            NodeKind::Conditional { .. } => "conditional",
            NodeKind::Identifier { .. } => "identifier",
            NodeKind::Dot { .. } => "dot",
            NodeKind::Call { .. } => "call",
            NodeKind::OpCall { .. } => "op",
            NodeKind::New { .. } => "new",
            NodeKind::Literal(_) => "literal",
        }
    }
}

/// One stored node.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}
