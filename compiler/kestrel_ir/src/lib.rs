//! Kestrel IR - syntax tree and identity types shared by every front-end phase.
//!
//! - [`Name`]: interned identifier, compared in O(1)
//! - [`NodeId`]: stable node identity (module + postorder index), the
//!   universal key of the resolver's caches
//! - [`SyntaxTree`]: flat postorder node storage for one module
//! - [`build`]: owned surface syntax that lowers to a `SyntaxTree`
//!
//! Every type here is `Clone + Eq + Hash + Debug` so it can be used as a
//! query key or stored in a memo table.

pub mod build;
mod interner;
mod name;
mod node;
mod span;
mod tree;

pub use interner::{InternError, SharedInterner, StringInterner, StringLookup};
pub use name::Name;
pub use node::{
    Actual, FnFlags, FormalDecl, FunctionDecl, Intent, Literal, Node, NodeId, NodeKind, Op,
    RecordDecl, RecordKind, ReturnIntent, VarKind, VariableDecl,
};
pub use span::Span;
pub use tree::{SyntaxTree, TreeError};
