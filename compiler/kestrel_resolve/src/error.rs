//! Internal resolution failures.
//!
//! User-facing problems are diagnostics plus an erroneous result and never
//! show up here. A `ResolveError` means an invariant broke (a query
//! re-entered itself, the tree handed over by the parser is malformed) and
//! aborts every enclosing query.

use crate::query::QueryKey;
use crate::signature::SigId;
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Name, NodeId, Span};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("query {query:?} depends on itself")]
    RecursionDetected { query: QueryKey },

    #[error("malformed syntax tree at {node:?}: {reason}")]
    MalformedTree { node: NodeId, reason: &'static str },

    #[error("module {module:?} is not loaded")]
    UnknownModule { module: Name },

    #[error("function {func:?} has no formal {name:?}")]
    UnknownFormal { func: NodeId, name: Name },

    #[error("signature {0:?} was never interned")]
    UnknownSignature(SigId),
}

pub type QueryResult<T> = Result<T, ResolveError>;

impl ResolveError {
    pub fn malformed(node: NodeId, reason: &'static str) -> Self {
        ResolveError::MalformedTree { node, reason }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::RecursionDetected { .. } => ErrorCode::E9001,
            ResolveError::MalformedTree { .. }
            | ResolveError::UnknownModule { .. }
            | ResolveError::UnknownFormal { .. }
            | ResolveError::UnknownSignature(_) => ErrorCode::E9002,
        }
    }

    /// Node most closely associated with the failure.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            ResolveError::RecursionDetected { query } => query.node(),
            ResolveError::MalformedTree { node, .. } => Some(*node),
            ResolveError::UnknownFormal { func, .. } => Some(*func),
            ResolveError::UnknownModule { .. } | ResolveError::UnknownSignature(_) => None,
        }
    }

    /// Session-level diagnostic recorded when the error reaches the API.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code()).with_message(self.to_string());
        match self.node() {
            Some(node) => diag.at(node, Span::DUMMY),
            None => diag,
        }
    }
}
