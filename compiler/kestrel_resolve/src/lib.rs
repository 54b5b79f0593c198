//! Kestrel semantic resolution.
//!
//! Every semantic fact about a program is a memoized query on a
//! [`Context`]: the declarations a scope introduces, the typed signature of
//! a function, the type a variable was declared with, the most specific
//! candidate of a call, the lifecycle actions of a function body. Queries
//! record which other queries they read, so loading a changed module evicts
//! exactly the results that depended on it.
//!
//! User-facing problems become [`Diagnostic`](kestrel_diagnostic::Diagnostic)s
//! attached to the query that found them, with an erroneous result in
//! band. Only broken invariants surface as a [`ResolveError`].
//!
//! Entry points: [`Context::resolve_module`],
//! [`Context::resolve_concrete_function`], [`Context::type_for_symbol`] and
//! [`Context::diagnostics`].

mod actions;
mod api;
mod config;
mod context;
mod error;
mod function;
mod lifecycle;
mod methods;
mod module;
mod overload;
mod query;
mod record;
mod resolver;
mod results;
mod scope;
mod signature;
mod split_init;
mod stack;
mod symbol;

#[cfg(test)]
mod tests;

pub use config::ResolverConfig;
pub use context::Context;
pub use error::{QueryResult, ResolveError};
pub use lifecycle::{LifecycleFn, LifecycleKey};
pub use methods::{MethodCandidatesKey, ReceiverTarget};
pub use query::QueryKey;
pub use record::FieldInfo;
pub use results::{
    ActionKind, AssociatedAction, ResolvedExpression, ResolvedFunction, ResolvedModule,
};
pub use signature::{
    FormalSource, Receiver, SigId, TypedFormal, TypedSignature, UntypedFormal, UntypedSignature,
    WhereOutcome,
};
