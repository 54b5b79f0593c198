//! Entry points used by drivers.
//!
//! Internal failures that reach these functions are also recorded as
//! session diagnostics, so a driver that only reads `diagnostics()` still
//! sees them.

use crate::results::{ResolvedFunction, ResolvedModule};
use crate::signature::SigId;
use crate::{Context, QueryResult, ResolveError, TypedSignature};
use kestrel_diagnostic::Diagnostic;
use kestrel_ir::{Name, NodeId};
use kestrel_types::QualifiedType;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::warn;

impl Context {
    /// Module-level statements of `module`.
    #[tracing::instrument(level = "debug", skip_all, fields(module = self.name_str(module)))]
    pub fn resolve_module(&self, module: Name) -> QueryResult<Arc<ResolvedModule>> {
        self.surface(self.resolved_module(module))
    }

    /// Body of `func` instantiated with `subs`, given by formal name.
    ///
    /// A function without generic formals takes no substitutions.
    #[tracing::instrument(level = "debug", skip_all, fields(func = ?func))]
    pub fn resolve_concrete_function(
        &self,
        func: NodeId,
        subs: &[(Name, QualifiedType)],
    ) -> QueryResult<Arc<ResolvedFunction>> {
        let result = self.concrete_sig(func, subs).and_then(|sig| self.resolved_function(sig));
        self.surface(result)
    }

    /// Signature of `func` before any substitution.
    ///
    /// Drivers check `is_concrete` on it to tell which functions can be
    /// resolved without substitutions.
    pub fn generic_signature(&self, func: NodeId) -> QueryResult<Arc<TypedSignature>> {
        self.surface(self.signature(self.generic_sig_id(func)))
    }

    /// Qualified type of declaration `decl`.
    pub fn type_for_symbol(&self, decl: NodeId) -> QueryResult<QualifiedType> {
        self.surface(self.symbol_type(decl))
    }

    /// Every diagnostic reported so far, grouped by the query that produced
    /// it in completion order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.engine.diagnostics()
    }

    /// Number of query computations so far. Cache hits do not count.
    pub fn executions(&self) -> u64 {
        self.engine.executions()
    }

    /// Resolve the bodies of several non-generic functions, on the rayon
    /// pool when the configuration allows it.
    pub fn resolve_functions(&self, funcs: &[NodeId]) -> Vec<QueryResult<Arc<ResolvedFunction>>> {
        if self.config().parallel {
            funcs
                .par_iter()
                .map(|&func| self.resolve_concrete_function(func, &[]))
                .collect()
        } else {
            funcs
                .iter()
                .map(|&func| self.resolve_concrete_function(func, &[]))
                .collect()
        }
    }

    fn concrete_sig(
        &self,
        func: NodeId,
        subs: &[(Name, QualifiedType)],
    ) -> QueryResult<SigId> {
        if subs.is_empty() {
            return Ok(self.generic_sig_id(func));
        }
        let untyped = self.untyped_signature(func)?;
        let mut indexed = Vec::with_capacity(subs.len());
        for &(name, qt) in subs {
            let index = untyped
                .formal_index(name)
                .and_then(|i| u32::try_from(i).ok())
                .ok_or(ResolveError::UnknownFormal { func, name })?;
            indexed.push((index, qt));
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(self.sig_id(func, indexed, true))
    }

    fn surface<T>(&self, result: QueryResult<T>) -> QueryResult<T> {
        if let Err(err) = &result {
            warn!(%err, "resolution aborted");
            self.engine.report(err.to_diagnostic());
        }
        result
    }
}
