//! Function bodies and return types.

use crate::actions;
use crate::query::QueryKey;
use crate::resolver::Resolver;
use crate::results::ResolvedFunction;
use crate::signature::{SigId, TypedSignature};
use crate::{Context, QueryResult};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::ReturnIntent;
use kestrel_types::{QualKind, QualifiedType, TypeId};
use std::sync::Arc;
use tracing::debug;

impl Context {
    /// Body of the function with signature `sig`, resolved with its formals
    /// bound, together with its lifecycle actions.
    pub(crate) fn resolved_function(&self, sig: SigId) -> QueryResult<Arc<ResolvedFunction>> {
        self.engine.memo(
            self,
            &self.tables.resolved_function,
            sig,
            QueryKey::ResolvedFunction(sig),
            |cx| compute_resolved_function(cx, sig).map(Arc::new),
        )
    }

    /// What a call to `sig` evaluates to.
    pub(crate) fn return_type(&self, sig: SigId) -> QueryResult<QualifiedType> {
        self.engine.memo(
            self,
            &self.tables.return_type,
            sig,
            QueryKey::ReturnType(sig),
            |cx| compute_return_type(cx, sig),
        )
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(sig = id.raw()))]
fn compute_resolved_function(cx: &Context, id: SigId) -> QueryResult<ResolvedFunction> {
    let sig = cx.signature(id)?;
    let decl = sig.decl();
    if !sig.is_concrete() {
        cx.report_at(
            decl,
            Diagnostic::error(ErrorCode::E2004).with_message(format!(
                "`{}` is generic; its body is resolved per instantiation",
                cx.name_str(sig.name())
            )),
        );
        return Ok(ResolvedFunction::empty(id, decl, true));
    }
    let Some(body) = sig.untyped.body else {
        return Ok(ResolvedFunction::empty(id, decl, false));
    };

    let mut resolver = Resolver::for_body(cx, &sig)?;
    resolver.resolve_stmt(body)?;
    let mut exprs = std::mem::take(&mut resolver.exprs);
    let returns = std::mem::take(&mut resolver.returns);

    let tree = cx.tree(decl.module)?;
    let actions = actions::body_actions(cx, &tree, body, &mut exprs)?;
    debug!(
        function = cx.name_str(sig.name()),
        exprs = exprs.len(),
        actions = actions.len(),
        "resolved function body"
    );
    Ok(ResolvedFunction {
        sig: id,
        decl,
        exprs,
        actions,
        returns,
        erroneous: false,
    })
}

fn compute_return_type(cx: &Context, id: SigId) -> QueryResult<QualifiedType> {
    let sig = cx.signature(id)?;
    if !sig.is_concrete() {
        return Ok(QualifiedType::UNKNOWN);
    }
    let intent = sig.untyped.return_intent;
    let declared = match sig.untyped.return_type {
        Some(expr) => {
            let mut resolver = Resolver::for_body(cx, &sig)?;
            let ty = resolver.resolve_type_expr(expr)?;
            if ty.is_erroneous() {
                return Ok(QualifiedType::ERRONEOUS);
            }
            Some(resolver.with_defaults(ty)?)
        }
        None => None,
    };

    match intent {
        ReturnIntent::Param | ReturnIntent::Type => returned_value(cx, &sig, intent, declared),
        ReturnIntent::Value | ReturnIntent::Ref | ReturnIntent::ConstRef => {
            let kind = match intent {
                ReturnIntent::Ref => QualKind::Ref,
                ReturnIntent::ConstRef => QualKind::ConstRef,
                _ => QualKind::ConstVar,
            };
            if let Some(ty) = declared {
                return Ok(if ty == TypeId::VOID {
                    QualifiedType::VOID
                } else {
                    QualifiedType::new(kind, ty)
                });
            }
            inferred(cx, &sig, kind)
        }
    }
}

/// Compile-time value or type produced by a `param` or `type` function.
fn returned_value(
    cx: &Context,
    sig: &TypedSignature,
    intent: ReturnIntent,
    declared: Option<TypeId>,
) -> QueryResult<QualifiedType> {
    let body = cx.resolved_function(sig.id)?;
    let Some(&(at, value)) = body.returns.first() else {
        cx.report_at(
            sig.decl(),
            Diagnostic::error(ErrorCode::E2002).with_message(format!(
                "`{}` does not return a value",
                cx.name_str(sig.name())
            )),
        );
        return Ok(QualifiedType::ERRONEOUS);
    };
    if value.is_erroneous() {
        return Ok(QualifiedType::ERRONEOUS);
    }
    let ok = match intent {
        ReturnIntent::Type => value.is_type(),
        _ => value.is_param(),
    };
    if !ok {
        let what = if intent == ReturnIntent::Type {
            "a type"
        } else {
            "a compile-time value"
        };
        cx.report_at(
            at,
            Diagnostic::error(ErrorCode::E2002).with_message(format!(
                "`{}` must return {what}",
                cx.name_str(sig.name())
            )),
        );
        return Ok(QualifiedType::ERRONEOUS);
    }
    match declared {
        Some(ty) if intent == ReturnIntent::Param => {
            if cx.types.pass_kind(&value, ty).is_none() {
                cx.report_at(
                    at,
                    Diagnostic::error(ErrorCode::E2002).with_message(format!(
                        "expected `{}`, found `{}`",
                        cx.display_type(ty),
                        cx.display_type(value.ty)
                    )),
                );
                return Ok(QualifiedType::ERRONEOUS);
            }
            Ok(QualifiedType { ty, ..value })
        }
        _ => Ok(value),
    }
}

/// Return type of a function without a declared one, from its `return`s.
fn inferred(cx: &Context, sig: &TypedSignature, kind: QualKind) -> QueryResult<QualifiedType> {
    if sig.untyped.body.is_none() {
        return Ok(QualifiedType::VOID);
    }
    let body = cx.resolved_function(sig.id)?;
    let mut found: Option<TypeId> = None;
    for &(at, qt) in &body.returns {
        if qt.is_erroneous() {
            return Ok(QualifiedType::ERRONEOUS);
        }
        match found {
            None => found = Some(qt.ty),
            Some(ty) if ty == qt.ty => {}
            Some(ty) if cx.types.pass_kind(&qt, ty).is_some() => {}
            // A later, wider return widens the result.
            Some(ty) if cx.types.pass_kind(&QualifiedType::new(QualKind::Var, ty), qt.ty).is_some() => {
                found = Some(qt.ty);
            }
            Some(ty) => {
                cx.report_at(
                    at,
                    Diagnostic::error(ErrorCode::E2007).with_message(format!(
                        "`{}` returns both `{}` and `{}`",
                        cx.name_str(sig.name()),
                        cx.display_type(ty),
                        cx.display_type(qt.ty)
                    )),
                );
                return Ok(QualifiedType::ERRONEOUS);
            }
        }
    }
    Ok(match found {
        None | Some(TypeId::VOID) => QualifiedType::VOID,
        Some(ty) => QualifiedType::new(kind, ty),
    })
}
