//! Record and class types: generic formals, defaults and fields.
//!
//! The `type` and `param` fields of a record are its generic formals. The
//! generic type is interned once per declaration with every substitution
//! empty; `R(int)` and friends are instantiations of it.

use crate::query::QueryKey;
use crate::resolver::Resolver;
use crate::{Context, QueryResult, ResolveError};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Name, NodeId, NodeKind, VarKind, VariableDecl};
use kestrel_types::{
    CompositeType, GenericFormal, GenericKind, Genericity, QualKind, QualifiedType, TypeData,
    TypeId,
};
use std::sync::Arc;
use tracing::debug;

/// One value field of a record type, inherited fields first.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FieldInfo {
    pub name: Name,
    pub decl: NodeId,
    pub qt: QualifiedType,
}

/// What a generic formal reads as, given its substitution.
///
/// Unsubstituted formals read as the generic `?` type (or an unknown
/// `param` of it) so signatures that mention them stay generic.
pub(crate) fn generic_formal_qt(
    formal: &GenericFormal,
    sub: Option<QualifiedType>,
) -> QualifiedType {
    match (formal.kind, sub) {
        (GenericKind::Type, Some(sub)) => QualifiedType::type_(sub.ty),
        (GenericKind::Param, Some(sub)) => sub,
        (GenericKind::Type, None) => QualifiedType::type_(TypeId::ANY),
        (GenericKind::Param, None) => QualifiedType::new(QualKind::Param, TypeId::ANY),
    }
}

impl Context {
    /// Generic type of record or class `decl`.
    pub(crate) fn record_type(&self, decl: NodeId) -> QueryResult<TypeId> {
        self.engine.memo(
            self,
            &self.tables.record_type,
            decl,
            QueryKey::RecordType(decl),
            |cx| compute_record_type(cx, decl),
        )
    }

    /// `ty` with every defaulted generic formal that is still open filled in.
    pub(crate) fn defaults_applied(&self, ty: TypeId) -> QueryResult<TypeId> {
        self.engine.memo(
            self,
            &self.tables.defaults_applied,
            ty,
            QueryKey::DefaultsApplied(ty),
            |cx| compute_defaults_applied(cx, ty),
        )
    }

    /// Value fields of composite `ty`; empty for other types.
    pub(crate) fn fields(&self, ty: TypeId) -> QueryResult<Arc<Vec<FieldInfo>>> {
        self.engine.memo(
            self,
            &self.tables.fields,
            ty,
            QueryKey::Fields(ty),
            |cx| compute_fields(cx, ty).map(Arc::new),
        )
    }

    /// Generic formal called `name` of `ty` or one of its ancestors, with
    /// what it reads as in `ty`.
    pub(crate) fn generic_formal(
        &self,
        ty: TypeId,
        name: Name,
    ) -> Option<(GenericFormal, QualifiedType)> {
        std::iter::once(ty)
            .chain(self.types.ancestors(ty))
            .filter_map(|t| self.types.composite(t))
            .find_map(|c| {
                let index = c.formal_index(name)?;
                let formal = c.formals[index];
                Some((formal, generic_formal_qt(&formal, c.subs[index])))
            })
    }
}

fn compute_record_type(cx: &Context, decl: NodeId) -> QueryResult<TypeId> {
    let tree = cx.tree(decl.module)?;
    let Some(NodeKind::Record(rec)) = tree.kind(decl) else {
        return Err(ResolveError::malformed(decl, "expected a record declaration"));
    };

    let parent = match rec.parent {
        Some(expr) => {
            let mut resolver = Resolver::new(cx, decl.module, Default::default())?;
            let ty = resolver.resolve_type_expr(expr)?;
            if ty.is_erroneous() {
                None
            } else if cx.types.is_class(ty) {
                Some(ty)
            } else {
                resolver.report(
                    expr,
                    Diagnostic::error(ErrorCode::E2003).with_message(format!(
                        "`{}` is not a class and cannot be inherited from",
                        cx.display_type(ty)
                    )),
                );
                None
            }
        }
        None => None,
    };

    let formals: Vec<GenericFormal> = rec
        .members
        .iter()
        .filter_map(|&member| {
            let var = tree.kind(member)?.as_variable()?;
            let kind = match var.kind {
                VarKind::Type => GenericKind::Type,
                VarKind::Param => GenericKind::Param,
                _ => return None,
            };
            Some(GenericFormal {
                name: var.name,
                decl: member,
                kind,
                has_default: var.init.is_some(),
            })
        })
        .collect();

    let subs = vec![None; formals.len()];
    Ok(cx.types.intern(TypeData::Composite(CompositeType {
        decl,
        name: rec.name,
        kind: rec.kind,
        parent,
        formals,
        subs,
    })))
}

fn compute_defaults_applied(cx: &Context, ty: TypeId) -> QueryResult<TypeId> {
    let Some(composite) = cx.types.composite(ty) else {
        return Ok(ty);
    };
    let tree = cx.tree(composite.decl.module)?;
    let mut resolver = Resolver::for_record(cx, composite.decl, ty)?;
    let mut current = ty;

    for (index, formal) in composite.formals.iter().enumerate() {
        if composite.subs[index].is_some() || !formal.has_default {
            continue;
        }
        let Some(init) = tree.kind(formal.decl).and_then(NodeKind::as_variable).and_then(|v| v.init)
        else {
            continue;
        };
        let value = resolver.resolve_expr(init)?;
        let sub = match formal.kind {
            _ if value.is_erroneous() => continue,
            GenericKind::Type if value.is_type() => QualifiedType::type_(value.ty),
            GenericKind::Param if value.is_param() => value,
            GenericKind::Type => {
                resolver.report(
                    init,
                    Diagnostic::error(ErrorCode::E2003).with_message(format!(
                        "default for type field `{}` is not a type",
                        cx.name_str(formal.name)
                    )),
                );
                continue;
            }
            GenericKind::Param => {
                resolver.report(
                    init,
                    Diagnostic::error(ErrorCode::E2002).with_message(format!(
                        "default for param field `{}` is not a compile-time value",
                        cx.name_str(formal.name)
                    )),
                );
                continue;
            }
        };
        let mut subs = cx
            .types
            .composite(current)
            .map(|c| c.subs)
            .unwrap_or_default();
        if let Some(slot) = subs.get_mut(index) {
            *slot = Some(sub);
        }
        current = cx.types.instantiate(current, subs);
        if let Some(record) = resolver.env.record.as_mut() {
            record.ty = current;
        }
    }

    debug!(
        from = %cx.display_type(ty),
        to = %cx.display_type(current),
        "applied generic defaults"
    );
    Ok(current)
}

fn compute_fields(cx: &Context, ty: TypeId) -> QueryResult<Vec<FieldInfo>> {
    let Some(composite) = cx.types.composite(ty) else {
        return Ok(Vec::new());
    };
    let mut out = match composite.parent {
        Some(parent) => cx.fields(parent)?.as_ref().clone(),
        None => Vec::new(),
    };

    let tree = cx.tree(composite.decl.module)?;
    let Some(NodeKind::Record(rec)) = tree.kind(composite.decl) else {
        return Err(ResolveError::malformed(composite.decl, "expected a record declaration"));
    };
    let mut resolver = Resolver::for_record(cx, composite.decl, ty)?;

    for &member in &rec.members {
        let Some(var) = tree.kind(member).and_then(NodeKind::as_variable) else {
            continue;
        };
        if matches!(var.kind, VarKind::Type | VarKind::Param) {
            continue;
        }
        let qt = field_qt(&mut resolver, member, var)?;
        if let Some(record) = resolver.env.record.as_mut() {
            record.fields.insert(member, qt);
        }
        out.push(FieldInfo {
            name: var.name,
            decl: member,
            qt,
        });
    }
    Ok(out)
}

fn field_qt(
    resolver: &mut Resolver<'_>,
    member: NodeId,
    var: &VariableDecl,
) -> QueryResult<QualifiedType> {
    let kind = QualKind::for_var(var.kind);
    if let Some(expr) = var.type_expr {
        let mut ty = resolver.resolve_type_expr(expr)?;
        if resolver.cx.types.genericity(ty) == Genericity::GenericWithDefaults {
            ty = resolver.cx.defaults_applied(ty)?;
        }
        return Ok(QualifiedType::new(kind, ty));
    }
    if let Some(init) = var.init {
        let value = resolver.resolve_expr(init)?;
        if value.is_erroneous() {
            return Ok(QualifiedType::ERRONEOUS);
        }
        return Ok(QualifiedType::new(kind, value.ty));
    }
    resolver.report(
        member,
        Diagnostic::error(ErrorCode::E2006).with_message(format!(
            "field `{}` has neither a type nor an initializer",
            resolver.cx.name_str(var.name)
        )),
    );
    Ok(QualifiedType::ERRONEOUS)
}
