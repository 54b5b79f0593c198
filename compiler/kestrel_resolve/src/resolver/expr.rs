//! Identifiers, field access, literals, `new` and variable declarations.

use super::{CallActual, CallSite, Resolver};
use crate::methods::{MethodCandidatesKey, ReceiverTarget};
use crate::results::ResolvedExpression;
use crate::scope::{self, Binding};
use crate::signature::FormalSource;
use crate::{QueryResult, ResolveError};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Actual, FnFlags, Literal, Name, NodeId, NodeKind, VarKind};
use kestrel_types::{Genericity, ParamValue, QualKind, QualifiedType, TypeId};

impl Resolver<'_> {
    pub(super) fn resolve_expr_inner(&mut self, node: NodeId) -> QueryResult<ResolvedExpression> {
        match self.kind(node)?.clone() {
            NodeKind::Literal(lit) => Ok(ResolvedExpression::new(self.literal(lit))),
            NodeKind::Identifier { name } => self.resolve_identifier(node, name),
            NodeKind::Dot { receiver, field } => self.resolve_dot(node, receiver, field),
            NodeKind::Call { callee, actuals } => self.resolve_call(node, callee, &actuals),
            NodeKind::OpCall { op, operands } => self.resolve_op(node, op, &operands),
            NodeKind::New { type_expr, actuals } => self.resolve_new(node, type_expr, &actuals),
            NodeKind::Variable(_) => {
                let qt = self.resolve_var(node)?;
                Ok(ResolvedExpression::new(qt).with_decl(Some(node)))
            }
            _ => Err(ResolveError::malformed(node, "statement in expression position")),
        }
    }

    fn literal(&self, lit: Literal) -> QualifiedType {
        let config = self.cx.config();
        let types = &self.cx.types;
        match lit {
            Literal::Int(v) => {
                QualifiedType::param(types.int(config.default_int_width), ParamValue::Int(v))
            }
            Literal::Uint(v) => {
                QualifiedType::param(types.uint(config.default_int_width), ParamValue::Uint(v))
            }
            Literal::Real(bits) => {
                QualifiedType::param(types.real(config.default_real_width), ParamValue::Real(bits))
            }
            Literal::Bool(b) => QualifiedType::param_bool(b),
            Literal::Str(s) => QualifiedType::param(TypeId::STRING, ParamValue::Str(s)),
            Literal::CStr(s) => QualifiedType::param(TypeId::CSTRING, ParamValue::CStr(s)),
        }
    }

    fn resolve_identifier(&mut self, node: NodeId, name: Name) -> QueryResult<ResolvedExpression> {
        let levels = scope::lookup_levels(self.cx, node, name)?;
        let Some((binding, via_receiver)) = levels
            .first()
            .and_then(|level| level.bindings.first().map(|b| (*b, level.via_receiver)))
        else {
            // Secondary and tertiary parenless methods of `this`.
            if let Some(receiver) = self.env.receiver() {
                let actual = CallActual {
                    name: None,
                    qt: receiver,
                    node: None,
                };
                if let Some(resolved) = self.method_call(node, actual, name, Vec::new(), true)? {
                    return Ok(resolved);
                }
            }
            return Ok(self.unknown_identifier(node, name));
        };

        match binding {
            Binding::This => Ok(match self.env.receiver() {
                Some(qt) => ResolvedExpression::new(qt),
                None => self.unknown_identifier(node, name),
            }),
            Binding::Builtin(ty) => Ok(ResolvedExpression::new(QualifiedType::type_(ty))),
            Binding::Module(module) => {
                let root = self.cx.loaded(module).map(|t| t.root());
                Ok(
                    ResolvedExpression::new(QualifiedType::new(QualKind::Module, TypeId::VOID))
                        .with_decl(root),
                )
            }
            Binding::Decl(decl) => self.resolve_decl_ref(node, name, decl, via_receiver),
        }
    }

    /// Reference to declaration `decl` found by name lookup.
    pub(super) fn resolve_decl_ref(
        &mut self,
        node: NodeId,
        name: Name,
        decl: NodeId,
        via_receiver: bool,
    ) -> QueryResult<ResolvedExpression> {
        let kind = self.cx.decl_kind(decl)?;

        if via_receiver {
            if let Some(receiver) = self.env.receiver() {
                if let NodeKind::Function(_) = kind {
                    let actual = CallActual {
                        name: None,
                        qt: receiver,
                        node: None,
                    };
                    return Ok(match self.method_call(node, actual, name, Vec::new(), true)? {
                        Some(resolved) => resolved,
                        None => self.unknown_identifier(node, name),
                    });
                }
                return Ok(match self.field_access(receiver, name)? {
                    Some((qt, field)) => ResolvedExpression::new(qt).with_decl(field),
                    None => self.unknown_identifier(node, name),
                });
            }
        }

        let qt = match kind {
            NodeKind::Formal(_) => match self.env.formal(FormalSource::Node(decl)) {
                Some(qt) => qt,
                None => self.cx.symbol_type(decl)?,
            },
            NodeKind::Variable(_) => match self.variable_ref(decl, name)? {
                Some(qt) => qt,
                None => return Ok(self.unknown_identifier(node, name)),
            },
            NodeKind::Record(_) => QualifiedType::type_(self.cx.record_type(decl)?),
            NodeKind::Function(func) if func.flags.contains(FnFlags::PARENLESS) => {
                return self.bare_call(node, node, name, Vec::new(), true);
            }
            NodeKind::Function(_) => self.cx.symbol_type(decl)?,
            _ => return Err(ResolveError::malformed(decl, "name bound to a non-declaration")),
        };
        Ok(ResolvedExpression::new(qt).with_decl(Some(decl)))
    }

    /// Type of a variable named in an expression, or `None` when the
    /// variable is a field that cannot be reached from here.
    fn variable_ref(&mut self, decl: NodeId, name: Name) -> QueryResult<Option<QualifiedType>> {
        let owner = self.cx.tree(decl.module)?.parent(decl);
        let in_record = match owner {
            Some(owner) => matches!(self.cx.decl_kind(owner)?, NodeKind::Record(_)),
            None => false,
        };
        if in_record {
            let Some(record) = &self.env.record else {
                return Ok(None);
            };
            if let Some((_, qt)) = self.cx.generic_formal(record.ty, name) {
                return Ok(Some(qt));
            }
            return Ok(record.fields.get(&decl).copied());
        }
        if self.is_local(decl) {
            return Ok(Some(self.recorded(decl).unwrap_or(QualifiedType::ERRONEOUS)));
        }
        self.cx.symbol_type(decl).map(Some)
    }

    fn unknown_identifier(&self, node: NodeId, name: Name) -> ResolvedExpression {
        self.report(
            node,
            Diagnostic::error(ErrorCode::E2001)
                .with_message(format!("cannot find `{}` in this scope", self.cx.name_str(name))),
        );
        ResolvedExpression::new(QualifiedType::ERRONEOUS)
    }

    /// `receiver.name` as a field or generic formal of the receiver's type.
    pub(super) fn field_access(
        &mut self,
        receiver: QualifiedType,
        name: Name,
    ) -> QueryResult<Option<(QualifiedType, Option<NodeId>)>> {
        if let Some((formal, qt)) = self.cx.generic_formal(receiver.ty, name) {
            return Ok(Some((qt, Some(formal.decl))));
        }
        if receiver.is_type() {
            return Ok(None);
        }
        let fields = self.cx.fields(receiver.ty)?;
        let Some(field) = fields.iter().rev().find(|f| f.name == name) else {
            return Ok(None);
        };
        if field.qt.is_erroneous() {
            return Ok(Some((QualifiedType::ERRONEOUS, Some(field.decl))));
        }
        let kind = match field.qt.kind {
            QualKind::Var if receiver.kind.is_mutable_lvalue() => QualKind::Ref,
            QualKind::Ref => QualKind::Ref,
            _ => QualKind::ConstRef,
        };
        Ok(Some((QualifiedType::new(kind, field.qt.ty), Some(field.decl))))
    }

    fn resolve_dot(
        &mut self,
        node: NodeId,
        receiver: NodeId,
        field: Name,
    ) -> QueryResult<ResolvedExpression> {
        let recv = self.resolve_expr(receiver)?;
        if recv.is_erroneous() {
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }
        if recv.kind == QualKind::Module {
            return self.module_member(node, receiver, field);
        }
        if field == self.cx.names.type_ {
            return Ok(ResolvedExpression::new(QualifiedType::type_(recv.ty)));
        }
        if let Some((qt, decl)) = self.field_access(recv, field)? {
            return Ok(ResolvedExpression::new(qt).with_decl(decl));
        }
        let actual = CallActual {
            name: None,
            qt: recv,
            node: Some(receiver),
        };
        if let Some(resolved) = self.method_call(node, actual, field, Vec::new(), true)? {
            return Ok(resolved);
        }
        self.report(
            node,
            Diagnostic::error(ErrorCode::E2005).with_message(format!(
                "type `{}` has no field or parenless method `{}`",
                self.cx.display_type(recv.ty),
                self.cx.name_str(field)
            )),
        );
        Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS))
    }

    /// `M.name` where `M` is a module.
    fn module_member(
        &mut self,
        node: NodeId,
        receiver: NodeId,
        name: Name,
    ) -> QueryResult<ResolvedExpression> {
        let Some(root) = self.exprs.get(&receiver).and_then(|e| e.to_decl) else {
            return Ok(self.unknown_identifier(node, name));
        };
        let decls = self.cx.scope_decls(root)?;
        match decls.get(name).first() {
            Some(&decl) => self.resolve_decl_ref(node, name, decl, false),
            None => Ok(self.unknown_identifier(node, name)),
        }
    }

    /// Resolve call actuals in order; `None` if any of them is erroneous.
    pub(super) fn resolve_actuals(
        &mut self,
        actuals: &[Actual],
    ) -> QueryResult<Option<Vec<CallActual>>> {
        let mut out = Vec::with_capacity(actuals.len());
        let mut erroneous = false;
        for actual in actuals {
            let qt = self.resolve_expr(actual.value)?;
            erroneous |= qt.is_erroneous();
            out.push(CallActual {
                name: actual.name,
                qt,
                node: Some(actual.value),
            });
        }
        Ok((!erroneous).then_some(out))
    }

    fn resolve_new(
        &mut self,
        node: NodeId,
        type_expr: NodeId,
        actuals: &[Actual],
    ) -> QueryResult<ResolvedExpression> {
        let ty = self.resolve_type_expr(type_expr)?;
        let args = self.resolve_actuals(actuals)?;
        let Some(args) = args.filter(|_| !ty.is_erroneous()) else {
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        };

        let ty = self.with_defaults(ty)?;
        if !self.cx.types.genericity(ty).is_concrete() {
            self.report(
                type_expr,
                Diagnostic::error(ErrorCode::E2004).with_message(format!(
                    "cannot create an instance of generic type `{}`",
                    self.cx.display_type(ty)
                )),
            );
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }
        let ReceiverTarget::Record(decl) = self.cx.receiver_target(ty) else {
            self.report(
                type_expr,
                Diagnostic::error(ErrorCode::E2003)
                    .with_message("`new` requires a record or class type"),
            );
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        };

        let result = QualifiedType::new(QualKind::ConstVar, ty);
        let levels = self.cx.method_candidates(MethodCandidatesKey {
            target: ReceiverTarget::Record(decl),
            name: self.cx.names.init,
            site: node.module,
        })?;
        if levels.is_empty() {
            return self.generated_init(node, ty, &args);
        }
        let site = CallSite {
            node,
            receiver: Some(CallActual {
                name: None,
                qt: QualifiedType::new(QualKind::Var, ty),
                node: None,
            }),
            implicit_receiver: None,
            actuals: args,
            parenless: false,
        };
        let mut resolved = self.select(&site, &levels, self.cx.names.init)?;
        if !resolved.qt.is_erroneous() {
            resolved.qt = result;
        }
        Ok(resolved)
    }

    /// `new R(...)` without a user `init`: actuals initialize the fields by
    /// position or name.
    fn generated_init(
        &mut self,
        node: NodeId,
        ty: TypeId,
        args: &[CallActual],
    ) -> QueryResult<ResolvedExpression> {
        let fields = self.cx.fields(ty)?;
        let mut bound = vec![false; fields.len()];
        let mut next = 0;
        let mut ok = args.len() <= fields.len();
        for arg in args {
            let index = match arg.name {
                Some(name) => fields.iter().position(|f| f.name == name),
                None => {
                    while next < bound.len() && bound[next] {
                        next += 1;
                    }
                    (next < bound.len()).then_some(next)
                }
            };
            let Some(index) = index.filter(|i| !bound[*i]) else {
                ok = false;
                break;
            };
            bound[index] = true;
            if self.cx.types.pass_kind(&arg.qt, fields[index].qt.ty).is_none() {
                ok = false;
                break;
            }
        }
        if !ok {
            self.report(
                node,
                Diagnostic::error(ErrorCode::E3001).with_message(format!(
                    "no initializer of `{}` accepts these arguments",
                    self.cx.display_type(ty)
                )),
            );
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }
        Ok(ResolvedExpression::new(QualifiedType::new(
            QualKind::ConstVar,
            ty,
        )))
    }

    /// Apply defaults to a type that only lacks defaulted substitutions.
    pub(crate) fn with_defaults(&self, ty: TypeId) -> QueryResult<TypeId> {
        if self.cx.types.genericity(ty) == Genericity::GenericWithDefaults {
            self.cx.defaults_applied(ty)
        } else {
            Ok(ty)
        }
    }

    /// Qualified type of a local or module-level variable declaration.
    pub(crate) fn resolve_var(&mut self, node: NodeId) -> QueryResult<QualifiedType> {
        let Some(var) = self.kind(node)?.as_variable().copied() else {
            return Err(ResolveError::malformed(node, "expected a variable declaration"));
        };
        let declared = match var.type_expr {
            Some(expr) => {
                let ty = self.resolve_type_expr(expr)?;
                Some(self.with_defaults(ty)?)
            }
            None => None,
        };
        let init = match var.init {
            Some(init) => Some((init, self.resolve_expr(init)?)),
            None => None,
        };
        let name = self.cx.name_str(var.name);

        match var.kind {
            VarKind::Type => Ok(match init {
                Some((_, value)) if value.is_erroneous() => QualifiedType::ERRONEOUS,
                Some((_, value)) if value.is_type() => QualifiedType::type_(value.ty),
                Some((init, _)) => {
                    self.report(
                        init,
                        Diagnostic::error(ErrorCode::E2003).with_message(format!(
                            "type alias `{name}` is not initialized with a type"
                        )),
                    );
                    QualifiedType::ERRONEOUS
                }
                None => self.missing_initializer(node, name),
            }),
            VarKind::Param => Ok(match init {
                Some((_, value)) if value.is_erroneous() => QualifiedType::ERRONEOUS,
                Some((init, value)) => match value.param {
                    Some(param) if value.is_param() => {
                        let ty = declared.unwrap_or(value.ty);
                        if self.cx.types.pass_kind(&value, ty).is_none() {
                            self.mismatch(init, ty, value.ty);
                            QualifiedType::ERRONEOUS
                        } else {
                            QualifiedType::param(ty, param)
                        }
                    }
                    _ => {
                        self.report(
                            init,
                            Diagnostic::error(ErrorCode::E2002).with_message(format!(
                                "param `{name}` is not initialized with a compile-time value"
                            )),
                        );
                        QualifiedType::ERRONEOUS
                    }
                },
                None => self.missing_initializer(node, name),
            }),
            VarKind::Var | VarKind::Const | VarKind::Ref => {
                let kind = QualKind::for_var(var.kind);
                Ok(match (declared, init) {
                    (Some(ty), _) if ty.is_erroneous() => QualifiedType::ERRONEOUS,
                    (Some(ty), Some((init, value))) => {
                        self.declared_with_init(node, kind, ty, init, value)
                    }
                    (Some(ty), None) => {
                        if self.cx.types.genericity(ty).is_concrete() {
                            QualifiedType::new(kind, ty)
                        } else {
                            self.report(
                                node,
                                Diagnostic::error(ErrorCode::E2004).with_message(format!(
                                    "cannot default-initialize `{name}` of generic type `{}`",
                                    self.cx.display_type(ty)
                                )),
                            );
                            QualifiedType::ERRONEOUS
                        }
                    }
                    (None, Some((_, value))) if value.is_erroneous() => QualifiedType::ERRONEOUS,
                    (None, Some((init, value))) => {
                        if value.is_type() || value.ty == TypeId::VOID {
                            self.report(
                                init,
                                Diagnostic::error(ErrorCode::E2002).with_message(format!(
                                    "`{name}` is initialized with something that is not a value"
                                )),
                            );
                            QualifiedType::ERRONEOUS
                        } else {
                            QualifiedType::new(kind, value.ty)
                        }
                    }
                    (None, None) => self.missing_initializer(node, name),
                })
            }
        }
    }

    fn declared_with_init(
        &mut self,
        node: NodeId,
        kind: QualKind,
        ty: TypeId,
        init: NodeId,
        value: QualifiedType,
    ) -> QualifiedType {
        if value.is_erroneous() {
            return QualifiedType::new(kind, ty);
        }
        let types = &self.cx.types;
        if !types.genericity(ty).is_concrete() {
            if types.instantiates(value.ty, ty) {
                return QualifiedType::new(kind, value.ty);
            }
            self.report(
                node,
                Diagnostic::error(ErrorCode::E2004).with_message(format!(
                    "initializer of type `{}` does not instantiate `{}`",
                    self.cx.display_type(value.ty),
                    self.cx.display_type(ty)
                )),
            );
            return QualifiedType::ERRONEOUS;
        }
        // Records convert through `init=`, checked with the lifecycle actions.
        let record_involved = types.composite(ty).is_some() || types.composite(value.ty).is_some();
        if !record_involved && types.pass_kind(&value, ty).is_none() {
            self.mismatch(init, ty, value.ty);
        }
        QualifiedType::new(kind, ty)
    }

    fn missing_initializer(&self, node: NodeId, name: &str) -> QualifiedType {
        self.report(
            node,
            Diagnostic::error(ErrorCode::E2006)
                .with_message(format!("`{name}` needs a type or an initializer")),
        );
        QualifiedType::ERRONEOUS
    }

    pub(super) fn mismatch(&self, node: NodeId, expected: TypeId, found: TypeId) {
        self.report(
            node,
            Diagnostic::error(ErrorCode::E2002).with_message(format!(
                "expected `{}`, found `{}`",
                self.cx.display_type(expected),
                self.cx.display_type(found)
            )),
        );
    }
}
