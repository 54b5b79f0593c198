//! Call expressions: free functions, methods, type constructors.

use super::Resolver;
use crate::methods::MethodCandidatesKey;
use crate::overload::{self, Selection};
use crate::results::ResolvedExpression;
use crate::scope::{self, Binding, Level};
use crate::QueryResult;
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Actual, Name, NodeId, NodeKind};
use kestrel_types::{GenericKind, IntWidth, QualKind, QualifiedType, RealWidth, TypeId};

/// One resolved actual of a call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct CallActual {
    pub name: Option<Name>,
    pub qt: QualifiedType,
    /// Expression the actual came from; `None` for implicit receivers.
    pub node: Option<NodeId>,
}

/// Everything overload resolution needs to know about a call.
#[derive(Clone, Debug)]
pub(crate) struct CallSite {
    pub node: NodeId,
    /// Explicit receiver of `recv.name(...)`.
    pub receiver: Option<CallActual>,
    /// `this` of the enclosing method, offered to method candidates of a
    /// bare call.
    pub implicit_receiver: Option<CallActual>,
    pub actuals: Vec<CallActual>,
    pub parenless: bool,
}

impl Resolver<'_> {
    pub(super) fn resolve_call(
        &mut self,
        node: NodeId,
        callee: NodeId,
        actuals: &[Actual],
    ) -> QueryResult<ResolvedExpression> {
        match self.kind(callee)?.clone() {
            NodeKind::Dot { receiver, field } => {
                let recv = self.resolve_expr(receiver)?;
                let args = self.resolve_actuals(actuals)?;
                let Some(args) = args.filter(|_| !recv.is_erroneous()) else {
                    return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
                };
                if recv.kind == QualKind::Module {
                    return self.module_call(node, receiver, field, args);
                }
                let actual = CallActual {
                    name: None,
                    qt: recv,
                    node: Some(receiver),
                };
                match self.method_call(node, actual, field, args, false)? {
                    Some(resolved) => Ok(resolved),
                    None => {
                        self.report(
                            node,
                            Diagnostic::error(ErrorCode::E3001).with_message(format!(
                                "type `{}` has no method `{}`",
                                self.cx.display_type(recv.ty),
                                self.cx.name_str(field)
                            )),
                        );
                        Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS))
                    }
                }
            }
            NodeKind::Identifier { name } => {
                let Some(args) = self.resolve_actuals(actuals)? else {
                    return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
                };
                self.bare_call(node, callee, name, args, false)
            }
            _ => {
                let callee_qt = self.resolve_expr(callee)?;
                let args = self.resolve_actuals(actuals)?;
                let Some(args) = args.filter(|_| !callee_qt.is_erroneous()) else {
                    return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
                };
                if callee_qt.is_type() {
                    return Ok(self.type_constructor(node, callee_qt.ty, &args));
                }
                Ok(self.not_callable(node))
            }
        }
    }

    /// `name(args)` with no receiver expression.
    pub(super) fn bare_call(
        &mut self,
        node: NodeId,
        callee: NodeId,
        name: Name,
        args: Vec<CallActual>,
        parenless: bool,
    ) -> QueryResult<ResolvedExpression> {
        let levels = scope::lookup_levels(self.cx, callee, name)?;

        if let Some(first) = levels.first().filter(|l| !l.via_receiver) {
            match first.bindings.first() {
                Some(Binding::Builtin(ty)) => return Ok(self.type_constructor(node, *ty, &args)),
                Some(Binding::This | Binding::Module(_)) => return Ok(self.not_callable(node)),
                Some(Binding::Decl(decl)) => match self.cx.decl_kind(*decl)? {
                    NodeKind::Record(_) => {
                        let ty = self.cx.record_type(*decl)?;
                        return Ok(self.type_constructor(node, ty, &args));
                    }
                    NodeKind::Variable(_) | NodeKind::Formal(_) => {
                        return Ok(self.not_callable(node));
                    }
                    _ => {}
                },
                None => {}
            }
        }

        let mut candidates = Vec::new();
        let mut outer = Vec::new();
        for level in &levels {
            if level.via_receiver {
                continue;
            }
            let functions = self.free_functions(level)?;
            if functions.is_empty() {
                continue;
            }
            let inner = self.env.func.is_some_and(|func| {
                level.scope.module == func.module && self.tree().is_within(level.scope, func)
            });
            if inner {
                candidates.push(functions);
            } else {
                outer.push(functions);
            }
        }
        let receiver = self.env.receiver();
        if let Some(recv) = receiver {
            let key = MethodCandidatesKey {
                target: self.cx.receiver_target(recv.ty),
                name,
                site: node.module,
            };
            candidates.extend(self.cx.method_candidates(key)?.iter().cloned());
        }
        candidates.extend(outer);

        if candidates.is_empty() {
            self.report(
                node,
                Diagnostic::error(ErrorCode::E2001).with_message(format!(
                    "cannot find function `{}` in this scope",
                    self.cx.name_str(name)
                )),
            );
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }

        let site = CallSite {
            node,
            receiver: None,
            implicit_receiver: receiver.map(|qt| CallActual {
                name: None,
                qt,
                node: None,
            }),
            actuals: args,
            parenless,
        };
        self.select(&site, &candidates, name)
    }

    /// Function declarations of one level that are not methods.
    pub(super) fn free_functions(&self, level: &Level) -> QueryResult<Vec<NodeId>> {
        let mut out = Vec::new();
        for binding in &level.bindings {
            let Binding::Decl(decl) = *binding else {
                continue;
            };
            if !matches!(self.cx.decl_kind(decl)?, NodeKind::Function(_)) {
                continue;
            }
            let owner = self.cx.tree(decl.module)?.parent(decl);
            let is_primary_method = match owner {
                Some(owner) => matches!(self.cx.decl_kind(owner)?, NodeKind::Record(_)),
                None => false,
            };
            if !is_primary_method {
                out.push(decl);
            }
        }
        Ok(out)
    }

    /// `receiver.name(args)`, or `None` when the receiver's type has no
    /// method called `name` at all.
    pub(super) fn method_call(
        &mut self,
        node: NodeId,
        receiver: CallActual,
        name: Name,
        args: Vec<CallActual>,
        parenless: bool,
    ) -> QueryResult<Option<ResolvedExpression>> {
        let key = MethodCandidatesKey {
            target: self.cx.receiver_target(receiver.qt.ty),
            name,
            site: node.module,
        };
        let levels = self.cx.method_candidates(key)?;
        if levels.is_empty() {
            return Ok(None);
        }
        let site = CallSite {
            node,
            receiver: Some(receiver),
            implicit_receiver: None,
            actuals: args,
            parenless,
        };
        self.select(&site, &levels, name).map(Some)
    }

    /// `M.name(args)` where `M` is a module.
    fn module_call(
        &mut self,
        node: NodeId,
        receiver: NodeId,
        name: Name,
        args: Vec<CallActual>,
    ) -> QueryResult<ResolvedExpression> {
        let Some(root) = self.exprs.get(&receiver).and_then(|e| e.to_decl) else {
            return Ok(self.not_callable(node));
        };
        let decls = self.cx.scope_decls(root)?;
        let mut functions = Vec::new();
        for &decl in decls.get(name) {
            if matches!(self.cx.decl_kind(decl)?, NodeKind::Function(_)) {
                functions.push(decl);
            }
        }
        if functions.is_empty() {
            self.report(
                node,
                Diagnostic::error(ErrorCode::E2001).with_message(format!(
                    "module `{}` has no function `{}`",
                    self.cx.name_str(root.module),
                    self.cx.name_str(name)
                )),
            );
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }
        let site = CallSite {
            node,
            receiver: None,
            implicit_receiver: None,
            actuals: args,
            parenless: false,
        };
        self.select(&site, &[functions], name)
    }

    /// Pick the most specific candidate and record the outcome.
    pub(super) fn select(
        &mut self,
        site: &CallSite,
        levels: &[Vec<NodeId>],
        name: Name,
    ) -> QueryResult<ResolvedExpression> {
        match overload::resolve(self.cx, site, levels)? {
            Selection::Unique(best) => {
                let qt = self.cx.return_type(best.sig)?;
                let mut resolved = ResolvedExpression::new(qt);
                resolved.candidates.push(best.sig);
                Ok(resolved)
            }
            Selection::Ambiguous(sigs) => {
                self.report(
                    site.node,
                    Diagnostic::error(ErrorCode::E3002).with_message(format!(
                        "call to `{}` is ambiguous between {} candidates",
                        self.cx.name_str(name),
                        sigs.len()
                    )),
                );
                let mut resolved = ResolvedExpression::new(QualifiedType::ERRONEOUS);
                resolved.candidates.extend(sigs);
                Ok(resolved)
            }
            Selection::NoMatch => {
                let considered: usize = levels.iter().map(Vec::len).sum();
                self.report(
                    site.node,
                    Diagnostic::error(ErrorCode::E3001)
                        .with_message(format!(
                            "no matching candidates for call to `{}`",
                            self.cx.name_str(name)
                        ))
                        .with_note(format!("{considered} candidate(s) considered")),
                );
                Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS))
            }
        }
    }

    /// `R(args)`, `int(8)`, `real(32)` in type position.
    fn type_constructor(
        &mut self,
        node: NodeId,
        ty: TypeId,
        args: &[CallActual],
    ) -> ResolvedExpression {
        let result = match self.cx.types.composite(ty) {
            Some(_) => self.instantiate_record(ty, args),
            None => builtin_width(&self.cx.types, ty, args),
        };
        match result {
            Some(instance) => ResolvedExpression::new(QualifiedType::type_(instance)),
            None => {
                self.report(
                    node,
                    Diagnostic::error(ErrorCode::E3001).with_message(format!(
                        "invalid type arguments for `{}`",
                        self.cx.display_type(ty)
                    )),
                );
                ResolvedExpression::new(QualifiedType::ERRONEOUS)
            }
        }
    }

    /// Bind type-constructor actuals to the generic formals of `ty`.
    fn instantiate_record(&self, ty: TypeId, args: &[CallActual]) -> Option<TypeId> {
        let composite = self.cx.types.composite(ty)?;
        let mut subs = composite.subs.clone();
        let mut next = 0;
        for arg in args {
            let index = match arg.name {
                Some(name) => composite.formal_index(name)?,
                None => {
                    while subs.get(next).is_some_and(Option::is_some) {
                        next += 1;
                    }
                    next
                }
            };
            let formal = composite.formals.get(index)?;
            if subs[index].is_some() {
                return None;
            }
            subs[index] = Some(match formal.kind {
                GenericKind::Type if arg.qt.is_type() => QualifiedType::type_(arg.qt.ty),
                GenericKind::Param if arg.qt.is_param() => arg.qt,
                _ => return None,
            });
        }
        Some(self.cx.types.instantiate(ty, subs))
    }

    fn not_callable(&self, node: NodeId) -> ResolvedExpression {
        self.report(
            node,
            Diagnostic::error(ErrorCode::E3004).with_message("expression is not callable"),
        );
        ResolvedExpression::new(QualifiedType::ERRONEOUS)
    }
}

/// `int(w)`, `uint(w)` and `real(w)`.
fn builtin_width(
    types: &kestrel_types::TypeInterner,
    ty: TypeId,
    args: &[CallActual],
) -> Option<TypeId> {
    let [arg] = args else {
        return None;
    };
    let bits = i64::try_from(arg.qt.param?.as_integer()?).ok()?;
    match ty {
        TypeId::INT => Some(types.int(IntWidth::from_bits(bits)?)),
        TypeId::UINT => Some(types.uint(IntWidth::from_bits(bits)?)),
        TypeId::REAL => match bits {
            32 => Some(types.real(RealWidth::W32)),
            64 => Some(types.real(RealWidth::W64)),
            _ => None,
        },
        _ => None,
    }
}
