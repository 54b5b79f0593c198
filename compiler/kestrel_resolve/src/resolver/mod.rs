//! Expression and statement resolution for one unit.
//!
//! A [`Resolver`] walks the nodes of a single unit (function body,
//! signature, record, or module-level statement) and fills a
//! `NodeId -> ResolvedExpression` map. Anything outside the unit is reached
//! through queries on the [`Context`], never by resolving it inline.

mod calls;
mod expr;
mod ops;

pub(crate) use calls::{CallActual, CallSite};

use crate::results::ResolvedExpression;
use crate::signature::{FormalSource, TypedSignature, UntypedSignature};
use crate::stack::ensure_sufficient_stack;
use crate::{Context, QueryResult};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{Name, NodeId, NodeKind, SyntaxTree};
use kestrel_types::{QualifiedType, TypeId};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The record a field type or default is being resolved for.
pub(crate) struct RecordEnv {
    /// The record type with the substitutions known so far.
    pub ty: TypeId,
    /// Fields resolved so far.
    pub fields: FxHashMap<NodeId, QualifiedType>,
}

/// What is bound while resolving a unit.
#[derive(Default)]
pub(crate) struct Env {
    /// Variables declared under this node resolve through the local map.
    pub unit: Option<NodeId>,
    /// Enclosing function declaration.
    pub func: Option<NodeId>,
    pub formals: Vec<(FormalSource, QualifiedType)>,
    pub record: Option<RecordEnv>,
}

impl Env {
    pub fn bind(&mut self, source: FormalSource, qt: QualifiedType) {
        match self.formals.iter_mut().find(|(s, _)| *s == source) {
            Some(slot) => slot.1 = qt,
            None => self.formals.push((source, qt)),
        }
    }

    pub fn formal(&self, source: FormalSource) -> Option<QualifiedType> {
        self.formals
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, qt)| *qt)
    }

    /// Qualified type of `this`, inside a method.
    pub fn receiver(&self) -> Option<QualifiedType> {
        self.formal(FormalSource::This)
    }
}

pub(crate) struct Resolver<'cx> {
    pub(crate) cx: &'cx Context,
    tree: Arc<SyntaxTree>,
    pub(crate) env: Env,
    pub(crate) exprs: FxHashMap<NodeId, ResolvedExpression>,
    pub(crate) returns: Vec<(NodeId, QualifiedType)>,
}

impl<'cx> Resolver<'cx> {
    pub(crate) fn new(cx: &'cx Context, module: Name, env: Env) -> QueryResult<Self> {
        Ok(Resolver {
            cx,
            tree: cx.tree(module)?,
            env,
            exprs: FxHashMap::default(),
            returns: Vec::new(),
        })
    }

    /// Resolver for the formals, return type and defaults of `sig`; the
    /// caller binds formals as it types them.
    pub(crate) fn for_signature(cx: &'cx Context, sig: &UntypedSignature) -> QueryResult<Self> {
        let env = Env {
            unit: Some(sig.decl),
            func: Some(sig.decl),
            ..Env::default()
        };
        Self::new(cx, sig.decl.module, env)
    }

    /// Resolver for the body and `where` clause of a typed signature.
    pub(crate) fn for_body(cx: &'cx Context, sig: &TypedSignature) -> QueryResult<Self> {
        let mut resolver = Self::for_signature(cx, &sig.untyped)?;
        for formal in &sig.formals {
            resolver.env.bind(formal.source, formal.qt);
            if let FormalSource::Node(node) = formal.source {
                resolver
                    .exprs
                    .insert(node, ResolvedExpression::new(formal.qt).with_decl(Some(node)));
            }
        }
        Ok(resolver)
    }

    /// Resolver for the members of record `decl`, seen as type `ty`.
    pub(crate) fn for_record(cx: &'cx Context, decl: NodeId, ty: TypeId) -> QueryResult<Self> {
        let env = Env {
            record: Some(RecordEnv {
                ty,
                fields: FxHashMap::default(),
            }),
            ..Env::default()
        };
        Self::new(cx, decl.module, env)
    }

    /// Resolver for one module-level statement.
    pub(crate) fn for_unit(cx: &'cx Context, stmt: NodeId) -> QueryResult<Self> {
        let env = Env {
            unit: Some(stmt),
            ..Env::default()
        };
        Self::new(cx, stmt.module, env)
    }

    pub(crate) fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub(crate) fn kind(&self, node: NodeId) -> QueryResult<&NodeKind> {
        self.tree
            .kind(node)
            .ok_or(crate::ResolveError::malformed(node, "node is not in this module"))
    }

    pub(crate) fn report(&self, node: NodeId, diag: Diagnostic) {
        self.cx.report_at(node, diag);
    }

    /// Resolve an expression, recording the result for `node`.
    pub(crate) fn resolve_expr(&mut self, node: NodeId) -> QueryResult<QualifiedType> {
        let resolved = ensure_sufficient_stack(|| self.resolve_expr_inner(node))?;
        let qt = resolved.qt;
        self.exprs.insert(node, resolved);
        Ok(qt)
    }

    /// Resolve a statement of a block or module.
    pub(crate) fn resolve_stmt(&mut self, stmt: NodeId) -> QueryResult<QualifiedType> {
        match self.kind(stmt)?.clone() {
            NodeKind::Variable(_) => {
                let qt = self.resolve_var(stmt)?;
                self.exprs
                    .insert(stmt, ResolvedExpression::new(qt).with_decl(Some(stmt)));
                Ok(qt)
            }
            NodeKind::Block { stmts } => {
                for s in stmts {
                    self.resolve_stmt(s)?;
                }
                self.exprs.insert(stmt, ResolvedExpression::new(QualifiedType::VOID));
                Ok(QualifiedType::VOID)
            }
            NodeKind::Return { value } => {
                let qt = match value {
                    Some(value) => self.resolve_expr(value)?,
                    None => QualifiedType::VOID,
                };
                self.returns.push((stmt, qt));
                self.exprs.insert(stmt, ResolvedExpression::new(QualifiedType::VOID));
                Ok(QualifiedType::VOID)
            }
            NodeKind::Conditional {
                cond,
                then_block,
                else_block,
            } => {
                let c = self.resolve_expr(cond)?;
                match c.as_param_bool() {
                    Some(true) => {
                        self.resolve_stmt(then_block)?;
                    }
                    Some(false) => {
                        if let Some(else_block) = else_block {
                            self.resolve_stmt(else_block)?;
                        }
                    }
                    None => {
                        if !c.is_erroneous() && c.ty != TypeId::BOOL {
                            self.report(
                                cond,
                                Diagnostic::error(ErrorCode::E2002).with_message(format!(
                                    "condition has type `{}`, expected `bool`",
                                    self.cx.display_type(c.ty)
                                )),
                            );
                        }
                        self.resolve_stmt(then_block)?;
                        if let Some(else_block) = else_block {
                            self.resolve_stmt(else_block)?;
                        }
                    }
                }
                self.exprs.insert(stmt, ResolvedExpression::new(QualifiedType::VOID));
                Ok(QualifiedType::VOID)
            }
            // Nested declarations are their own units.
            NodeKind::Function(_) | NodeKind::Record(_) | NodeKind::Use { .. } => {
                Ok(QualifiedType::VOID)
            }
            _ => self.resolve_expr(stmt),
        }
    }

    /// Resolve `expr` where a type is required.
    pub(crate) fn resolve_type_expr(&mut self, expr: NodeId) -> QueryResult<TypeId> {
        let qt = self.resolve_expr(expr)?;
        if qt.is_erroneous() {
            return Ok(TypeId::ERRONEOUS);
        }
        if !qt.is_type() {
            self.report(
                expr,
                Diagnostic::error(ErrorCode::E2003).with_message("expression does not name a type"),
            );
            return Ok(TypeId::ERRONEOUS);
        }
        Ok(qt.ty)
    }

    /// Whether `decl` is a local of the unit being resolved.
    pub(crate) fn is_local(&self, decl: NodeId) -> bool {
        self.env
            .unit
            .is_some_and(|unit| decl.module == unit.module && self.tree.is_within(decl, unit))
    }

    /// Qualified type already recorded for `node`.
    pub(crate) fn recorded(&self, node: NodeId) -> Option<QualifiedType> {
        self.exprs.get(&node).map(|e| e.qt)
    }
}
