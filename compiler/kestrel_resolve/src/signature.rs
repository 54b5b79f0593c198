//! Function signatures, untyped and typed.
//!
//! A signature is identified by the function declaration plus the generic
//! substitutions it was instantiated with. The pair is interned to a
//! [`SigId`], so the same instantiation requested from two call sites is
//! the same signature and shares every downstream query.

use crate::methods::ReceiverTarget;
use crate::query::QueryKey;
use crate::resolver::Resolver;
use crate::scope::{self, Binding};
use crate::{Context, QueryResult, ResolveError};
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{FnFlags, Intent, Name, NodeId, NodeKind, ReturnIntent};
use kestrel_types::{Genericity, QualKind, QualifiedType, TypeId, TypeInterner};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Interned signature identity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SigId(u32);

impl SigId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        SigId(raw)
    }
}

/// Function plus the substitutions (by formal position) it is instantiated
/// with.
///
/// `instantiated` distinguishes the generic signature (`false`) from an
/// instantiation that substituted nothing explicitly but fills defaulted
/// generic formals.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SigKey {
    pub func: NodeId,
    pub subs: Vec<(u32, QualifiedType)>,
    pub instantiated: bool,
}

#[derive(Default)]
struct SigTable {
    ids: FxHashMap<SigKey, SigId>,
    keys: Vec<SigKey>,
}

/// Session-wide `SigKey <-> SigId` table.
#[derive(Default)]
pub(crate) struct SigInterner {
    table: RwLock<SigTable>,
}

impl SigInterner {
    pub(crate) fn intern(&self, key: SigKey) -> SigId {
        if let Some(&id) = self.table.read().ids.get(&key) {
            return id;
        }
        let mut table = self.table.write();
        if let Some(&id) = table.ids.get(&key) {
            return id;
        }
        let id = SigId(u32::try_from(table.keys.len()).unwrap_or(u32::MAX));
        table.keys.push(key.clone());
        table.ids.insert(key, id);
        id
    }

    pub(crate) fn key(&self, id: SigId) -> Option<SigKey> {
        self.table.read().keys.get(id.0 as usize).cloned()
    }
}

/// Where a formal comes from: the implicit receiver or a `Formal` node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FormalSource {
    This,
    Node(NodeId),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UntypedFormal {
    pub name: Name,
    pub source: FormalSource,
    pub intent: Intent,
    pub type_expr: Option<NodeId>,
    pub default: Option<NodeId>,
}

/// How a function is attached to a type.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Receiver {
    None,
    /// Declared inside the record body.
    Primary { record: NodeId },
    /// `proc R.name()` outside the record body.
    Secondary {
        type_expr: NodeId,
        target: ReceiverTarget,
    },
}

/// Signature shape before any type expression is resolved.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UntypedSignature {
    pub decl: NodeId,
    pub name: Name,
    pub flags: FnFlags,
    pub receiver: Receiver,
    /// Formals in order; methods start with the implicit `this`.
    pub formals: Vec<UntypedFormal>,
    pub return_intent: ReturnIntent,
    pub return_type: Option<NodeId>,
    pub where_clause: Option<NodeId>,
    pub body: Option<NodeId>,
}

impl UntypedSignature {
    /// Methods receive `this`; operators never do.
    pub fn is_method(&self) -> bool {
        self.receiver != Receiver::None && !self.flags.contains(FnFlags::OPERATOR)
    }

    pub fn is_operator(&self) -> bool {
        self.flags.contains(FnFlags::OPERATOR)
    }

    pub fn is_parenless(&self) -> bool {
        self.flags.contains(FnFlags::PARENLESS)
    }

    pub fn is_type_method(&self) -> bool {
        self.flags.contains(FnFlags::TYPE_METHOD)
    }

    /// Record whose members are visible through `this`, if known.
    pub fn receiver_record(&self) -> Option<NodeId> {
        match self.receiver {
            Receiver::Primary { record }
            | Receiver::Secondary {
                target: ReceiverTarget::Record(record),
                ..
            } => Some(record),
            _ => None,
        }
    }

    pub fn formal_index(&self, name: Name) -> Option<usize> {
        self.formals.iter().position(|f| f.name == name)
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TypedFormal {
    pub name: Name,
    pub source: FormalSource,
    pub intent: Intent,
    pub qt: QualifiedType,
    pub default: Option<NodeId>,
}

/// Signature with every formal's qualified type resolved.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TypedSignature {
    pub id: SigId,
    pub untyped: Arc<UntypedSignature>,
    pub formals: Vec<TypedFormal>,
    pub genericity: Genericity,
    pub instantiated: bool,
}

impl TypedSignature {
    pub fn decl(&self) -> NodeId {
        self.untyped.decl
    }

    pub fn name(&self) -> Name {
        self.untyped.name
    }

    pub fn is_concrete(&self) -> bool {
        self.genericity.is_concrete()
    }

    pub fn formal(&self, name: Name) -> Option<&TypedFormal> {
        self.formals.iter().find(|f| f.name == name)
    }

    pub fn this_formal(&self) -> Option<&TypedFormal> {
        self.formals
            .first()
            .filter(|f| f.source == FormalSource::This)
    }
}

/// Outcome of evaluating a `where` clause.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum WhereOutcome {
    Satisfied,
    Unsatisfied,
    /// The clause is not a compile-time boolean.
    NotParam,
}

/// Genericity of a single formal's qualified type.
pub(crate) fn formal_genericity(types: &TypeInterner, qt: &QualifiedType) -> Genericity {
    match qt.kind {
        QualKind::Param if qt.param.is_none() => Genericity::Generic,
        _ => types.genericity(qt.ty),
    }
}

impl Context {
    pub(crate) fn sig_id(
        &self,
        func: NodeId,
        subs: Vec<(u32, QualifiedType)>,
        instantiated: bool,
    ) -> SigId {
        self.sigs.intern(SigKey {
            func,
            subs,
            instantiated,
        })
    }

    /// Signature of `func` before any substitution.
    pub(crate) fn generic_sig_id(&self, func: NodeId) -> SigId {
        self.sig_id(func, Vec::new(), false)
    }

    pub(crate) fn sig_key(&self, id: SigId) -> QueryResult<SigKey> {
        self.sigs.key(id).ok_or(ResolveError::UnknownSignature(id))
    }

    pub(crate) fn untyped_signature(&self, func: NodeId) -> QueryResult<Arc<UntypedSignature>> {
        self.engine.memo(
            self,
            &self.tables.untyped_signature,
            func,
            QueryKey::UntypedSignature(func),
            |cx| compute_untyped(cx, func).map(Arc::new),
        )
    }

    /// Typed signature for an interned signature id.
    pub fn signature(&self, id: SigId) -> QueryResult<Arc<TypedSignature>> {
        self.engine.memo(
            self,
            &self.tables.signature,
            id,
            QueryKey::Signature(id),
            |cx| compute_signature(cx, id).map(Arc::new),
        )
    }

    pub(crate) fn where_clause(&self, id: SigId) -> QueryResult<WhereOutcome> {
        self.engine.memo(
            self,
            &self.tables.where_clause,
            id,
            QueryKey::WhereClause(id),
            |cx| compute_where(cx, id),
        )
    }
}

fn compute_untyped(cx: &Context, func: NodeId) -> QueryResult<UntypedSignature> {
    let tree = cx.tree(func.module)?;
    let Some(NodeKind::Function(decl)) = tree.kind(func) else {
        return Err(ResolveError::malformed(func, "expected a function declaration"));
    };

    let receiver = match decl.receiver {
        Some(type_expr) => Receiver::Secondary {
            type_expr,
            target: receiver_target(cx, type_expr)?,
        },
        None => match tree.parent(func).and_then(|p| tree.kind(p).map(|k| (p, k))) {
            Some((record, NodeKind::Record(_))) => Receiver::Primary { record },
            _ => Receiver::None,
        },
    };

    let mut formals = Vec::with_capacity(decl.formals.len() + 1);
    if receiver != Receiver::None && !decl.flags.contains(FnFlags::OPERATOR) {
        let names = &cx.names;
        let intent = if decl.flags.contains(FnFlags::TYPE_METHOD) {
            Intent::Type
        } else if [names.init, names.init_eq, names.deinit].contains(&decl.name) {
            Intent::Ref
        } else {
            Intent::ConstRef
        };
        formals.push(UntypedFormal {
            name: names.this,
            source: FormalSource::This,
            intent,
            type_expr: None,
            default: None,
        });
    }
    for &formal in &decl.formals {
        let Some(f) = tree.kind(formal).and_then(NodeKind::as_formal) else {
            return Err(ResolveError::malformed(formal, "expected a formal"));
        };
        formals.push(UntypedFormal {
            name: f.name,
            source: FormalSource::Node(formal),
            intent: f.intent,
            type_expr: f.type_expr,
            default: f.default,
        });
    }

    Ok(UntypedSignature {
        decl: func,
        name: decl.name,
        flags: decl.flags,
        receiver,
        formals,
        return_intent: decl.return_intent,
        return_type: decl.return_type,
        where_clause: decl.where_clause,
        body: decl.body,
    })
}

/// Type a secondary method attaches to, judged from the head of its
/// receiver expression (`R` in both `proc R.f()` and `proc R(int).f()`).
fn receiver_target(cx: &Context, type_expr: NodeId) -> QueryResult<ReceiverTarget> {
    let tree = cx.tree(type_expr.module)?;
    let head = match tree.kind(type_expr) {
        Some(NodeKind::Identifier { name }) => *name,
        Some(NodeKind::Call { callee, .. }) => match tree.kind(*callee) {
            Some(NodeKind::Identifier { name }) => *name,
            _ => return Ok(ReceiverTarget::Unresolved),
        },
        _ => return Ok(ReceiverTarget::Unresolved),
    };
    let found = scope::lookup(cx, type_expr, head)?;
    Ok(match found.first() {
        Some(Binding::Builtin(ty)) => ReceiverTarget::Builtin(*ty),
        Some(Binding::Decl(decl)) if cx.is_record_decl(*decl)? => ReceiverTarget::Record(*decl),
        _ => ReceiverTarget::Unresolved,
    })
}

fn compute_signature(cx: &Context, id: SigId) -> QueryResult<TypedSignature> {
    let key = cx.sig_key(id)?;
    let untyped = cx.untyped_signature(key.func)?;
    debug!(func = ?key.func, subs = key.subs.len(), "typing signature");
    let mut resolver = Resolver::for_signature(cx, &untyped)?;
    let mut formals = Vec::with_capacity(untyped.formals.len());

    for (index, uf) in (0u32..).zip(&untyped.formals) {
        let declared = formal_qt(&mut resolver, &untyped, uf)?;
        // Substitutions only fill formals that are still generic once the
        // earlier formals are bound.
        let substituted = key
            .subs
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, qt)| *qt)
            .filter(|_| !formal_genericity(&cx.types, &declared).is_concrete());
        let mut qt = substituted.unwrap_or(declared);
        if key.instantiated
            && substituted.is_none()
            && !formal_genericity(&cx.types, &qt).is_concrete()
        {
            if let Some(default) = uf.default {
                qt = default_qt(&mut resolver, uf, qt, default)?;
            }
        }
        resolver.env.bind(uf.source, qt);
        formals.push(TypedFormal {
            name: uf.name,
            source: uf.source,
            intent: uf.intent,
            qt,
            default: uf.default,
        });
    }

    // An instantiated type method may be called on a generic type.
    let skip_this = key.instantiated && untyped.is_type_method();
    let genericity = formals
        .iter()
        .filter(|f| !(skip_this && f.source == FormalSource::This))
        .map(|f| formal_genericity(&cx.types, &f.qt))
        .fold(Genericity::Concrete, Genericity::join);

    Ok(TypedSignature {
        id,
        untyped,
        formals,
        genericity,
        instantiated: key.instantiated,
    })
}

/// Declared qualified type of one formal, generic where nothing constrains it.
fn formal_qt(
    resolver: &mut Resolver<'_>,
    untyped: &UntypedSignature,
    uf: &UntypedFormal,
) -> QueryResult<QualifiedType> {
    let declared = match (uf.source, uf.type_expr) {
        (FormalSource::This, _) => Some(this_type(resolver, untyped)?),
        (_, Some(expr)) => Some(resolver.resolve_type_expr(expr)?),
        (_, None) => None,
    };
    let ty = declared.unwrap_or(TypeId::ANY);
    Ok(match uf.intent {
        Intent::Type => QualifiedType::type_(ty),
        intent => QualifiedType::new(QualKind::for_intent(intent), ty),
    })
}

fn this_type(resolver: &mut Resolver<'_>, untyped: &UntypedSignature) -> QueryResult<TypeId> {
    match untyped.receiver {
        Receiver::Primary { record } => resolver.cx.record_type(record),
        Receiver::Secondary { type_expr, .. } => resolver.resolve_type_expr(type_expr),
        Receiver::None => Ok(TypeId::ERRONEOUS),
    }
}

/// Fill a generic formal from its default expression.
fn default_qt(
    resolver: &mut Resolver<'_>,
    uf: &UntypedFormal,
    generic: QualifiedType,
    default: NodeId,
) -> QueryResult<QualifiedType> {
    let value = resolver.resolve_expr(default)?;
    if value.is_erroneous() {
        return Ok(QualifiedType::ERRONEOUS);
    }
    Ok(match uf.intent {
        Intent::Type if value.is_type() => QualifiedType::type_(value.ty),
        Intent::Param if value.is_param() => value,
        Intent::Type | Intent::Param => {
            let code = if uf.intent == Intent::Type {
                ErrorCode::E2003
            } else {
                ErrorCode::E2002
            };
            resolver.report(
                default,
                Diagnostic::error(code).with_message(format!(
                    "default for `{}` is not a compile-time {}",
                    resolver.cx.interner().lookup(uf.name),
                    if uf.intent == Intent::Type { "type" } else { "value" },
                )),
            );
            QualifiedType::ERRONEOUS
        }
        _ => QualifiedType::new(generic.kind, value.ty),
    })
}

fn compute_where(cx: &Context, id: SigId) -> QueryResult<WhereOutcome> {
    let sig = cx.signature(id)?;
    let Some(clause) = sig.untyped.where_clause else {
        return Ok(WhereOutcome::Satisfied);
    };
    let mut resolver = Resolver::for_body(cx, &sig)?;
    let qt = resolver.resolve_expr(clause)?;
    Ok(match qt.as_param_bool() {
        Some(true) => WhereOutcome::Satisfied,
        Some(false) => WhereOutcome::Unsatisfied,
        None => {
            if !qt.is_erroneous() {
                resolver.report(
                    clause,
                    Diagnostic::error(ErrorCode::E3003).with_message(format!(
                        "where clause of `{}` is not a param bool",
                        cx.interner().lookup(sig.name()),
                    )),
                );
            }
            WhereOutcome::NotParam
        }
    })
}
