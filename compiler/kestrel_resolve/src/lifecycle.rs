//! Which function performs a record lifecycle action.
//!
//! Records get a compiler-generated default initializer, copy initializer,
//! assignment and deinitializer unless the user declares one. Initializing
//! from a value of another type always needs a user `init=`.

use crate::methods::{MethodCandidatesKey, ReceiverTarget};
use crate::overload::{self, Selection};
use crate::query::QueryKey;
use crate::resolver::{CallActual, CallSite};
use crate::results::ActionKind;
use crate::signature::SigId;
use crate::{Context, QueryResult};
use kestrel_ir::{Intent, Name, NodeId, NodeKind};
use kestrel_types::{QualKind, QualifiedType, TypeId};
use tracing::debug;

/// One lifecycle question: who performs `kind` on a value of `ty`, with an
/// `other` type for `InitOther`/`Assign`, as seen from module `site`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LifecycleKey {
    pub kind: ActionKind,
    pub ty: TypeId,
    pub other: Option<TypeId>,
    pub site: Name,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LifecycleFn {
    /// A user function, and the intent of its source formal if it has one.
    User { sig: SigId, other_intent: Intent },
    /// Compiler generated.
    Generated,
    /// Nothing can perform the action.
    Missing,
}

impl LifecycleFn {
    pub fn sig(self) -> Option<SigId> {
        match self {
            LifecycleFn::User { sig, .. } => Some(sig),
            _ => None,
        }
    }

    pub fn is_missing(self) -> bool {
        self == LifecycleFn::Missing
    }
}

impl Context {
    pub(crate) fn lifecycle(&self, key: LifecycleKey) -> QueryResult<LifecycleFn> {
        self.engine.memo(
            self,
            &self.tables.lifecycle,
            key,
            QueryKey::Lifecycle(key),
            |cx| compute_lifecycle(cx, key),
        )
    }
}

fn compute_lifecycle(cx: &Context, key: LifecycleKey) -> QueryResult<LifecycleFn> {
    let ReceiverTarget::Record(decl) = cx.receiver_target(key.ty) else {
        return Ok(LifecycleFn::Generated);
    };
    let value = |kind: QualKind, ty: TypeId| CallActual {
        name: None,
        qt: QualifiedType::new(kind, ty),
        node: None,
    };
    let methods = |name: Name| {
        cx.method_candidates(MethodCandidatesKey {
            target: ReceiverTarget::Record(decl),
            name,
            site: key.site,
        })
    };
    let names = &cx.names;
    let other = key.other.unwrap_or(key.ty);

    let found = match key.kind {
        ActionKind::DefaultInit | ActionKind::Deinit => {
            let name = if key.kind == ActionKind::Deinit {
                names.deinit
            } else {
                names.init
            };
            let levels = methods(name)?;
            if levels.is_empty() {
                LifecycleFn::Generated
            } else {
                let site = CallSite {
                    node: decl,
                    receiver: Some(value(QualKind::Var, key.ty)),
                    implicit_receiver: None,
                    actuals: Vec::new(),
                    parenless: false,
                };
                user_or(cx, &site, &levels, LifecycleFn::Missing)?
            }
        }
        ActionKind::CopyInit | ActionKind::InitOther => {
            let levels = methods(names.init_eq)?;
            let site = CallSite {
                node: decl,
                receiver: Some(value(QualKind::Var, key.ty)),
                implicit_receiver: None,
                actuals: vec![value(QualKind::ConstVar, other)],
                parenless: false,
            };
            let fallback = if key.kind == ActionKind::CopyInit {
                LifecycleFn::Generated
            } else {
                LifecycleFn::Missing
            };
            user_or(cx, &site, &levels, fallback)?
        }
        ActionKind::Assign => {
            let mut levels: Vec<Vec<NodeId>> = methods(names.assign)?.as_ref().clone();
            let free = module_operators(cx, key.site, names.assign)?;
            if !free.is_empty() {
                levels.push(free);
            }
            let site = CallSite {
                node: decl,
                receiver: None,
                implicit_receiver: None,
                actuals: vec![value(QualKind::Var, key.ty), value(QualKind::ConstVar, other)],
                parenless: false,
            };
            let fallback = if other == key.ty {
                LifecycleFn::Generated
            } else {
                LifecycleFn::Missing
            };
            user_or(cx, &site, &levels, fallback)?
        }
    };
    debug!(
        action = %key.kind,
        ty = %cx.display_type(key.ty),
        ?found,
        "lifecycle function"
    );
    Ok(found)
}

/// The unique applicable user function, or `fallback`.
fn user_or(
    cx: &Context,
    site: &CallSite,
    levels: &[Vec<NodeId>],
    fallback: LifecycleFn,
) -> QueryResult<LifecycleFn> {
    if levels.is_empty() {
        return Ok(fallback);
    }
    let Selection::Unique(best) = overload::resolve(cx, site, levels)? else {
        return Ok(fallback);
    };
    // Source formal of `init=` follows `this`; of an operator, the lhs.
    let sig = cx.signature(best.sig)?;
    let other_intent = sig.formals.get(1).map_or(Intent::Default, |f| f.intent);
    Ok(LifecycleFn::User {
        sig: best.sig,
        other_intent,
    })
}

/// Module-level operator functions named `name` in `module`.
fn module_operators(cx: &Context, module: Name, name: Name) -> QueryResult<Vec<NodeId>> {
    let Some(tree) = cx.loaded(module) else {
        return Ok(Vec::new());
    };
    let decls = cx.scope_decls(tree.root())?;
    Ok(decls
        .get(name)
        .iter()
        .copied()
        .filter(|&d| matches!(tree.kind(d), Some(NodeKind::Function(_))))
        .collect())
}
