//! Overload resolution.
//!
//! Candidates arrive grouped in levels (inner scopes before outer ones,
//! primary methods before secondary before tertiary). The first level with
//! an applicable candidate decides the call; later levels are never
//! consulted once one applies.
//!
//! Applicability is checked twice: against the generic signature, to bind
//! actuals and reject obvious mismatches cheaply, and then against the
//! signature instantiated for the actuals, whose `where` clause must hold.

use crate::resolver::{CallActual, CallSite};
use crate::signature::{formal_genericity, SigId, TypedFormal, WhereOutcome};
use crate::{Context, QueryResult};
use kestrel_ir::NodeId;
use kestrel_types::{PassKind, QualKind, QualifiedType, TypeId, TypeInterner};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use tracing::trace;

/// How one actual reached its formal in an applicable candidate.
#[derive(Copy, Clone, Debug)]
struct ArgMatch {
    /// Formal type after instantiation.
    formal: TypeId,
    /// The formal was concrete before instantiation.
    concrete: bool,
    pass: PassKind,
}

/// A candidate that accepts the call.
#[derive(Clone, Debug)]
pub(crate) struct Applicable {
    pub sig: SigId,
    /// The function is not generic at all.
    generic_concrete: bool,
    receiver: Option<ArgMatch>,
    /// Parallel to the call site's actuals.
    args: Vec<ArgMatch>,
}

#[derive(Clone, Debug)]
pub(crate) enum Selection {
    Unique(Applicable),
    Ambiguous(Vec<SigId>),
    NoMatch,
}

/// Select the most specific applicable candidate of the first level that
/// has one.
pub(crate) fn resolve(
    cx: &Context,
    site: &CallSite,
    levels: &[Vec<NodeId>],
) -> QueryResult<Selection> {
    let mut seen = FxHashSet::default();
    for level in levels {
        let mut applicable = Vec::new();
        for &func in level {
            if !seen.insert(func) {
                continue;
            }
            if let Some(candidate) = check_candidate(cx, site, func)? {
                applicable.push(candidate);
            }
        }
        if !applicable.is_empty() {
            trace!(applicable = applicable.len(), "candidate level applies");
            return Ok(most_specific(&cx.types, applicable));
        }
    }
    Ok(Selection::NoMatch)
}

/// Bind the site's actuals to the formals of `func`: `bound[i]` is the
/// index into `[receiver, actuals...]` feeding formal `i`.
fn bind(
    cx: &Context,
    site: &CallSite,
    func: NodeId,
) -> QueryResult<Option<(Vec<Option<usize>>, Option<CallActual>)>> {
    let untyped = cx.untyped_signature(func)?;
    if untyped.is_parenless() != site.parenless {
        return Ok(None);
    }

    let receiver = if untyped.is_method() {
        let Some(receiver) = site.receiver.or(site.implicit_receiver) else {
            return Ok(None);
        };
        if untyped.is_type_method() != receiver.qt.is_type() {
            return Ok(None);
        }
        Some(receiver)
    } else {
        if site.receiver.is_some() {
            return Ok(None);
        }
        None
    };

    let mut bound: Vec<Option<usize>> = vec![None; untyped.formals.len()];
    let first = usize::from(receiver.is_some());
    if receiver.is_some() {
        bound[0] = Some(0);
    }

    // Named actuals first, then positional ones fill the gaps in order.
    for (index, actual) in site.actuals.iter().enumerate() {
        let Some(name) = actual.name else {
            continue;
        };
        match untyped.formal_index(name) {
            Some(formal) if formal >= first && bound[formal].is_none() => {
                bound[formal] = Some(index + 1);
            }
            _ => return Ok(None),
        }
    }
    let mut next = first;
    for (index, actual) in site.actuals.iter().enumerate() {
        if actual.name.is_some() {
            continue;
        }
        while next < bound.len() && bound[next].is_some() {
            next += 1;
        }
        if next == bound.len() {
            return Ok(None);
        }
        bound[next] = Some(index + 1);
    }

    let complete = untyped
        .formals
        .iter()
        .zip(&bound)
        .all(|(formal, actual)| actual.is_some() || formal.default.is_some());
    Ok(complete.then_some((bound, receiver)))
}

fn check_candidate(
    cx: &Context,
    site: &CallSite,
    func: NodeId,
) -> QueryResult<Option<Applicable>> {
    let Some((bound, receiver)) = bind(cx, site, func)? else {
        return Ok(None);
    };
    let actual = |slot: usize| -> Option<CallActual> {
        if slot == 0 {
            receiver
        } else {
            site.actuals.get(slot - 1).copied()
        }
    };

    let generic = cx.signature(cx.generic_sig_id(func))?;
    for (formal, slot) in generic.formals.iter().zip(&bound) {
        if let Some(a) = slot.and_then(actual) {
            if check_pass(&cx.types, formal, &a.qt).is_none() {
                return Ok(None);
            }
        }
    }

    let sig = if generic.is_concrete() {
        generic.clone()
    } else {
        let mut subs = Vec::new();
        for ((index, formal), slot) in (0u32..).zip(&generic.formals).zip(&bound) {
            if formal_genericity(&cx.types, &formal.qt).is_concrete() {
                continue;
            }
            if let Some(a) = slot.and_then(actual) {
                subs.push((index, sub_for(&cx.types, formal, &a.qt)));
            }
        }
        let instance = cx.signature(cx.sig_id(func, subs, true))?;
        if !instance.is_concrete() {
            return Ok(None);
        }
        instance
    };

    let mut receiver_match = None;
    let mut args: Vec<Option<ArgMatch>> = vec![None; site.actuals.len()];
    for ((formal, generic_formal), slot) in sig.formals.iter().zip(&generic.formals).zip(&bound) {
        let Some(slot) = *slot else {
            continue;
        };
        let Some(a) = actual(slot) else {
            continue;
        };
        let Some(pass) = check_pass(&cx.types, formal, &a.qt) else {
            return Ok(None);
        };
        let matched = ArgMatch {
            formal: formal.qt.ty,
            concrete: formal_genericity(&cx.types, &generic_formal.qt).is_concrete(),
            pass,
        };
        if slot == 0 {
            receiver_match = Some(matched);
        } else {
            args[slot - 1] = Some(matched);
        }
    }
    let Some(args) = args.into_iter().collect::<Option<Vec<_>>>() else {
        return Ok(None);
    };

    if cx.where_clause(sig.id)? != WhereOutcome::Satisfied {
        return Ok(None);
    }
    Ok(Some(Applicable {
        sig: sig.id,
        generic_concrete: generic.is_concrete(),
        receiver: receiver_match,
        args,
    }))
}

/// How `actual` passes to `formal`, or `None` if it cannot.
pub(crate) fn check_pass(
    types: &TypeInterner,
    formal: &TypedFormal,
    actual: &QualifiedType,
) -> Option<PassKind> {
    let expected = formal.qt;
    if expected.is_erroneous() {
        return None;
    }
    match expected.kind {
        QualKind::Type => {
            if !actual.is_type() {
                return None;
            }
            if actual.ty == expected.ty {
                Some(PassKind::Exact)
            } else if types.instantiates(actual.ty, expected.ty) {
                Some(PassKind::Instantiates)
            } else {
                types
                    .ancestors(actual.ty)
                    .into_iter()
                    .any(|p| p == expected.ty || types.instantiates(p, expected.ty))
                    .then_some(PassKind::Subtype)
            }
        }
        QualKind::Param => {
            if !actual.is_param() {
                return None;
            }
            if expected.param.is_some() {
                return (expected.param == actual.param).then_some(PassKind::Exact);
            }
            types.pass_kind(actual, expected.ty)
        }
        QualKind::Ref => {
            if !actual.kind.is_mutable_lvalue() {
                return None;
            }
            types.pass_kind(actual, expected.ty).filter(|pass| {
                matches!(
                    pass,
                    PassKind::Exact | PassKind::Instantiates | PassKind::Subtype
                )
            })
        }
        _ => {
            if !actual.kind.is_value() {
                return None;
            }
            types.pass_kind(actual, expected.ty)
        }
    }
}

/// Substitution for generic `formal` given the actual passed to it.
fn sub_for(types: &TypeInterner, formal: &TypedFormal, actual: &QualifiedType) -> QualifiedType {
    let expected = formal.qt;
    match expected.kind {
        QualKind::Type => QualifiedType::type_(actual.ty),
        QualKind::Param => {
            let ty = if expected.ty == TypeId::ANY {
                actual.ty
            } else {
                expected.ty
            };
            QualifiedType { ty, ..*actual }
        }
        kind => {
            // A subclass actual instantiates the generic parent it passes as.
            let ty = if expected.ty == TypeId::ANY || types.instantiates(actual.ty, expected.ty) {
                actual.ty
            } else {
                types
                    .ancestors(actual.ty)
                    .into_iter()
                    .find(|p| types.instantiates(*p, expected.ty))
                    .unwrap_or(actual.ty)
            };
            QualifiedType::new(kind, ty)
        }
    }
}

/// Which of two matches for the same actual is more specific.
fn compare_arg(types: &TypeInterner, a: &ArgMatch, b: &ArgMatch) -> Ordering {
    match (a.pass.is_exact(), b.pass.is_exact()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    match (a.concrete, b.concrete) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    if types.is_narrower(a.formal, b.formal) {
        Ordering::Greater
    } else if types.is_narrower(b.formal, a.formal) {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Whether `a` is strictly more specific than `b`.
fn dominates(types: &TypeInterner, a: &Applicable, b: &Applicable) -> bool {
    let receivers = match (&a.receiver, &b.receiver) {
        (Some(ra), Some(rb)) => Some((ra, rb)),
        _ => None,
    };
    let mut better = false;
    let mut worse = false;
    for (x, y) in receivers.into_iter().chain(a.args.iter().zip(&b.args)) {
        match compare_arg(types, x, y) {
            Ordering::Greater => better = true,
            Ordering::Less => worse = true,
            Ordering::Equal => {}
        }
    }
    match (better, worse) {
        (true, false) => true,
        (false, false) => a.generic_concrete && !b.generic_concrete,
        _ => false,
    }
}

fn most_specific(types: &TypeInterner, mut applicable: Vec<Applicable>) -> Selection {
    if applicable.len() == 1 {
        return applicable
            .pop()
            .map_or(Selection::NoMatch, Selection::Unique);
    }
    let winners: Vec<usize> = (0..applicable.len())
        .filter(|&i| {
            applicable
                .iter()
                .enumerate()
                .all(|(j, other)| i == j || dominates(types, &applicable[i], other))
        })
        .collect();
    match winners.as_slice() {
        [only] => Selection::Unique(applicable.swap_remove(*only)),
        _ => Selection::Ambiguous(applicable.iter().map(|a| a.sig).collect()),
    }
}
