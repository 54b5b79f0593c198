//! Salsa queries.
//!
//! Resolution runs on a fresh [`Context`] per query execution; Salsa
//! decides when that happens. The context only sees the module and the
//! modules it `use`s, so the query depends on exactly those inputs.

use crate::db::Db;
use crate::input::SourceModule;
use crate::report::{FunctionReport, ReportedAction, ResolutionReport};
use kestrel_ir::{FnFlags, Name, NodeId, NodeKind, SyntaxTree};
use kestrel_resolve::Context;
use kestrel_types::QualifiedType;
use rustc_hash::FxHashSet;
use tracing::debug;


/// Resolve every module-level statement and every non-generic function
/// body of `module`.
///
/// # Caching Behavior
///
/// - Depends on the trees of `module` and its transitive `use`s
/// - After `module.set_tree()`: re-resolves on next call
/// - Editing an unrelated module leaves the cached report in place
#[salsa::tracked]
pub fn resolution_report(db: &dyn Db, module: SourceModule) -> ResolutionReport {
    let cx = Context::with_interner(db.interner().clone());
    load_with_uses(db, &cx, module);

    let name = module.name(db);
    let tree = module.tree(db);
    let mut report = ResolutionReport::default();

    // Failures surface as session diagnostics; nothing else to do here.
    let _ = cx.resolve_module(name);

    let funcs = concrete_functions(&cx, tree);
    debug!(module = db.interner().lookup(name), funcs = funcs.len(), "resolving bodies");
    for (&decl, result) in funcs.iter().zip(cx.resolve_functions(&funcs)) {
        let Ok(resolved) = result else { continue };
        report.functions.push(FunctionReport {
            name: function_name(db, tree, decl),
            decl,
            actions: resolved.actions.iter().map(ReportedAction::from).collect(),
        });
    }

    for &stmt in tree.module_stmts() {
        if let Some(NodeKind::Variable(var)) = tree.kind(stmt) {
            if let Ok(qt) = cx.type_for_symbol(stmt) {
                let rendered = render_qt(&cx, &qt);
                report
                    .variables
                    .push((db.interner().lookup(var.name).to_owned(), rendered));
            }
        }
    }

    report.collect_diagnostics(&cx);
    report
}

/// Load `root` and every module reachable through `use` into `cx`.
///
/// Unloaded targets are skipped; resolving the `use` reports them.
fn load_with_uses(db: &dyn Db, cx: &Context, root: SourceModule) {
    let mut seen = FxHashSet::default();
    let mut pending = vec![root];
    while let Some(module) = pending.pop() {
        if !seen.insert(module.name(db)) {
            continue;
        }
        let tree = module.tree(db);
        for used in uses(tree) {
            if let Some(dep) = db.module(used) {
                pending.push(dep);
            }
        }
        cx.set_module(tree.clone());
    }
}

fn uses(tree: &SyntaxTree) -> impl Iterator<Item = Name> + '_ {
    tree.module_stmts().iter().filter_map(|&stmt| match tree.kind(stmt) {
        Some(NodeKind::Use { module }) => Some(*module),
        _ => None,
    })
}

/// Functions with a body whose signature needs no substitution.
fn concrete_functions(cx: &Context, tree: &SyntaxTree) -> Vec<NodeId> {
    tree.iter()
        .filter(|(_, node)| {
            node.kind
                .as_function()
                .is_some_and(|f| f.body.is_some() && !f.flags.contains(FnFlags::EXTERN))
        })
        .map(|(id, _)| id)
        .filter(|&id| cx.generic_signature(id).is_ok_and(|sig| sig.is_concrete()))
        .collect()
}

/// `name` for free functions, `Record.name` for methods.
fn function_name(db: &dyn Db, tree: &SyntaxTree, decl: NodeId) -> String {
    let strings = db.interner();
    let Some(func) = tree.kind(decl).and_then(NodeKind::as_function) else {
        return String::new();
    };
    let name = strings.lookup(func.name);
    let receiver = func
        .receiver
        .and_then(|r| match tree.kind(r) {
            Some(NodeKind::Identifier { name }) => Some(*name),
            _ => None,
        })
        .or_else(|| match tree.parent(decl).and_then(|p| tree.kind(p)) {
            Some(NodeKind::Record(record)) => Some(record.name),
            _ => None,
        });
    match receiver {
        Some(record) => format!("{}.{name}", strings.lookup(record)),
        None => name.to_owned(),
    }
}

fn render_qt(cx: &Context, qt: &QualifiedType) -> String {
    let ty = cx.display_type(qt.ty);
    match qt.param {
        Some(value) => format!("{:?} {ty} = {}", qt.kind, value.display(&**cx.interner())),
        None => format!("{:?} {ty}", qt.kind),
    }
}
