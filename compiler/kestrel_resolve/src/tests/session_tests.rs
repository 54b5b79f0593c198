//! Caching across requests, invalidation by `set_module`, and parallel
//! resolution.

use super::Program;
use crate::results::ActionKind;
use crate::{Context, ResolverConfig};
use kestrel_ir::build::{ident, int, module, op, proc, real, record, var, ModuleSyn, Syn};
use kestrel_ir::{stmts, NodeId, Op};
use kestrel_types::{QualKind, QualifiedType, TypeId};
use pretty_assertions::assert_eq;

fn counter(init: Syn) -> ModuleSyn {
    module(
        "M",
        stmts![proc("test").body(stmts![
            var("x").init(init),
            var("y").init(op(Op::Add, stmts![ident("x"), int(1)])),
        ])],
    )
}

#[test]
fn repeated_requests_hit_the_cache() {
    let p = Program::new(counter(int(1)));
    let test = p.func("test");

    let first = p.resolve(test);
    let executed = p.cx.executions();
    assert!(executed > 0);

    let second = p.resolve(test);
    assert_eq!(p.cx.executions(), executed);
    assert_eq!(first, second);
}

#[test]
fn reloading_an_equal_tree_keeps_caches() {
    let p = Program::new(counter(int(1)));
    let test = p.func("test");
    p.resolve(test);
    let executed = p.cx.executions();

    p.cx.set_module(p.tree().clone());
    p.resolve(test);
    assert_eq!(p.cx.executions(), executed);
}

#[test]
fn replacing_a_tree_recomputes_its_readers() {
    let p = Program::new(counter(int(1)));
    let test = p.func("test");
    assert_eq!(
        p.local_type(test, "y"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    let executed = p.cx.executions();

    // Same shape, so node ids carry over to the new tree.
    let edited = counter(real(1.0)).lower(p.cx.interner()).unwrap();
    p.cx.set_module(edited);

    assert_eq!(
        p.local_type(test, "y"),
        QualifiedType::new(QualKind::Var, TypeId::REAL)
    );
    assert!(p.cx.executions() > executed);
    p.assert_no_errors();
}

#[test]
fn editing_an_unrelated_module_keeps_caches() {
    let p = Program::with_modules(vec![
        counter(int(1)),
        module("Other", stmts![var("z").init(int(3))]),
    ]);
    let test = p.func("test");
    p.resolve(test);
    let executed = p.cx.executions();

    let edited = module("Other", stmts![var("z").init(real(3.0))])
        .lower(p.cx.interner())
        .unwrap();
    p.cx.set_module(edited);

    p.resolve(test);
    assert_eq!(p.cx.executions(), executed);
}

fn workload() -> ModuleSyn {
    module(
        "M",
        stmts![
            record("P", stmts![var("a").ty(ident("int"))]),
            proc("one").body(stmts![
                var("p").ty(ident("P")),
                var("q").ty(ident("P")).init(ident("p")),
                ident("p"),
            ]),
            proc("two").body(stmts![var("r").ty(ident("P")), ident("r")]),
            proc("three").body(stmts![
                var("n").init(int(1)),
                var("m").init(op(Op::Mul, stmts![ident("n"), int(2)])),
            ]),
            proc("four").body(stmts![var("s").ty(ident("P"))]),
        ],
    )
}

/// Top-level functions of `p`, in declaration order.
fn bodies(p: &Program) -> Vec<NodeId> {
    p.tree()
        .module_stmts()
        .iter()
        .copied()
        .filter(|&id| p.tree().kind(id).and_then(|k| k.as_function()).is_some())
        .collect()
}

/// Actions per function, with nodes reduced to their index in the tree.
fn action_summary(p: &Program, funcs: &[NodeId]) -> Vec<Vec<(ActionKind, u32, Option<u32>)>> {
    p.cx.resolve_functions(funcs)
        .into_iter()
        .map(|result| {
            result
                .unwrap()
                .actions
                .iter()
                .map(|a| (a.kind, a.at.index, a.acted_on.map(|n| n.index)))
                .collect()
        })
        .collect()
}

#[test]
fn parallel_resolution_matches_sequential() {
    let sequential = Program::new(workload());
    let parallel = Program::in_context(
        Context::new().with_config(ResolverConfig::default().with_parallel(true)),
        vec![workload()],
    );
    assert!(parallel.cx.config().parallel);

    let seq_funcs = bodies(&sequential);
    let par_funcs = bodies(&parallel);
    assert_eq!(seq_funcs.len(), 4);

    assert_eq!(
        action_summary(&parallel, &par_funcs),
        action_summary(&sequential, &seq_funcs)
    );
    sequential.assert_no_errors();
    parallel.assert_no_errors();
}

#[test]
fn concurrent_requests_for_one_function_agree() {
    let p = Program::in_context(
        Context::new().with_config(ResolverConfig::default().with_parallel(true)),
        vec![workload()],
    );
    let one = p.func("one");

    let results = p.cx.resolve_functions(&[one; 8]);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert_eq!(result.as_ref().unwrap(), first);
    }
    assert_eq!(first.actions.len(), 4);
}
