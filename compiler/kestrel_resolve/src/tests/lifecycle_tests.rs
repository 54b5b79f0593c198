//! Lifecycle actions of function bodies.

use super::Program;
use crate::results::ActionKind::{Assign, CopyInit, DefaultInit, Deinit, InitOther};
use kestrel_ir::build::{
    assign, block, call, formal, ident, int, module, new_, operator, proc, record, ret, var,
    FormalSyn, ModuleSyn, Syn,
};
use kestrel_ir::{stmts, Intent, Op};
use pretty_assertions::assert_eq;

/// Record `R` with user `init`, `deinit`, `init=` taking `init_other`,
/// assignment from `R`, and `makeR()`.
fn r_decls(init_other: FormalSyn) -> Vec<Syn> {
    stmts![
        record("R", stmts![]),
        proc("init").receiver(ident("R")).body(stmts![]),
        proc("init=")
            .receiver(ident("R"))
            .formal(init_other)
            .body(stmts![]),
        proc("deinit").receiver(ident("R")).body(stmts![]),
        operator(Op::Assign)
            .formal(formal("lhs").intent(Intent::Ref).ty(ident("R")))
            .arg("rhs", ident("R"))
            .body(stmts![]),
        proc("makeR").body(stmts![ret(new_(ident("R"), vec![]))]),
    ]
}

/// Record `U` with its own lifecycle functions and `makeU()`.
fn u_decls() -> Vec<Syn> {
    stmts![
        record("U", stmts![]),
        proc("init").receiver(ident("U")).body(stmts![]),
        proc("init=")
            .receiver(ident("U"))
            .arg("other", ident("U"))
            .body(stmts![]),
        proc("deinit").receiver(ident("U")).body(stmts![]),
        proc("makeU").body(stmts![ret(new_(ident("U"), vec![]))]),
    ]
}

fn program(mut decls: Vec<Syn>, body: Vec<Syn>) -> Program {
    decls.push(proc("test").body(body).into());
    let m: ModuleSyn = module("M", decls);
    Program::new(m)
}

/// `R` copies from `R`.
fn same_type(body: Vec<Syn>) -> Program {
    program(r_decls(formal("other").ty(ident("R"))), body)
}

/// `R` initializes from `int`.
fn from_int(body: Vec<Syn>) -> Program {
    program(r_decls(formal("other").ty(ident("int"))), body)
}

/// `R` initializes from `U`, taking the source with `intent`.
fn from_u(intent: Intent, body: Vec<Syn>) -> Program {
    let mut decls = r_decls(formal("other").intent(intent).ty(ident("U")));
    decls.extend(u_decls());
    program(decls, body)
}

fn make_r() -> Syn {
    call(ident("makeR"), vec![])
}

fn make_u() -> Syn {
    call(ident("makeU"), vec![])
}

#[test]
fn default_initialized_local_is_destroyed_at_block_end() {
    let p = same_type(stmts![var("x").ty(ident("R"))]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));

    assert_eq!(
        p.actions(test),
        vec![(DefaultInit, x, None), (Deinit, body, Some(x))]
    );
    p.assert_no_errors();
}

#[test]
fn split_initialization_follows_assignment_order() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        assign(ident("y"), make_r()),
        assign(ident("x"), make_r()),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![(Deinit, body, Some(x)), (Deinit, body, Some(y))]
    );
    p.assert_no_errors();
}

#[test]
fn split_initialization_in_declaration_order() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        assign(ident("x"), make_r()),
        assign(ident("y"), make_r()),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![(Deinit, body, Some(y)), (Deinit, body, Some(x))]
    );
}

#[test]
fn split_initialization_in_nested_block_destroys_in_declaring_block() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        block(stmts![
            assign(ident("x"), make_r()),
            assign(ident("y"), make_r()),
        ]),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![(Deinit, body, Some(y)), (Deinit, body, Some(x))]
    );
}

#[test]
fn mention_before_assignment_prevents_split_init() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        ident("x"),
        assign(ident("x"), ident("y")),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));
    let eq = p.assigns(body)[0];

    assert_eq!(
        p.actions(test),
        vec![
            (DefaultInit, x, None),
            (DefaultInit, y, None),
            (Assign, eq, None),
            (Deinit, body, Some(y)),
            (Deinit, body, Some(x)),
        ]
    );
    let resolved = p.resolve(test);
    let assign_action = resolved.by_node(eq).unwrap().actions[0];
    assert_eq!(
        assign_action.callee.map(|sig| p.cx.signature(sig).unwrap().decl()),
        Some(p.func("="))
    );
}

#[test]
fn split_init_copies_a_source_mentioned_later() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        assign(ident("x"), ident("y")),
        ident("y"),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));
    let eq = p.assigns(body)[0];

    assert_eq!(
        p.actions(test),
        vec![
            (DefaultInit, y, None),
            (CopyInit, eq, None),
            (Deinit, body, Some(x)),
            (Deinit, body, Some(y)),
        ]
    );
}

#[test]
fn split_init_moves_from_a_last_mention() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        assign(ident("x"), ident("y")),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![(DefaultInit, y, None), (Deinit, body, Some(x))]
    );
}

#[test]
fn split_init_moves_from_a_last_mention_in_nested_block() {
    let p = same_type(stmts![
        var("x").ty(ident("R")),
        var("y").ty(ident("R")),
        block(stmts![assign(ident("x"), ident("y"))]),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![(DefaultInit, y, None), (Deinit, body, Some(x))]
    );
}

#[test]
fn initializing_from_a_temporary_takes_it_over() {
    let p = same_type(stmts![var("x").ty(ident("R")).init(make_r())]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));

    assert_eq!(p.actions(test), vec![(Deinit, body, Some(x))]);
}

#[test]
fn initializing_from_a_live_local_copies() {
    let p = same_type(stmts![
        var("x").ty(ident("R")).init(make_r()),
        var("y").ty(ident("R")).init(ident("x")),
        ident("x"),
    ]);
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![
            (CopyInit, y, None),
            (Deinit, body, Some(y)),
            (Deinit, body, Some(x)),
        ]
    );
}

#[test]
fn initializing_from_a_last_mention_moves() {
    let p = same_type(stmts![
        var("x").ty(ident("R")).init(make_r()),
        var("y").ty(ident("R")).init(ident("x")),
    ]);
    let test = p.func("test");
    let (body, y) = (p.body(test), p.var_in(test, "y"));

    assert_eq!(p.actions(test), vec![(Deinit, body, Some(y))]);
}

#[test]
fn init_from_other_type_literal() {
    let p = from_int(stmts![var("x").ty(ident("R")).init(int(4))]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));

    assert_eq!(
        p.actions(test),
        vec![(InitOther, x, None), (Deinit, body, Some(x))]
    );
    p.assert_no_errors();
}

#[test]
fn split_init_from_other_type_literal() {
    let p = from_int(stmts![var("x").ty(ident("R")), assign(ident("x"), int(4))]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));
    let eq = p.assigns(body)[0];

    assert_eq!(
        p.actions(test),
        vec![(InitOther, eq, None), (Deinit, body, Some(x))]
    );
}

#[test]
fn init_from_other_type_variable() {
    let p = from_int(stmts![
        var("i").init(int(4)),
        var("x").ty(ident("R")).init(ident("i")),
    ]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));

    assert_eq!(
        p.actions(test),
        vec![(InitOther, x, None), (Deinit, body, Some(x))]
    );
}

#[test]
fn init_from_other_record_temporary_destroys_it_with_the_variable() {
    let p = from_u(Intent::Default, stmts![var("x").ty(ident("R")).init(make_u())]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));
    let temp = p.calls(body, "makeU")[0];

    assert_eq!(
        p.actions(test),
        vec![
            (InitOther, x, None),
            (Deinit, body, Some(temp)),
            (Deinit, body, Some(x)),
        ]
    );
    p.assert_no_errors();
}

#[test]
fn split_init_from_other_record_variable() {
    let p = from_u(
        Intent::Default,
        stmts![
            var("x").ty(ident("R")),
            var("y").ty(ident("U")),
            assign(ident("x"), ident("y")),
        ],
    );
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));
    let eq = p.assigns(body)[0];

    assert_eq!(
        p.actions(test),
        vec![
            (DefaultInit, y, None),
            (InitOther, eq, None),
            (Deinit, body, Some(x)),
            (Deinit, body, Some(y)),
        ]
    );
}

#[test]
fn split_init_from_other_record_temporary_destroys_it_at_the_statement() {
    let p = from_u(
        Intent::Default,
        stmts![var("x").ty(ident("R")), assign(ident("x"), make_u())],
    );
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));
    let eq = p.assigns(body)[0];
    let temp = p.calls(body, "makeU")[0];

    assert_eq!(
        p.actions(test),
        vec![
            (InitOther, eq, None),
            (Deinit, eq, Some(temp)),
            (Deinit, body, Some(x)),
        ]
    );
}

#[test]
fn in_intent_consumes_a_temporary() {
    let p = from_u(Intent::In, stmts![var("x").ty(ident("R")).init(make_u())]);
    let test = p.func("test");
    let (body, x) = (p.body(test), p.var_in(test, "x"));

    assert_eq!(
        p.actions(test),
        vec![(InitOther, x, None), (Deinit, body, Some(x))]
    );
}

#[test]
fn in_intent_moves_a_last_mention() {
    let p = from_u(
        Intent::In,
        stmts![
            var("y").ty(ident("U")),
            var("x").ty(ident("R")).init(ident("y")),
        ],
    );
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));

    assert_eq!(
        p.actions(test),
        vec![
            (DefaultInit, y, None),
            (InitOther, x, None),
            (Deinit, body, Some(x)),
        ]
    );
}

#[test]
fn in_intent_copies_a_live_local() {
    let p = from_u(
        Intent::In,
        stmts![
            var("y").ty(ident("U")),
            var("x").ty(ident("R")).init(ident("y")),
            ident("y"),
        ],
    );
    let test = p.func("test");
    let (body, x, y) = (p.body(test), p.var_in(test, "x"), p.var_in(test, "y"));
    let copied = p.idents(x, "y")[0];

    assert_eq!(
        p.actions(test),
        vec![
            (DefaultInit, y, None),
            (CopyInit, x, None),
            (InitOther, x, None),
            (Deinit, body, Some(copied)),
            (Deinit, body, Some(x)),
            (Deinit, body, Some(y)),
        ]
    );
}

#[test]
fn init_eq_overloads_split_by_source_type() {
    let mut decls = r_decls(formal("other").ty(ident("R")));
    decls.push(
        proc("init=")
            .receiver(ident("R"))
            .arg("other", ident("U"))
            .body(stmts![])
            .into(),
    );
    decls.extend(u_decls());
    let p = program(
        decls,
        stmts![
            var("x").ty(ident("R")).init(make_u()),
            var("y").ty(ident("R")).init(ident("x")),
            ident("x"),
        ],
    );
    let test = p.func("test");
    let (x, y) = (p.var_in(test, "x"), p.var_in(test, "y"));
    let decls = p.tree().module_stmts();
    let (from_r, from_u) = (decls[2], decls[6]);

    let resolved = p.resolve(test);
    let inits: Vec<_> = resolved
        .actions
        .iter()
        .filter(|a| a.kind != Deinit)
        .map(|a| {
            let callee = a.callee.map(|sig| p.cx.signature(sig).unwrap().decl());
            (a.kind, a.at, callee)
        })
        .collect();
    assert_eq!(
        inits,
        vec![(InitOther, x, Some(from_u)), (CopyInit, y, Some(from_r))]
    );
    p.assert_no_errors();
}

#[test]
fn missing_init_other_is_reported() {
    // `R` only converts from `int`.
    let mut decls = r_decls(formal("other").ty(ident("int")));
    decls.extend(u_decls());
    let p = program(decls, stmts![var("x").ty(ident("R")).init(make_u())]);
    let test = p.func("test");

    let resolved = p.resolve(test);
    let init_other = resolved
        .actions
        .iter()
        .find(|a| a.kind == InitOther)
        .unwrap();
    assert!(init_other.erroneous);
    assert_eq!(init_other.callee, None);
    assert_eq!(p.error_names(), vec!["MissingLifecycleFunction"]);
}

#[test]
fn records_without_user_functions_get_generated_actions() {
    let p = Program::new(module(
        "M",
        stmts![
            record("P", stmts![var("a").ty(ident("int"))]),
            proc("test").body(stmts![
                var("p").ty(ident("P")),
                var("q").ty(ident("P")).init(ident("p")),
                ident("p"),
            ]),
        ],
    ));
    let test = p.func("test");
    let (body, pv, q) = (p.body(test), p.var_in(test, "p"), p.var_in(test, "q"));

    let resolved = p.resolve(test);
    assert_eq!(
        p.actions(test),
        vec![
            (DefaultInit, pv, None),
            (CopyInit, q, None),
            (Deinit, body, Some(q)),
            (Deinit, body, Some(pv)),
        ]
    );
    assert!(resolved.actions.iter().all(|a| a.callee.is_none() && !a.erroneous));
    p.assert_no_errors();
}
