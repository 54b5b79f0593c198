//! Generic functions and records, defaults, `where` clauses and params.

use super::Program;
use crate::ResolveError;
use kestrel_ir::build::{
    boolean, call, dot, formal, ident, int, method, module, not, op, param, proc, real, record,
    ret, string, type_, var,
};
use kestrel_ir::{stmts, Intent, Op, ReturnIntent};
use kestrel_types::{ParamValue, QualKind, QualifiedType, TypeId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn identity_program() -> Program {
    Program::new(module(
        "M",
        stmts![
            proc("id")
                .formal(formal("x"))
                .body(stmts![ret(ident("x"))]),
            proc("test").body(stmts![
                var("a").init(call(ident("id"), stmts![int(3)])),
                var("b").init(call(ident("id"), stmts![real(2.5)])),
                var("c").init(call(ident("id"), stmts![int(4)])),
            ]),
        ],
    ))
}

#[test]
fn generic_functions_instantiate_per_actual_type() {
    let p = identity_program();
    let test = p.func("test");

    assert_eq!(
        p.local_type(test, "a"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    assert_eq!(
        p.local_type(test, "b"),
        QualifiedType::new(QualKind::Var, TypeId::REAL)
    );
    p.assert_no_errors();
}

#[test]
fn equal_instantiations_share_a_signature() {
    let p = identity_program();
    let test = p.func("test");
    let resolved = p.resolve(test);
    let sig_of = |site| resolved.by_node(site).and_then(|e| e.most_specific());

    let sites = p.calls(p.body(test), "id");
    assert_eq!(sites.len(), 3);
    assert_eq!(sig_of(sites[0]), sig_of(sites[2]));
    assert_ne!(sig_of(sites[0]), sig_of(sites[1]));
}

#[test]
fn explicit_substitutions_resolve_a_generic_body() {
    let p = identity_program();
    let id = p.func("id");
    let int_ref = QualifiedType::new(QualKind::ConstRef, TypeId::INT);

    let resolved = p
        .cx
        .resolve_concrete_function(id, &[(p.name("x"), int_ref)])
        .unwrap();
    assert!(!resolved.erroneous);
    let returned: Vec<_> = resolved.returns.iter().map(|&(_, qt)| qt).collect();
    assert_eq!(returned, vec![int_ref]);

    // Same instantiation the call `id(3)` picked.
    let test = p.func("test");
    let site = p.calls(p.body(test), "id")[0];
    let from_call = p.resolve(test).by_node(site).and_then(|e| e.most_specific());
    assert_eq!(Some(resolved.sig), from_call);
    p.assert_no_errors();
}

#[test]
fn generic_body_without_substitutions_is_erroneous() {
    let p = identity_program();
    let resolved = p.resolve(p.func("id"));

    assert!(resolved.erroneous);
    assert!(resolved.actions.is_empty());
    assert_eq!(p.error_names(), vec!["UnresolvedGeneric"]);
}

#[test]
fn substituting_an_unknown_formal_fails() {
    let p = identity_program();
    let id = p.func("id");
    let bogus = p.name("nope");

    let err = p
        .cx
        .resolve_concrete_function(id, &[(bogus, QualifiedType::type_(TypeId::INT))])
        .unwrap_err();
    assert_eq!(
        err,
        ResolveError::UnknownFormal {
            func: id,
            name: bogus
        }
    );
    assert_eq!(p.error_names(), vec!["MalformedTree"]);
}

#[test]
fn generic_records_instantiate_their_fields() {
    let p = Program::new(module(
        "M",
        stmts![
            record("Box", stmts![type_("T"), var("item").ty(ident("T"))]),
            proc("test").body(stmts![
                var("b").ty(call(ident("Box"), stmts![ident("int")])),
                var("i").init(dot(ident("b"), "item")),
            ]),
        ],
    ));
    let test = p.func("test");

    let b = p.local_type(test, "b");
    assert_eq!(b.kind, QualKind::Var);
    assert_eq!(p.display(b), "Box(int)");
    assert_eq!(
        p.local_type(test, "i"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    p.assert_no_errors();
}

#[test]
fn type_field_defaults_fill_open_formals() {
    let p = Program::new(module(
        "M",
        stmts![
            record(
                "Vec2",
                stmts![
                    type_("T").init(ident("real")),
                    var("x").ty(ident("T")),
                    var("y").ty(ident("T")),
                ]
            ),
            proc("test").body(stmts![
                var("v").ty(ident("Vec2")),
                var("x").init(dot(ident("v"), "x")),
            ]),
        ],
    ));
    let test = p.func("test");

    assert_eq!(p.display(p.local_type(test, "v")), "Vec2(real)");
    assert_eq!(
        p.local_type(test, "x"),
        QualifiedType::new(QualKind::Var, TypeId::REAL)
    );
    p.assert_no_errors();
}

#[test]
fn where_clauses_choose_between_param_overloads() {
    let n = || formal("n").intent(Intent::Param).ty(ident("int"));
    let p = Program::new(module(
        "M",
        stmts![
            proc("pick")
                .formal(n())
                .where_(op(Op::Gt, stmts![ident("n"), int(0)]))
                .body(stmts![ret(int(1))]),
            proc("pick")
                .formal(n())
                .where_(op(Op::Le, stmts![ident("n"), int(0)]))
                .body(stmts![ret(string("non-positive"))]),
            proc("test").body(stmts![
                var("pos").init(call(ident("pick"), stmts![int(5)])),
                var("neg").init(call(ident("pick"), stmts![int(-5)])),
            ]),
        ],
    ));
    let test = p.func("test");
    let [pos, neg] = [0, 1].map(|i| p.calls(p.body(test), "pick")[i]);
    let picks = p.funcs("pick");

    assert_eq!(p.callee(test, pos), Some(picks[0]));
    assert_eq!(p.callee(test, neg), Some(picks[1]));
    assert_eq!(
        p.local_type(test, "pos"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    assert_eq!(
        p.local_type(test, "neg"),
        QualifiedType::new(QualKind::Var, TypeId::STRING)
    );
    p.assert_no_errors();
}

#[test]
fn where_clause_must_be_a_param_bool() {
    let p = Program::new(module(
        "M",
        stmts![
            proc("f")
                .arg("x", ident("int"))
                .where_(op(Op::Gt, stmts![ident("x"), int(0)]))
                .body(stmts![]),
            proc("test").body(stmts![call(ident("f"), stmts![int(1)])]),
        ],
    ));
    p.resolve(p.func("test"));

    let mut names = p.error_names();
    names.sort_unstable();
    assert_eq!(names, vec!["NoMatchingCandidates", "NonParamWhereClause"]);
}

#[test]
fn signatures_see_sibling_members_through_the_receiver() {
    let hello = || stmts![ret(string("hello"))];
    let is_set = || call(ident("isSet"), stmts![]);
    let p = Program::new(module(
        "M",
        stmts![
            record(
                "R",
                stmts![
                    param("flag").ty(ident("bool")),
                    proc("isSet")
                        .ret_intent(ReturnIntent::Param)
                        .body(stmts![ret(ident("flag"))]),
                    proc("withDefault")
                        .formal(formal("arg").default(is_set()))
                        .body(hello()),
                    proc("withDefaultField")
                        .formal(formal("arg").default(ident("flag")))
                        .body(hello()),
                    proc("whereMethod").where_(is_set()).body(hello()),
                    proc("whereMethod")
                        .where_(not(is_set()))
                        .body(stmts![ret(int(5))]),
                    proc("whereField").where_(ident("flag")).body(hello()),
                    proc("whereField")
                        .where_(not(ident("flag")))
                        .body(stmts![ret(int(5))]),
                ]
            ),
            proc("test").body(stmts![
                var("t").ty(call(ident("R"), stmts![boolean(true)])),
                var("f").ty(call(ident("R"), stmts![boolean(false)])),
                var("d").init(method(ident("f"), "withDefault", vec![])),
                var("df").init(method(ident("f"), "withDefaultField", vec![])),
                var("mt").init(method(ident("t"), "whereMethod", vec![])),
                var("mf").init(method(ident("f"), "whereMethod", vec![])),
                var("ft").init(method(ident("t"), "whereField", vec![])),
                var("ff").init(method(ident("f"), "whereField", vec![])),
            ]),
        ],
    ));
    let test = p.func("test");
    let string_var = QualifiedType::new(QualKind::Var, TypeId::STRING);
    let int_var = QualifiedType::new(QualKind::Var, TypeId::INT);

    assert_eq!(p.display(p.local_type(test, "t")), "R(true)");
    for (local, expected) in [
        ("d", string_var),
        ("df", string_var),
        ("mt", string_var),
        ("mf", int_var),
        ("ft", string_var),
        ("ff", int_var),
    ] {
        assert_eq!(p.local_type(test, local), expected, "type of {local}");
    }
    p.assert_no_errors();
}

fn param_successor(lit: i64) -> Program {
    Program::new(module(
        "M",
        stmts![
            proc("succ")
                .formal(formal("n").intent(Intent::Param).ty(ident("int")))
                .ret_intent(ReturnIntent::Param)
                .body(stmts![ret(op(Op::Add, stmts![ident("n"), int(1)]))]),
            param("v").init(call(ident("succ"), stmts![int(lit)])),
        ],
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn param_functions_fold_at_compile_time(lit in -1000i64..1000) {
        let p = param_successor(lit);
        let qt = p.global_type("v");
        prop_assert_eq!(qt.kind, QualKind::Param);
        prop_assert_eq!(qt.ty, TypeId::INT);
        prop_assert_eq!(qt.param, Some(ParamValue::Int(lit + 1)));
        prop_assert!(p.errors().is_empty());
    }
}
