//! Module-level statements, `use`, symbol types and diagnostics.

use super::Program;
use crate::ResolveError;
use kestrel_ir::build::{
    call, const_, dot, ident, int, module, op, param, proc, real, record, ret, string, type_,
    use_, var,
};
use kestrel_ir::{stmts, Op};
use kestrel_types::{ParamValue, QualKind, QualifiedType, TypeId};
use pretty_assertions::assert_eq;

#[test]
fn module_declarations_have_their_storage_kind() {
    let p = Program::new(module(
        "M",
        stmts![
            var("a").init(int(1)),
            const_("b").ty(ident("real")).init(int(2)),
            param("c").init(op(Op::Add, stmts![int(3), int(4)])),
            type_("T").init(ident("int")),
        ],
    ));
    p.cx.resolve_module(p.module()).unwrap();

    assert_eq!(
        p.global_type("a"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    assert_eq!(
        p.global_type("b"),
        QualifiedType::new(QualKind::ConstVar, TypeId::REAL)
    );
    assert_eq!(
        p.global_type("c"),
        QualifiedType::param(TypeId::INT, ParamValue::Int(7))
    );
    assert_eq!(p.global_type("T"), QualifiedType::type_(TypeId::INT));
    p.assert_no_errors();
}

#[test]
fn module_statements_resolve_independently() {
    let p = Program::new(module(
        "M",
        stmts![
            var("bad").ty(ident("int")).init(string("oops")),
            var("good").init(real(1.5)),
        ],
    ));

    // Asking for one variable does not resolve its neighbours.
    assert_eq!(
        p.global_type("good"),
        QualifiedType::new(QualKind::Var, TypeId::REAL)
    );
    p.assert_no_errors();

    p.cx.resolve_module(p.module()).unwrap();
    assert_eq!(p.error_names(), vec!["TypeMismatch"]);
}

#[test]
fn used_modules_contribute_functions_and_variables() {
    let p = Program::with_modules(vec![
        module(
            "User",
            stmts![
                use_("Lib"),
                proc("test").body(stmts![
                    var("h").init(call(ident("helper"), stmts![int(1)])),
                    var("s").init(dot(ident("Lib"), "shared")),
                ]),
            ],
        ),
        module(
            "Lib",
            stmts![
                var("shared").init(real(0.5)),
                proc("helper")
                    .arg("x", ident("int"))
                    .returns(ident("int"))
                    .body(stmts![ret(ident("x"))]),
            ],
        ),
    ]);
    let test = p.func("test");

    p.cx.resolve_module(p.module()).unwrap();
    assert_eq!(
        p.local_type(test, "h"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    assert_eq!(
        p.local_type(test, "s"),
        QualifiedType::new(QualKind::Var, TypeId::REAL)
    );
    p.assert_no_errors();
}

#[test]
fn using_an_unloaded_module_is_reported() {
    let p = Program::new(module("M", stmts![use_("Nowhere"), var("x").init(int(1))]));

    p.cx.resolve_module(p.module()).unwrap();
    assert_eq!(p.error_names(), vec!["UnknownModule"]);
    assert_eq!(
        p.global_type("x"),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
}

#[test]
fn function_symbols_have_function_types() {
    let p = Program::new(module(
        "M",
        stmts![
            proc("square")
                .arg("x", ident("int"))
                .returns(ident("int"))
                .body(stmts![ret(op(Op::Mul, stmts![ident("x"), ident("x")]))]),
            proc("inferred")
                .arg("x", ident("int"))
                .body(stmts![ret(ident("x"))]),
        ],
    ));

    let square = p.cx.type_for_symbol(p.func("square")).unwrap();
    assert_eq!(square.kind, QualKind::Function);
    assert_eq!(p.display(square), "proc(int): int");

    // Without a declared return type the body is not consulted.
    let inferred = p.cx.type_for_symbol(p.func("inferred")).unwrap();
    assert_eq!(p.display(inferred), "proc(int): <unknown>");
    p.assert_no_errors();
}

#[test]
fn record_symbols_and_fields() {
    let p = Program::new(module(
        "M",
        stmts![record(
            "R",
            stmts![var("a").ty(ident("int")), const_("b").init(real(2.5))]
        )],
    ));
    let record = p.tree().module_stmts()[0];

    let ty = p.cx.type_for_symbol(record).unwrap();
    assert!(ty.is_type());
    assert_eq!(p.display(ty), "R");
    assert_eq!(
        p.cx.type_for_symbol(p.var_in(record, "a")).unwrap(),
        QualifiedType::new(QualKind::Var, TypeId::INT)
    );
    assert_eq!(
        p.cx.type_for_symbol(p.var_in(record, "b")).unwrap(),
        QualifiedType::new(QualKind::ConstVar, TypeId::REAL)
    );
    p.assert_no_errors();
}

#[test]
fn unknown_identifiers_are_reported_once() {
    let p = Program::new(module(
        "M",
        stmts![var("u").init(ident("nothing"))],
    ));

    p.cx.resolve_module(p.module()).unwrap();
    p.cx.resolve_module(p.module()).unwrap();
    assert!(p.global_type("u").is_erroneous());
    assert_eq!(p.error_names(), vec!["UnknownIdentifier"]);
}

#[test]
fn unknown_fields_are_reported() {
    let p = Program::new(module(
        "M",
        stmts![
            record("R", stmts![var("a").ty(ident("int"))]),
            proc("test").body(stmts![
                var("r").ty(ident("R")),
                var("z").init(dot(ident("r"), "missing")),
            ]),
        ],
    ));
    p.resolve(p.func("test"));
    assert_eq!(p.error_names(), vec!["UnknownField"]);
}

#[test]
fn self_recursive_inference_is_an_error() {
    let p = Program::new(module(
        "M",
        stmts![proc("r").body(stmts![ret(call(ident("r"), stmts![]))])],
    ));

    let err = p.cx.resolve_concrete_function(p.func("r"), &[]).unwrap_err();
    assert!(
        matches!(err, ResolveError::RecursionDetected { .. }),
        "unexpected error: {err}"
    );
    assert_eq!(p.error_names(), vec!["RecursionDetected"]);
}

#[test]
fn failed_requests_report_once() {
    let p = Program::new(module(
        "M",
        stmts![proc("r").body(stmts![ret(call(ident("r"), stmts![]))])],
    ));
    let r = p.func("r");

    for _ in 0..3 {
        assert!(p.cx.resolve_concrete_function(r, &[]).is_err());
    }
    assert_eq!(p.error_names(), vec!["RecursionDetected"]);
}

#[test]
fn unrepresentable_constants_are_reported() {
    let p = Program::new(module(
        "M",
        stmts![
            param("quotient").init(op(Op::Div, stmts![int(1), int(0)])),
            param("product").init(op(Op::Mul, stmts![int(i64::MAX), int(2)])),
            param("fine").init(op(Op::Mul, stmts![int(i64::MAX), int(1)])),
        ],
    ));
    p.cx.resolve_module(p.module()).unwrap();

    assert!(p.global_type("quotient").is_erroneous());
    assert!(p.global_type("product").is_erroneous());
    assert_eq!(
        p.global_type("fine"),
        QualifiedType::param(TypeId::INT, ParamValue::Int(i64::MAX))
    );
    assert_eq!(p.error_names(), vec!["InvalidConstant", "InvalidConstant"]);
    let mut messages: Vec<String> = p.errors().into_iter().map(|d| d.message).collect();
    messages.sort();
    assert_eq!(
        messages,
        vec![
            "constant expression with `*` overflows `int`",
            "division by zero in a constant expression",
        ]
    );
}
