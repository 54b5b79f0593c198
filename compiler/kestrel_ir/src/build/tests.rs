use super::*;
use pretty_assertions::assert_eq;

fn kinds(tree: &SyntaxTree) -> Vec<&'static str> {
    tree.iter().map(|(_, node)| node.kind.tag()).collect()
}

#[test]
fn lowers_in_postorder_with_children_in_source_order() {
    let interner = StringInterner::new();
    let tree = module(
        "M",
        stmts![proc("test").body(stmts![var("x").ty(ident("R")).init(call(ident("makeR"), vec![]))])],
    )
    .lower(&interner)
    .unwrap();

    assert_eq!(
        kinds(&tree),
        vec![
            "identifier",
            "identifier",
            "call",
            "variable",
            "block",
            "function",
            "module"
        ]
    );
    assert_eq!(tree.root(), NodeId::new(tree.module(), 6));
}

#[test]
fn parent_links_point_at_enclosing_node() {
    let interner = StringInterner::new();
    let tree = module("M", stmts![record("R", stmts![var("a").ty(ident("int"))])])
        .lower(&interner)
        .unwrap();

    let field = tree
        .iter()
        .find(|(_, n)| matches!(n.kind, NodeKind::Variable(_)))
        .map(|(id, _)| id)
        .unwrap();
    let record = tree.parent(field).unwrap();
    assert!(matches!(tree.kind(record), Some(NodeKind::Record(_))));
    assert_eq!(tree.parent(record), Some(tree.root()));
    assert_eq!(tree.ancestors(field).count(), 2);
    assert!(tree.is_within(field, tree.root()));
}

#[test]
fn named_actuals_keep_their_names() {
    let interner = StringInterner::new();
    let tree = module(
        "M",
        stmts![call(ident("f"), vec![int(1), named("y", boolean(true))])],
    )
    .lower(&interner)
    .unwrap();

    let Some(NodeKind::Call { actuals, .. }) = tree.module_stmts().first().and_then(|&s| tree.kind(s))
    else {
        panic!("expected a call statement");
    };
    assert_eq!(actuals[0].name, None);
    assert_eq!(actuals[1].name, Some(interner.intern("y")));
}

#[test]
fn subtree_covers_exactly_the_descendants() {
    let interner = StringInterner::new();
    let tree = module(
        "M",
        stmts![
            var("a").init(int(1)),
            var("b").init(op(Op::Add, vec![ident("a"), int(2)]))
        ],
    )
    .lower(&interner)
    .unwrap();

    let b = tree.module_stmts()[1];
    let nodes: Vec<_> = tree.subtree(b).map(|id| tree.kind(id).map(NodeKind::tag)).collect();
    assert_eq!(
        nodes,
        vec![
            Some("identifier"),
            Some("literal"),
            Some("op"),
            Some("variable")
        ]
    );
}

#[test]
fn functions_without_body_are_extern() {
    let interner = StringInterner::new();
    let tree = module(
        "M",
        stmts![
            proc("ext").arg("x", ident("int")),
            proc("def").parenless().body(vec![])
        ],
    )
    .lower(&interner)
    .unwrap();

    let flags: Vec<FnFlags> = tree
        .module_stmts()
        .iter()
        .filter_map(|&s| tree.kind(s).and_then(NodeKind::as_function))
        .map(|f| f.flags)
        .collect();
    assert_eq!(flags, vec![FnFlags::EXTERN, FnFlags::PARENLESS]);
}
