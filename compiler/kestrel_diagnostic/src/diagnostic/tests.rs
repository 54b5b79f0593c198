use super::*;
use kestrel_ir::StringInterner;
use pretty_assertions::assert_eq;

#[test]
fn builder_sets_every_field() {
    let interner = StringInterner::new();
    let node = NodeId::new(interner.intern("M"), 4);
    let diag = Diagnostic::error(ErrorCode::E3002)
        .with_message("ambiguous call to `foo`")
        .at(node, Span::new(10, 16))
        .with_note("candidates: foo(int), foo(real)");

    assert_eq!(diag.code, ErrorCode::E3002);
    assert_eq!(diag.code_name(), "AmbiguousCall");
    assert_eq!(diag.node, Some(node));
    assert_eq!(diag.span, Span::new(10, 16));
    assert_eq!(diag.notes.len(), 1);
    assert!(diag.is_error());
}

#[test]
fn warnings_are_not_errors() {
    let diag = Diagnostic::warning(ErrorCode::E2007).with_message("odd return");
    assert!(!diag.is_error());
    assert_eq!(diag.node, None);
}

#[test]
fn display_includes_code_and_notes() {
    let diag = Diagnostic::error(ErrorCode::E3001)
        .with_message("no matching candidates for `bar`")
        .with_note("1 candidate rejected");

    let text = diag.to_string();
    assert!(text.starts_with("error[E3001]: no matching candidates for `bar`"));
    assert!(text.contains("= note: 1 candidate rejected"));
}
