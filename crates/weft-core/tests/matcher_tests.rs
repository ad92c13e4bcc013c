//! Matchers that consult resolved metadata

use weft_core::matchers::{MatchRule, Matcher, MatcherVisitor, Matching, findall};
use weft_core::metadata::{
    ExpressionContext, ExpressionContextProvider, MetadataWrapper, PositionProvider, ProviderKey,
    ProviderRegistry,
};
use weft_core::node::{FieldValue, Node, NodeKind};
use weft_core::parser::parse_module;
use weft_core::sentinel::Transformed;

const SOURCE: &str = "x = a.b\ndef f(p):\n    y = g(k=p)\n    return y\n";

fn name_in(context: ExpressionContext) -> Matcher {
    Matcher::all_of([
        Matcher::node(NodeKind::Name).into(),
        Matcher::metadata::<ExpressionContextProvider>(context),
    ])
}

fn codes(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(Node::code).collect()
}

#[test]
fn test_names_by_expression_context() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let resolved = wrapper
        .resolve(
            ProviderRegistry::builtin(),
            &[ProviderKey::of::<ExpressionContextProvider>()],
        )
        .unwrap();
    let matching = Matching::with_metadata(&resolved);

    let stores = matching.findall(resolved.module(), &name_in(ExpressionContext::Store));
    let loads = matching.findall(resolved.module(), &name_in(ExpressionContext::Load));
    assert_eq!(codes(&stores), vec!["x", "f", "p", "y"]);
    assert_eq!(codes(&loads), vec!["a", "g", "p", "y"]);

    // Keyword and attribute member names carry no context at all
    let any_context = Matcher::metadata_if::<ExpressionContextProvider>(|_| true);
    let without = Matcher::all_of([
        Matcher::node(NodeKind::Name).into(),
        Matcher::does_not_match(any_context),
    ]);
    assert_eq!(codes(&matching.findall(resolved.module(), &without)), vec!["b", "k"]);
}

#[test]
fn test_metadata_matchers_need_resolved_metadata() {
    let module = parse_module(SOURCE).unwrap();
    assert!(findall(&module, &name_in(ExpressionContext::Store)).is_empty());

    // Resolved for a different provider
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let resolved = wrapper
        .resolve(ProviderRegistry::builtin(), &[ProviderKey::of::<PositionProvider>()])
        .unwrap();
    let matching = Matching::with_metadata(&resolved);
    assert!(matching.findall(resolved.module(), &name_in(ExpressionContext::Store)).is_empty());
}

#[test]
fn test_position_predicate() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let resolved = wrapper
        .resolve(ProviderRegistry::builtin(), &[ProviderKey::of::<PositionProvider>()])
        .unwrap();

    let on_third_line = Matcher::all_of([
        Matcher::node(NodeKind::Name).into(),
        Matcher::metadata_if::<PositionProvider>(|range| range.start.line == 3),
    ]);
    let found = Matching::with_metadata(&resolved).findall(resolved.module(), &on_third_line);
    assert_eq!(codes(&found), vec!["y", "g", "k", "p"]);
}

#[test]
fn test_replace_only_stores() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let resolved = wrapper
        .resolve(
            ProviderRegistry::builtin(),
            &[ProviderKey::of::<ExpressionContextProvider>()],
        )
        .unwrap();

    let stored_y = Matcher::all_of([
        Matcher::name("y"),
        Matcher::metadata::<ExpressionContextProvider>(ExpressionContext::Store),
    ]);
    let replaced = Matching::with_metadata(&resolved)
        .replace(resolved.module(), &stored_y, |node, _| {
            Ok(Transformed::Keep(node.with_changes([("value", FieldValue::from("z"))])?))
        })
        .unwrap();

    let Transformed::Keep(replaced) = replaced else {
        panic!("module was not kept");
    };
    assert_eq!(
        replaced.code(),
        "x = a.b\ndef f(p):\n    z = g(k=p)\n    return y\n"
    );
}

#[test]
fn test_visitor_rules_with_metadata() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let resolved = wrapper
        .resolve(
            ProviderRegistry::builtin(),
            &[ProviderKey::of::<ExpressionContextProvider>()],
        )
        .unwrap();

    let mut bound = Vec::new();
    {
        let rule = MatchRule::new(name_in(ExpressionContext::Store))
            .inside(Matcher::node(NodeKind::FunctionDef));
        let mut visitor =
            MatcherVisitor::with_metadata(&resolved).visit_matching(rule, |node, _| bound.push(node.code()));
        resolved.module().visit(&mut visitor);
    }
    assert_eq!(bound, vec!["f", "p", "y"]);
}
