//! Deep copies and structural equality

use weft_core::metadata::{MetadataWrapper, ParentNodeProvider, ProviderKey, ProviderRegistry};
use weft_core::node::Node;
use weft_core::parser::parse_module;

fn all_nodes(node: &Node, out: &mut Vec<Node>) {
    out.push(node.clone());
    for child in node.children() {
        all_nodes(&child, out);
    }
}

#[test]
fn test_deep_clone_shares_no_nodes() {
    let module = parse_module("def f(a, b):\n    return f(a.x + b)\n").unwrap();
    let copy = module.deep_clone();

    assert!(copy.deep_equals(&module));
    assert_eq!(copy.code(), module.code());

    let mut original_nodes = Vec::new();
    let mut copied_nodes = Vec::new();
    all_nodes(&module, &mut original_nodes);
    all_nodes(&copy, &mut copied_nodes);
    assert_eq!(original_nodes.len(), copied_nodes.len());
    for (original, copied) in original_nodes.iter().zip(&copied_nodes) {
        assert_eq!(original.kind(), copied.kind());
        assert_ne!(original.id(), copied.id());
    }
}

#[test]
fn test_equality_is_structural_and_whitespace_sensitive() {
    let a = parse_module("x = 1\n").unwrap();
    let b = parse_module("x = 1\n").unwrap();
    let spaced = parse_module("x  = 1\n").unwrap();
    let commented = parse_module("x = 1  # one\n").unwrap();

    assert!(a.deep_equals(&b));
    assert!(!a.ptr_eq(&b));
    assert!(!a.deep_equals(&spaced));
    assert!(!a.deep_equals(&commented));
}

#[test]
fn test_equality_ignores_metadata() {
    let module = parse_module("y = g(1)\n").unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    wrapper
        .resolve(
            ProviderRegistry::builtin(),
            &[ProviderKey::of::<ParentNodeProvider>()],
        )
        .unwrap();

    assert!(wrapper.module().deep_equals(&module));
    assert!(module.deep_equals(wrapper.module()));
}
