//! Provider resolution, built-in providers and dependency cycles

use std::collections::HashMap;
use weft_core::metadata::{
    CodePosition, CodeRange, ComputeContext, EnclosingFunctionProvider, ExpressionContext,
    ExpressionContextProvider, MetadataError, MetadataProvider, MetadataWrapper,
    ParentNodeProvider, PositionProvider, ProviderCache, ProviderKey, ProviderRegistry,
};
use weft_core::node::{Name, Node};
use weft_core::parser::parse_module;
use weft_core::visitor::Visitor;

const SOURCE: &str = "x = a.b\ndef f(p):\n    y = g(k=p)\n    return y\n";

#[derive(Default)]
struct Names(Vec<Node>);

impl Visitor for Names {
    fn visit_name(&mut self, node: &std::sync::Arc<Name>) -> bool {
        self.0.push(Node::Name(node.clone()));
        true
    }
}

fn names(wrapper: &MetadataWrapper) -> Vec<Node> {
    let mut collector = Names::default();
    wrapper.visit(&mut collector);
    collector.0
}

#[test]
fn test_expression_contexts() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let names = names(&wrapper);
    let resolved = wrapper
        .resolve(
            ProviderRegistry::builtin(),
            &[ProviderKey::of::<ExpressionContextProvider>()],
        )
        .unwrap();

    let contexts: Vec<(String, Option<ExpressionContext>)> = names
        .iter()
        .map(|name| {
            (
                name.code(),
                resolved
                    .get_optional::<ExpressionContextProvider>(name)
                    .copied(),
            )
        })
        .collect();

    assert_eq!(
        contexts,
        vec![
            ("x".to_string(), Some(ExpressionContext::Store)),
            ("a".to_string(), Some(ExpressionContext::Load)),
            ("b".to_string(), None),
            ("f".to_string(), Some(ExpressionContext::Store)),
            ("p".to_string(), Some(ExpressionContext::Store)),
            ("y".to_string(), Some(ExpressionContext::Store)),
            ("g".to_string(), Some(ExpressionContext::Load)),
            ("k".to_string(), None),
            ("p".to_string(), Some(ExpressionContext::Load)),
            ("y".to_string(), Some(ExpressionContext::Load)),
        ]
    );
}

#[test]
fn test_enclosing_function_and_parents() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let names = names(&wrapper);
    let resolved = wrapper
        .resolve(
            ProviderRegistry::builtin(),
            &[ProviderKey::of::<EnclosingFunctionProvider>()],
        )
        .unwrap();

    let enclosing: Vec<Option<&String>> = names
        .iter()
        .map(|name| resolved.get_optional::<EnclosingFunctionProvider>(name))
        .collect();
    let f = "f".to_string();
    assert_eq!(
        enclosing,
        vec![
            None,
            None,
            None,
            None,
            Some(&f),
            Some(&f),
            Some(&f),
            Some(&f),
            Some(&f),
            Some(&f),
        ]
    );

    // The dependency was resolved too
    let root = resolved.module().clone();
    let first_statement = root.children()[0].clone();
    let parent = resolved
        .get::<ParentNodeProvider>(&first_statement)
        .unwrap();
    assert!(parent.ptr_eq(&root));
    assert!(resolved.get_optional::<ParentNodeProvider>(&root).is_none());
}

#[test]
fn test_resolution_is_deterministic() {
    let module = parse_module(SOURCE).unwrap();
    let requested = [
        ProviderKey::of::<PositionProvider>(),
        ProviderKey::of::<EnclosingFunctionProvider>(),
        ProviderKey::of::<ExpressionContextProvider>(),
    ];
    let mut reversed = requested;
    reversed.reverse();

    let mut first = MetadataWrapper::new(&module).unwrap();
    let mut second = MetadataWrapper::new(&module).unwrap();
    let first_names = names(&first);
    let second_names = names(&second);

    let a = first.resolve(ProviderRegistry::builtin(), &requested).unwrap();
    let b = second.resolve(ProviderRegistry::builtin(), &reversed).unwrap();
    assert_eq!(a.order(), b.order());

    let ranges = |resolved: &weft_core::metadata::ResolvedMetadata<'_>, names: &[Node]| {
        names
            .iter()
            .map(|name| *resolved.get::<PositionProvider>(name).unwrap())
            .collect::<Vec<CodeRange>>()
    };
    assert_eq!(ranges(&a, &first_names), ranges(&b, &second_names));
    assert_eq!(
        ranges(&a, &first_names)[0],
        CodeRange::new(CodePosition::new(1, 0), CodePosition::new(1, 1))
    );
}

#[test]
fn test_resolve_reuses_computed_providers() {
    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let registry = ProviderRegistry::builtin();

    let first_len = wrapper
        .resolve(registry, &[ProviderKey::of::<ParentNodeProvider>()])
        .unwrap()
        .cache::<ParentNodeProvider>()
        .unwrap()
        .len();
    let resolved = wrapper
        .resolve(registry, &[ProviderKey::of::<EnclosingFunctionProvider>()])
        .unwrap();
    assert_eq!(resolved.cache::<ParentNodeProvider>().unwrap().len(), first_len);
}

struct First;
struct Second;
struct Third;

macro_rules! looping_provider {
    ($name:ident, $next:ident) => {
        impl MetadataProvider for $name {
            type Value = ();
            const NAME: &'static str = stringify!($name);

            fn dependencies() -> Vec<ProviderKey> {
                vec![ProviderKey::of::<$next>()]
            }

            fn compute(_ctx: &ComputeContext<'_>) -> Result<ProviderCache<()>, MetadataError> {
                Ok(HashMap::new())
            }
        }
    };
}

looping_provider!(First, Second);
looping_provider!(Second, Third);
looping_provider!(Third, First);

#[test]
fn test_cycles_are_rejected_at_registration() {
    let mut registry = ProviderRegistry::new();
    let err = registry.register::<Second>().unwrap_err();

    let MetadataError::CyclicMetadataDependency { cycle } = &err else {
        panic!("expected a cycle, got {err}");
    };
    assert_eq!(cycle.len(), 4);
    assert_eq!(cycle.first(), cycle.last());
    for name in ["First", "Second", "Third"] {
        assert!(cycle.iter().any(|entry| entry == name));
    }
    assert!(err.to_string().starts_with("Circular metadata dependency: "));
    assert!(registry.is_empty());
}

#[test]
fn test_unregistered_providers_fail_resolution() {
    let module = parse_module("x\n").unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let err = wrapper
        .resolve(&ProviderRegistry::new(), &[ProviderKey::of::<PositionProvider>()])
        .unwrap_err();
    assert_eq!(err.to_string(), "Provider PositionProvider is not registered");
}

/// Reads parents without declaring the dependency
struct UndeclaredParents;

impl MetadataProvider for UndeclaredParents {
    type Value = ();
    const NAME: &'static str = "UndeclaredParents";

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<()>, MetadataError> {
        let first = ctx.module().children()[0].clone();
        ctx.get::<ParentNodeProvider>(&first)?;
        Ok(HashMap::new())
    }
}

#[test]
fn test_undeclared_dependency_is_not_visible() {
    let mut registry = ProviderRegistry::builtin().clone();
    registry.register::<UndeclaredParents>().unwrap();

    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    // Resolved in the same call, but still not declared
    let err = wrapper
        .resolve(
            &registry,
            &[
                ProviderKey::of::<ParentNodeProvider>(),
                ProviderKey::of::<UndeclaredParents>(),
            ],
        )
        .unwrap_err();
    assert!(
        matches!(
            err,
            MetadataError::MetadataNotComputed {
                provider: "ParentNodeProvider"
            }
        ),
        "{err}"
    );
}

/// Refuses modules without a function definition
struct RequiresFunction;

impl MetadataProvider for RequiresFunction {
    type Value = String;
    const NAME: &'static str = "RequiresFunction";

    fn dependencies() -> Vec<ProviderKey> {
        vec![ProviderKey::of::<EnclosingFunctionProvider>()]
    }

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<String>, MetadataError> {
        let mut names = Names::default();
        ctx.module().visit(&mut names);
        let function = names
            .0
            .iter()
            .find_map(|name| ctx.get::<EnclosingFunctionProvider>(name).ok())
            .ok_or_else(|| ctx.fail("module defines no function"))?;
        Ok(HashMap::from([(ctx.module().id(), function.clone())]))
    }
}

#[test]
fn test_provider_failures_name_the_provider() {
    let mut registry = ProviderRegistry::builtin().clone();
    registry.register::<RequiresFunction>().unwrap();
    let request = [ProviderKey::of::<RequiresFunction>()];

    let module = parse_module("x = 1\n").unwrap();
    let err = MetadataWrapper::new(&module)
        .unwrap()
        .resolve(&registry, &request)
        .unwrap_err();
    assert_eq!(err.to_string(), "RequiresFunction failed: module defines no function");

    let module = parse_module(SOURCE).unwrap();
    let mut wrapper = MetadataWrapper::new(&module).unwrap();
    let resolved = wrapper.resolve(&registry, &request).unwrap();
    assert_eq!(resolved.get::<RequiresFunction>(resolved.module()).unwrap(), "f");
}
