//! Batch runs with built-in and user-defined providers

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use weft_core::batch::{BatchInput, BatchOptions, CancellationToken, process_batch};
use weft_core::config::WeftConfig;
use weft_core::error::CstError;
use weft_core::metadata::{
    ComputeContext, EnclosingFunctionProvider, FilePathProvider, MetadataError, MetadataProvider,
    ProviderCache, ProviderKey, ProviderRegistry,
};
use weft_core::node::{Call, FunctionDef, Node, NodeId};
use weft_core::visitor::Visitor;

/// Number of calls made directly inside each function definition
struct CallCountProvider;

#[derive(Default)]
struct Collector {
    functions: HashMap<String, NodeId>,
    calls: Vec<Node>,
}

impl Visitor for Collector {
    fn visit_function_def(&mut self, node: &Arc<FunctionDef>) -> bool {
        if let Some(name) = node.name.as_name() {
            self.functions.insert(name.value.clone(), NodeId::of(node));
        }
        true
    }

    fn visit_call(&mut self, node: &Arc<Call>) -> bool {
        self.calls.push(Node::Call(node.clone()));
        true
    }
}

impl MetadataProvider for CallCountProvider {
    type Value = usize;
    const NAME: &'static str = "CallCountProvider";

    fn dependencies() -> Vec<ProviderKey> {
        vec![ProviderKey::of::<EnclosingFunctionProvider>()]
    }

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<usize>, MetadataError> {
        let mut collector = Collector::default();
        ctx.module().visit(&mut collector);

        let mut counts = ProviderCache::new();
        for call in &collector.calls {
            let Ok(function) = ctx.get::<EnclosingFunctionProvider>(call) else {
                continue;
            };
            if let Some(id) = collector.functions.get(function) {
                *counts.entry(*id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[derive(Default)]
struct FunctionNodes(Vec<Node>);

impl Visitor for FunctionNodes {
    fn visit_function_def(&mut self, node: &Arc<FunctionDef>) -> bool {
        self.0.push(Node::FunctionDef(node.clone()));
        true
    }
}

fn sources() -> Vec<BatchInput> {
    vec![
        BatchInput::new("pkg/a.py", "def f():\n    g()\n    h(g())\n"),
        BatchInput::new("pkg/../b.py", "x = f()\ndef g():\n    return 1\n"),
        BatchInput::new("broken.py", "def f(:\n"),
    ]
}

#[test]
fn test_custom_provider_in_batch() -> Result<()> {
    let mut registry = ProviderRegistry::builtin().clone();
    registry.register::<CallCountProvider>()?;

    let config = WeftConfig::from_toml_str("[batch]\nthreads = 2\n")?;
    let options = BatchOptions::from_config(
        "/project",
        vec![
            ProviderKey::of::<FilePathProvider>(),
            ProviderKey::of::<CallCountProvider>(),
        ],
        &config,
    );

    let results = process_batch(
        sources(),
        &options,
        &registry,
        &CancellationToken::new(),
        |_, resolved| {
            let path = resolved.get::<FilePathProvider>(resolved.module())?.clone();
            let mut functions = FunctionNodes::default();
            resolved.module().visit(&mut functions);
            let counts: Vec<(String, usize)> = functions
                .0
                .iter()
                .map(|function| {
                    let name = function
                        .as_function_def()
                        .and_then(|def| def.name.as_name())
                        .map(|name| name.value.clone())
                        .unwrap_or_default();
                    let count = resolved
                        .get_optional::<CallCountProvider>(function)
                        .copied()
                        .unwrap_or(0);
                    (name, count)
                })
                .collect();
            Ok((path, counts))
        },
    )?;

    assert_eq!(results.len(), 3);
    let failed: Vec<PathBuf> = results.failures().map(|o| o.path.clone()).collect();
    assert_eq!(failed, vec![PathBuf::from("broken.py")]);

    let successful = results.successful();
    assert_eq!(
        successful,
        vec![
            (
                PathBuf::from("pkg/a.py"),
                (
                    PathBuf::from("/project/pkg/a.py"),
                    vec![("f".to_string(), 3)]
                )
            ),
            (
                PathBuf::from("pkg/../b.py"),
                (
                    PathBuf::from("/project/b.py"),
                    vec![("g".to_string(), 0)]
                )
            ),
        ]
    );
    Ok(())
}

#[test]
fn test_cancelled_batch_reports_every_input() -> Result<()> {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = BatchOptions::new("/", vec![ProviderKey::of::<EnclosingFunctionProvider>()]);

    let results = process_batch(
        sources(),
        &options,
        ProviderRegistry::builtin(),
        &cancel,
        |_, _| Ok(()),
    )?;

    assert!(
        results
            .outcomes()
            .iter()
            .all(|o| matches!(o.result, Err(CstError::Cancelled { .. })))
    );
    assert!(results.successful().is_empty());
    Ok(())
}

#[test]
fn test_unknown_provider_fails_whole_batch() {
    let options = BatchOptions::new("/", vec![ProviderKey::of::<CallCountProvider>()]);
    let err = process_batch(
        sources(),
        &options,
        ProviderRegistry::builtin(),
        &CancellationToken::new(),
        |_, _| Ok(()),
    )
    .unwrap_err();

    insta::assert_snapshot!(err, @"Provider CallCountProvider is not registered");
}
