//! Name of the function each node belongs to

use super::MetadataError;
use super::parent::ParentNodeProvider;
use super::provider::{ComputeContext, MetadataProvider, ProviderCache, ProviderKey};
use crate::node::Node;
use crate::visitor::Visitor;

/// For every node inside a function definition, the nearest function's name
///
/// A function's own name belongs to the enclosing scope; its parameters and
/// body belong to the function.
pub struct EnclosingFunctionProvider;

#[derive(Default)]
struct NodeCollector {
    nodes: Vec<Node>,
}

impl Visitor for NodeCollector {
    fn on_visit(&mut self, node: &Node) -> bool {
        self.nodes.push(node.clone());
        true
    }

    fn on_leave(&mut self, _node: &Node) {}
}

impl MetadataProvider for EnclosingFunctionProvider {
    type Value = String;
    const NAME: &'static str = "EnclosingFunctionProvider";

    fn dependencies() -> Vec<ProviderKey> {
        vec![ProviderKey::of::<ParentNodeProvider>()]
    }

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<String>, MetadataError> {
        let parents = ctx.cache::<ParentNodeProvider>()?;
        let mut collector = NodeCollector::default();
        ctx.module().visit(&mut collector);

        let mut functions = ProviderCache::new();
        for node in &collector.nodes {
            let mut child = node;
            while let Some(parent) = parents.get(&child.id()) {
                if let Some(func) = parent.as_function_def()
                    && !func.name.ptr_eq(child)
                    && let Some(name) = func.name.as_name()
                {
                    functions.insert(node.id(), name.value.clone());
                    break;
                }
                child = parent;
            }
        }
        Ok(functions)
    }
}
