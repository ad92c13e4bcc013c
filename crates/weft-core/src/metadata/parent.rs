//! Parent links

use super::MetadataError;
use super::provider::{ComputeContext, MetadataProvider, ProviderCache};
use crate::node::Node;
use crate::visitor::Visitor;

/// The parent of every node except the root
pub struct ParentNodeProvider;

#[derive(Default)]
struct ParentCollector {
    stack: Vec<Node>,
    parents: ProviderCache<Node>,
}

impl Visitor for ParentCollector {
    fn on_visit(&mut self, node: &Node) -> bool {
        if let Some(parent) = self.stack.last() {
            self.parents.insert(node.id(), parent.clone());
        }
        self.stack.push(node.clone());
        true
    }

    fn on_leave(&mut self, _node: &Node) {
        self.stack.pop();
    }
}

impl MetadataProvider for ParentNodeProvider {
    type Value = Node;
    const NAME: &'static str = "ParentNodeProvider";

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<Node>, MetadataError> {
        let mut collector = ParentCollector::default();
        ctx.module().visit(&mut collector);
        Ok(collector.parents)
    }
}
