//! Load/store context of names and attributes

use super::MetadataError;
use super::provider::{ComputeContext, MetadataProvider, ProviderCache};
use crate::node::{Arg, AssignTarget, Attribute, Call, FunctionDef, Name, NodeId, Param};
use crate::visitor::Visitor;
use std::collections::HashSet;
use std::sync::Arc;

/// Whether an expression is read or bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionContext {
    Load,
    Store,
}

/// Context of every `Name`, `Attribute` and `Call` that is read or bound
///
/// Keyword names in calls and attribute member names are not expressions on
/// their own and get no entry.
pub struct ExpressionContextProvider;

#[derive(Default)]
struct ContextCollector {
    stores: HashSet<NodeId>,
    skipped: HashSet<NodeId>,
    contexts: ProviderCache<ExpressionContext>,
}

impl ContextCollector {
    fn record(&mut self, id: NodeId) {
        if self.skipped.contains(&id) {
            return;
        }
        let context = if self.stores.contains(&id) {
            ExpressionContext::Store
        } else {
            ExpressionContext::Load
        };
        self.contexts.insert(id, context);
    }
}

impl Visitor for ContextCollector {
    fn visit_assign_target(&mut self, node: &Arc<AssignTarget>) -> bool {
        self.stores.insert(node.target.id());
        true
    }

    fn visit_function_def(&mut self, node: &Arc<FunctionDef>) -> bool {
        self.stores.insert(node.name.id());
        true
    }

    fn visit_param(&mut self, node: &Arc<Param>) -> bool {
        self.stores.insert(node.name.id());
        true
    }

    fn visit_arg(&mut self, node: &Arc<Arg>) -> bool {
        if let Some(keyword) = &node.keyword {
            self.skipped.insert(keyword.id());
        }
        true
    }

    fn visit_attribute(&mut self, node: &Arc<Attribute>) -> bool {
        self.skipped.insert(node.attr.id());
        self.record(NodeId::of(node));
        true
    }

    fn visit_call(&mut self, node: &Arc<Call>) -> bool {
        self.record(NodeId::of(node));
        true
    }

    fn visit_name(&mut self, node: &Arc<Name>) -> bool {
        self.record(NodeId::of(node));
        true
    }
}

impl MetadataProvider for ExpressionContextProvider {
    type Value = ExpressionContext;
    const NAME: &'static str = "ExpressionContextProvider";

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<ExpressionContext>, MetadataError> {
        let mut collector = ContextCollector::default();
        ctx.module().visit(&mut collector);
        Ok(collector.contexts)
    }
}
