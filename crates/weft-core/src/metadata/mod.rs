//! Metadata providers
//!
//! A provider computes a value for some of the nodes of a module. Providers
//! declare the providers they read from; [`MetadataWrapper::resolve`] runs
//! the transitive closure of the requested providers in dependency order, at
//! most once per wrapper, and hands the results back as a [`ResolvedMetadata`].

mod dependency_graph;
mod enclosing_function;
mod expression_context;
mod file_path;
mod parent;
mod position;
mod provider;
mod registry;
mod wrapper;

pub use dependency_graph::DependencyGraph;
pub use enclosing_function::EnclosingFunctionProvider;
pub use expression_context::{ExpressionContext, ExpressionContextProvider};
pub use file_path::{FilePathProvider, normalize};
pub use parent::ParentNodeProvider;
pub use position::{CodePosition, CodeRange, PositionProvider, WhitespaceInclusivePositionProvider};
pub use provider::{
    BatchableProvider, ComputeContext, MetadataProvider, ProviderCache, ProviderDescriptor,
    ProviderKey,
};
pub use registry::ProviderRegistry;
pub use wrapper::{MetadataWrapper, ResolvedMetadata};

pub(crate) use provider::ErasedInput;

use crate::node::NodeKind;
use thiserror::Error;

/// Errors raised while resolving or reading metadata
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// Providers depend on each other in a loop
    #[error("Circular metadata dependency: {}", cycle.join(" → "))]
    CyclicMetadataDependency { cycle: Vec<String> },

    /// A provider's results were read before it was resolved
    #[error("{provider} was not resolved; declare it as a dependency or resolve it first")]
    MetadataNotComputed { provider: &'static str },

    /// The provider computed nothing for the node
    #[error("{provider} has no value for this {node} node")]
    KeyNotInCache {
        provider: &'static str,
        node: NodeKind,
    },

    /// The registry does not know the provider
    #[error("Provider {provider} is not registered")]
    UnregisteredProvider { provider: &'static str },

    /// Metadata can only be resolved against a module root
    #[error("Metadata requires a Module root, got {kind}")]
    NotAModule { kind: NodeKind },

    /// A provider's compute step failed
    #[error("{provider} failed: {message}")]
    ProviderFailed {
        provider: &'static str,
        message: String,
    },
}

impl MetadataError {
    pub fn cyclic(cycle: &[ProviderKey]) -> Self {
        Self::CyclicMetadataDependency {
            cycle: cycle.iter().map(|key| key.name().to_string()).collect(),
        }
    }
}
