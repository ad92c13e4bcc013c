//! Provider registry and resolution order

use super::dependency_graph::DependencyGraph;
use super::provider::{MetadataProvider, ProviderDescriptor, ProviderKey};
use super::{
    EnclosingFunctionProvider, ExpressionContextProvider, FilePathProvider, MetadataError,
    ParentNodeProvider, PositionProvider, WhitespaceInclusivePositionProvider,
};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, trace};

static BUILTIN: LazyLock<ProviderRegistry> = LazyLock::new(|| {
    let mut registry = ProviderRegistry::new();
    for descriptor in [
        ProviderKey::of::<PositionProvider>().descriptor(),
        ProviderKey::of::<WhitespaceInclusivePositionProvider>().descriptor(),
        ProviderKey::of::<ParentNodeProvider>().descriptor(),
        ProviderKey::of::<ExpressionContextProvider>().descriptor(),
        ProviderKey::of::<EnclosingFunctionProvider>().descriptor(),
        ProviderKey::of::<FilePathProvider>().descriptor(),
    ] {
        registry.providers.insert(descriptor.key, descriptor);
    }
    debug!("Initialised built-in registry with {} providers", registry.len());
    registry
});

/// Known providers and their dependency edges
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<ProviderKey, ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry holding every built-in provider
    pub fn builtin() -> &'static ProviderRegistry {
        &BUILTIN
    }

    /// Register `P` along with everything it depends on
    ///
    /// # Errors
    ///
    /// Returns `CyclicMetadataDependency` if the new providers close a loop;
    /// the registry is left unchanged.
    pub fn register<P: MetadataProvider>(&mut self) -> Result<(), MetadataError> {
        self.register_key(ProviderKey::of::<P>())
    }

    /// Register the provider behind `key` along with its dependencies
    pub fn register_key(&mut self, key: ProviderKey) -> Result<(), MetadataError> {
        if self.providers.contains_key(&key) {
            return Ok(());
        }

        let mut added: IndexMap<ProviderKey, ProviderDescriptor> = IndexMap::new();
        let mut pending = vec![key];
        while let Some(next) = pending.pop() {
            if self.providers.contains_key(&next) || added.contains_key(&next) {
                continue;
            }
            let descriptor = next.descriptor();
            pending.extend(descriptor.dependencies.iter().copied());
            added.insert(next, descriptor);
        }

        let mut graph = DependencyGraph::new();
        for (provider, descriptor) in self.providers.iter().chain(added.iter()) {
            graph.add_node(*provider);
            for dependency in &descriptor.dependencies {
                graph.add_edge(*provider, *dependency);
            }
        }
        graph.topological_sort()?;

        trace!("Registered {} providers for {}", added.len(), key);
        self.providers.extend(added);
        Ok(())
    }

    pub fn contains(&self, key: &ProviderKey) -> bool {
        self.providers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered providers in registration order
    pub fn keys(&self) -> impl Iterator<Item = ProviderKey> + '_ {
        self.providers.keys().copied()
    }

    /// Direct dependencies of a registered provider
    pub fn dependencies_of(&self, key: &ProviderKey) -> Option<&[ProviderKey]> {
        self.providers
            .get(key)
            .map(|descriptor| descriptor.dependencies.as_slice())
    }

    /// Registered providers that take batch input
    pub fn batchable(&self) -> impl Iterator<Item = &ProviderDescriptor> + '_ {
        self.providers
            .values()
            .filter(|descriptor| descriptor.is_batchable())
    }

    pub(crate) fn descriptor(&self, key: &ProviderKey) -> Option<&ProviderDescriptor> {
        self.providers.get(key)
    }

    /// Every provider needed for `requested`, dependencies first
    ///
    /// The order depends only on the set of providers involved, never on the
    /// order they were requested or registered in.
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredProvider` for an unknown provider and
    /// `CyclicMetadataDependency` if the closure contains a loop.
    pub fn resolution_order(
        &self,
        requested: &[ProviderKey],
    ) -> Result<Vec<ProviderKey>, MetadataError> {
        let mut closure = BTreeSet::new();
        let mut pending: Vec<ProviderKey> = requested.to_vec();
        while let Some(key) = pending.pop() {
            if !closure.insert(key) {
                continue;
            }
            let descriptor = self
                .providers
                .get(&key)
                .ok_or(MetadataError::UnregisteredProvider {
                    provider: key.name(),
                })?;
            pending.extend(descriptor.dependencies.iter().copied());
        }

        let mut graph = DependencyGraph::new();
        for key in &closure {
            graph.add_node(*key);
        }
        for key in &closure {
            let mut dependencies = self
                .dependencies_of(key)
                .map(<[ProviderKey]>::to_vec)
                .unwrap_or_default();
            dependencies.sort();
            for dependency in dependencies {
                graph.add_edge(*key, dependency);
            }
        }
        graph.topological_sort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::provider::{ComputeContext, ProviderCache};

    struct Ping;
    struct Pong;

    impl MetadataProvider for Ping {
        type Value = ();
        const NAME: &'static str = "Ping";

        fn dependencies() -> Vec<ProviderKey> {
            vec![ProviderKey::of::<Pong>()]
        }

        fn compute(_ctx: &ComputeContext<'_>) -> Result<ProviderCache<()>, MetadataError> {
            Ok(ProviderCache::new())
        }
    }

    impl MetadataProvider for Pong {
        type Value = ();
        const NAME: &'static str = "Pong";

        fn dependencies() -> Vec<ProviderKey> {
            vec![ProviderKey::of::<Ping>()]
        }

        fn compute(_ctx: &ComputeContext<'_>) -> Result<ProviderCache<()>, MetadataError> {
            Ok(ProviderCache::new())
        }
    }

    #[test]
    fn test_register_pulls_in_dependencies() {
        let mut registry = ProviderRegistry::new();
        registry.register::<EnclosingFunctionProvider>().unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&ProviderKey::of::<ParentNodeProvider>()));
    }

    #[test]
    fn test_register_rejects_cycles() {
        let mut registry = ProviderRegistry::new();
        let err = registry.register::<Ping>().unwrap_err();

        assert!(matches!(err, MetadataError::CyclicMetadataDependency { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolution_order_ignores_request_order() {
        let registry = ProviderRegistry::builtin();
        let enclosing = ProviderKey::of::<EnclosingFunctionProvider>();
        let position = ProviderKey::of::<PositionProvider>();

        let forward = registry.resolution_order(&[enclosing, position]).unwrap();
        let backward = registry.resolution_order(&[position, enclosing]).unwrap();

        assert_eq!(forward, backward);
        let parent_at = forward
            .iter()
            .position(|key| *key == ProviderKey::of::<ParentNodeProvider>())
            .unwrap();
        let enclosing_at = forward.iter().position(|key| *key == enclosing).unwrap();
        assert!(parent_at < enclosing_at);
    }

    #[test]
    fn test_unregistered_provider() {
        let registry = ProviderRegistry::new();
        let err = registry
            .resolution_order(&[ProviderKey::of::<PositionProvider>()])
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider PositionProvider is not registered");
    }
}
