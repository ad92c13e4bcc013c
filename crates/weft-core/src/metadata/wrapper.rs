//! Binding of a module to its computed metadata

use super::MetadataError;
use super::provider::{
    BatchableProvider, ComputeContext, ErasedCache, ErasedInput, MetadataProvider, ProviderCache,
    ProviderKey, downcast_cache,
};
use super::registry::ProviderRegistry;
use crate::config::MetadataConfig;
use crate::node::Node;
use crate::visitor::Visitor;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A module root plus the results of every provider resolved against it
///
/// The wrapper owns its own copy of the tree by default, so node identities
/// (and therefore cache keys) are private to it. Look nodes up through
/// [`MetadataWrapper::module`], not through the tree that was passed in.
#[derive(Debug)]
pub struct MetadataWrapper {
    module: Node,
    computed: IndexMap<ProviderKey, ErasedCache>,
    inputs: HashMap<ProviderKey, ErasedInput>,
}

impl MetadataWrapper {
    /// Wrap a deep copy of `module`
    pub fn new(module: &Node) -> Result<Self, MetadataError> {
        Self::without_copy(module.deep_clone())
    }

    /// Wrap `module` as is, sharing node identities with the caller
    pub fn without_copy(module: Node) -> Result<Self, MetadataError> {
        if module.as_module().is_none() {
            return Err(MetadataError::NotAModule {
                kind: module.kind(),
            });
        }
        Ok(Self {
            module,
            computed: IndexMap::new(),
            inputs: HashMap::new(),
        })
    }

    pub fn from_config(module: &Node, config: &MetadataConfig) -> Result<Self, MetadataError> {
        if config.copy_tree {
            Self::new(module)
        } else {
            Self::without_copy(module.clone())
        }
    }

    pub fn module(&self) -> &Node {
        &self.module
    }

    /// Supply the batch input a batchable provider will read
    pub fn set_input<P: BatchableProvider>(&mut self, input: P::Input) {
        self.insert_input(ProviderKey::of::<P>(), Arc::new(input));
    }

    pub(crate) fn insert_input(&mut self, key: ProviderKey, input: ErasedInput) {
        self.inputs.insert(key, input);
    }

    /// Compute `providers` and their dependencies
    ///
    /// Providers already computed by this wrapper are reused, so each runs
    /// at most once per wrapper.
    pub fn resolve(
        &mut self,
        registry: &ProviderRegistry,
        providers: &[ProviderKey],
    ) -> Result<ResolvedMetadata<'_>, MetadataError> {
        let order = registry.resolution_order(providers)?;

        for key in &order {
            if self.computed.contains_key(key) {
                trace!("{} already computed", key);
                continue;
            }
            let descriptor =
                registry
                    .descriptor(key)
                    .ok_or(MetadataError::UnregisteredProvider {
                        provider: key.name(),
                    })?;
            debug!("Computing {}", key);
            let cache = {
                let ctx = ComputeContext {
                    module: &self.module,
                    provider: *key,
                    dependencies: &descriptor.dependencies,
                    computed: &self.computed,
                    inputs: &self.inputs,
                };
                (descriptor.compute)(&ctx)
                    .inspect_err(|err| warn!("Computing {} failed: {}", key, err))?
            };
            self.computed.insert(*key, cache);
        }

        Ok(ResolvedMetadata {
            module: &self.module,
            computed: &self.computed,
            order,
        })
    }

    /// Walk the wrapped module, whose nodes are the ones metadata is keyed by
    pub fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        self.module.visit(visitor);
    }
}

/// Read access to resolved provider results
#[derive(Debug, Clone)]
pub struct ResolvedMetadata<'a> {
    module: &'a Node,
    computed: &'a IndexMap<ProviderKey, ErasedCache>,
    order: Vec<ProviderKey>,
}

impl<'a> ResolvedMetadata<'a> {
    /// The wrapped module
    pub fn module(&self) -> &'a Node {
        self.module
    }

    /// Providers in the order they were (or had been) computed
    pub fn order(&self) -> &[ProviderKey] {
        &self.order
    }

    pub fn cache<P: MetadataProvider>(&self) -> Result<&'a ProviderCache<P::Value>, MetadataError> {
        let cache = self
            .computed
            .get(&ProviderKey::of::<P>())
            .ok_or(MetadataError::MetadataNotComputed { provider: P::NAME })?;
        downcast_cache::<P>(cache)
    }

    /// Value of `P` for `node`
    ///
    /// # Errors
    ///
    /// `MetadataNotComputed` if `P` was never resolved, `KeyNotInCache` if
    /// `P` has no value for the node (for example a node from another tree).
    pub fn get<P: MetadataProvider>(&self, node: &Node) -> Result<&'a P::Value, MetadataError> {
        self.cache::<P>()?
            .get(&node.id())
            .ok_or(MetadataError::KeyNotInCache {
                provider: P::NAME,
                node: node.kind(),
            })
    }

    /// Value of `P` for `node`, or `None` if there is none
    pub fn get_optional<P: MetadataProvider>(&self, node: &Node) -> Option<&'a P::Value> {
        self.cache::<P>().ok()?.get(&node.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        CodePosition, CodeRange, ParentNodeProvider, PositionProvider,
        WhitespaceInclusivePositionProvider,
    };
    use crate::parser::parse_module;

    #[test]
    fn test_wrapper_copies_tree() {
        let module = parse_module("x = 1\n").unwrap();
        let wrapper = MetadataWrapper::new(&module).unwrap();

        assert!(!wrapper.module().ptr_eq(&module));
        assert!(wrapper.module().deep_equals(&module));
    }

    #[test]
    fn test_rejects_non_module_root() {
        let module = parse_module("x = 1\n").unwrap();
        let statement = module.children()[0].clone();
        let err = MetadataWrapper::new(&statement).unwrap_err();
        assert!(matches!(err, MetadataError::NotAModule { .. }));
    }

    #[test]
    fn test_positions_of_statements() {
        let module = parse_module("# lead\nfoo = 1\n\ndef f():\n    return foo\n").unwrap();
        let mut wrapper = MetadataWrapper::new(&module).unwrap();
        let resolved = wrapper
            .resolve(
                ProviderRegistry::builtin(),
                &[
                    ProviderKey::of::<PositionProvider>(),
                    ProviderKey::of::<WhitespaceInclusivePositionProvider>(),
                ],
            )
            .unwrap();

        let body = resolved.module().children();
        let assign_line = &body[0];
        assert_eq!(
            resolved.get::<PositionProvider>(assign_line).unwrap(),
            &CodeRange::new(CodePosition::new(2, 0), CodePosition::new(2, 7))
        );
        assert_eq!(
            resolved
                .get::<WhitespaceInclusivePositionProvider>(assign_line)
                .unwrap(),
            &CodeRange::new(CodePosition::new(1, 0), CodePosition::new(3, 0))
        );
    }

    #[test]
    fn test_lookup_errors() {
        let module = parse_module("x\n").unwrap();
        let mut wrapper = MetadataWrapper::new(&module).unwrap();
        let resolved = wrapper
            .resolve(
                ProviderRegistry::builtin(),
                &[ProviderKey::of::<ParentNodeProvider>()],
            )
            .unwrap();

        // The caller's tree is not the wrapper's tree
        let children = module.children();
        let foreign = &children[0];
        assert!(matches!(
            resolved.get::<ParentNodeProvider>(foreign),
            Err(MetadataError::KeyNotInCache { .. })
        ));
        assert!(matches!(
            resolved.get::<PositionProvider>(resolved.module()),
            Err(MetadataError::MetadataNotComputed { .. })
        ));
        assert!(resolved.get_optional::<ParentNodeProvider>(resolved.module()).is_none());
    }
}
