//! Provider traits, keys and the compute context

use super::MetadataError;
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-node results of one provider
pub type ProviderCache<V> = HashMap<NodeId, V>;

pub(crate) type ErasedCache = Arc<dyn Any + Send + Sync>;
pub(crate) type ErasedInput = Arc<dyn Any + Send + Sync>;

type ComputeFn = fn(&ComputeContext<'_>) -> Result<ErasedCache, MetadataError>;
type GenCacheFn = fn(&Path, &[PathBuf]) -> Result<HashMap<PathBuf, ErasedInput>, MetadataError>;

/// A type-level metadata provider
///
/// Providers are never instantiated: the type itself is the registry key and
/// `compute` runs once per wrapper, producing values for the nodes it cares
/// about.
pub trait MetadataProvider: 'static {
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    const NAME: &'static str;

    /// Providers whose results `compute` reads
    fn dependencies() -> Vec<ProviderKey> {
        Vec::new()
    }

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<Self::Value>, MetadataError>;

    /// Type-erased entry points used by the registry
    fn describe() -> ProviderDescriptor
    where
        Self: Sized,
    {
        ProviderDescriptor::plain::<Self>()
    }
}

/// A provider that consumes input computed once for a whole batch of files
///
/// Implementors override [`MetadataProvider::describe`] with
/// [`ProviderDescriptor::batchable`] so the batch runner can find them.
pub trait BatchableProvider: MetadataProvider {
    type Input: Clone + fmt::Debug + Send + Sync + 'static;

    /// Compute per-path input for every file in the batch
    fn gen_cache(root: &Path, paths: &[PathBuf])
    -> Result<HashMap<PathBuf, Self::Input>, MetadataError>;
}

/// Identity of a provider type
#[derive(Clone, Copy)]
pub struct ProviderKey {
    type_id: TypeId,
    name: &'static str,
    describe: fn() -> ProviderDescriptor,
}

impl ProviderKey {
    pub fn of<P: MetadataProvider>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: P::NAME,
            describe: P::describe,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn descriptor(&self) -> ProviderDescriptor {
        (self.describe)()
    }
}

impl PartialEq for ProviderKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ProviderKey {}

impl Hash for ProviderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ProviderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProviderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderKey").field(&self.name).finish()
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased view of a provider
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub(crate) key: ProviderKey,
    pub(crate) dependencies: Vec<ProviderKey>,
    pub(crate) compute: ComputeFn,
    pub(crate) gen_cache: Option<GenCacheFn>,
}

impl ProviderDescriptor {
    pub fn plain<P: MetadataProvider>() -> Self {
        Self {
            key: ProviderKey::of::<P>(),
            dependencies: P::dependencies(),
            compute: compute_erased::<P>,
            gen_cache: None,
        }
    }

    pub fn batchable<P: BatchableProvider>() -> Self {
        Self {
            gen_cache: Some(gen_cache_erased::<P>),
            ..Self::plain::<P>()
        }
    }

    pub fn key(&self) -> ProviderKey {
        self.key
    }

    pub fn dependencies(&self) -> &[ProviderKey] {
        &self.dependencies
    }

    pub fn is_batchable(&self) -> bool {
        self.gen_cache.is_some()
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .field("batchable", &self.is_batchable())
            .finish()
    }
}

fn compute_erased<P: MetadataProvider>(ctx: &ComputeContext<'_>) -> Result<ErasedCache, MetadataError> {
    let cache = P::compute(ctx)?;
    Ok(Arc::new(cache))
}

fn gen_cache_erased<P: BatchableProvider>(
    root: &Path,
    paths: &[PathBuf],
) -> Result<HashMap<PathBuf, ErasedInput>, MetadataError> {
    Ok(P::gen_cache(root, paths)?
        .into_iter()
        .map(|(path, input)| (path, Arc::new(input) as ErasedInput))
        .collect())
}

pub(crate) fn downcast_cache<P: MetadataProvider>(
    cache: &ErasedCache,
) -> Result<&ProviderCache<P::Value>, MetadataError> {
    cache
        .downcast_ref::<ProviderCache<P::Value>>()
        .ok_or(MetadataError::MetadataNotComputed { provider: P::NAME })
}

/// What a running provider can see
pub struct ComputeContext<'a> {
    pub(crate) module: &'a Node,
    pub(crate) provider: ProviderKey,
    pub(crate) dependencies: &'a [ProviderKey],
    pub(crate) computed: &'a IndexMap<ProviderKey, ErasedCache>,
    pub(crate) inputs: &'a HashMap<ProviderKey, ErasedInput>,
}

impl<'a> ComputeContext<'a> {
    /// The module being analysed
    pub fn module(&self) -> &'a Node {
        self.module
    }

    /// The provider being computed
    pub fn provider(&self) -> ProviderKey {
        self.provider
    }

    /// Error reporting that this provider could not compute its values
    pub fn fail(&self, message: impl Into<String>) -> MetadataError {
        MetadataError::ProviderFailed {
            provider: self.provider.name(),
            message: message.into(),
        }
    }

    /// Whole cache of a declared dependency
    pub fn cache<P: MetadataProvider>(&self) -> Result<&'a ProviderCache<P::Value>, MetadataError> {
        let key = ProviderKey::of::<P>();
        if !self.dependencies.contains(&key) {
            return Err(MetadataError::MetadataNotComputed { provider: P::NAME });
        }
        let cache = self
            .computed
            .get(&key)
            .ok_or(MetadataError::MetadataNotComputed { provider: P::NAME })?;
        downcast_cache::<P>(cache)
    }

    /// Value of a declared dependency for `node`
    pub fn get<P: MetadataProvider>(&self, node: &Node) -> Result<&'a P::Value, MetadataError> {
        self.cache::<P>()?
            .get(&node.id())
            .ok_or(MetadataError::KeyNotInCache {
                provider: P::NAME,
                node: node.kind(),
            })
    }

    /// Batch input handed to this provider, if any
    pub fn input<P: BatchableProvider>(&self) -> Option<&'a P::Input> {
        self.inputs
            .get(&ProviderKey::of::<P>())
            .and_then(|input| input.downcast_ref::<P::Input>())
    }
}
