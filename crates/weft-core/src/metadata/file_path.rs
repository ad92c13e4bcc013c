//! Absolute path of the module being analysed

use super::MetadataError;
use super::provider::{
    BatchableProvider, ComputeContext, MetadataProvider, ProviderCache, ProviderDescriptor,
};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Maps the module root to the absolute path of its file
///
/// Paths are resolved against the batch root and normalised lexically; the
/// filesystem is never consulted.
pub struct FilePathProvider;

impl MetadataProvider for FilePathProvider {
    type Value = PathBuf;
    const NAME: &'static str = "FilePathProvider";

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<PathBuf>, MetadataError> {
        let mut cache = ProviderCache::new();
        match ctx.input::<Self>() {
            Some(path) => {
                cache.insert(ctx.module().id(), path.clone());
            }
            None => debug!("No file path input supplied; FilePathProvider cache is empty"),
        }
        Ok(cache)
    }

    fn describe() -> ProviderDescriptor {
        ProviderDescriptor::batchable::<Self>()
    }
}

impl BatchableProvider for FilePathProvider {
    type Input = PathBuf;

    fn gen_cache(
        root: &Path,
        paths: &[PathBuf],
    ) -> Result<HashMap<PathBuf, PathBuf>, MetadataError> {
        Ok(paths
            .iter()
            .map(|path| {
                let joined = if path.is_absolute() {
                    path.clone()
                } else {
                    root.join(path)
                };
                (path.clone(), normalize(&joined))
            })
            .collect())
    }
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("x/../../y")), PathBuf::from("../y"));
    }

    #[test]
    fn test_gen_cache_resolves_against_root() {
        let paths = vec![PathBuf::from("pkg/../mod.py"), PathBuf::from("/abs/file.py")];
        let cache = FilePathProvider::gen_cache(Path::new("/repo"), &paths).unwrap();
        assert_eq!(cache[&paths[0]], PathBuf::from("/repo/mod.py"));
        assert_eq!(cache[&paths[1]], PathBuf::from("/abs/file.py"));
    }
}
