//! Parallel processing of many independent sources
//!
//! Every source is parsed, wrapped and resolved on its own, so trees never
//! cross threads mid-flight. Batchable providers get one `gen_cache` call
//! for the whole batch before any source is processed.

use crate::config::{ParserConfig, WeftConfig};
use crate::error::CstError;
use crate::metadata::{ErasedInput, MetadataWrapper, ProviderKey, ProviderRegistry, ResolvedMetadata};
use crate::parser::parse_module_with_config;
use crate::result::{Result, ResultExt};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{Level, debug, info, span, warn};

/// One source to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    /// Path of the source, relative to [`BatchOptions::root`] or absolute
    pub path: PathBuf,
    pub source: String,
}

impl BatchInput {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory relative input paths are resolved against
    pub root: PathBuf,
    /// Worker threads; `None` uses one per logical CPU
    pub threads: Option<usize>,
    /// Providers resolved for every source
    pub providers: Vec<ProviderKey>,
    pub parser: ParserConfig,
}

impl BatchOptions {
    pub fn new(root: impl Into<PathBuf>, providers: Vec<ProviderKey>) -> Self {
        Self {
            root: root.into(),
            threads: None,
            providers,
            parser: ParserConfig::default(),
        }
    }

    pub fn from_config(
        root: impl Into<PathBuf>,
        providers: Vec<ProviderKey>,
        config: &WeftConfig,
    ) -> Self {
        Self {
            threads: config.batch.threads,
            parser: config.parser.clone(),
            ..Self::new(root, providers)
        }
    }
}

/// Shared flag that stops a batch from starting further sources
///
/// Sources already being processed run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Result for one input
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub path: PathBuf,
    pub result: Result<T>,
}

/// Results of a batch, in input order
#[derive(Debug)]
pub struct BatchResults<T> {
    outcomes: Vec<BatchOutcome<T>>,
}

impl<T> BatchResults<T> {
    pub fn outcomes(&self) -> &[BatchOutcome<T>] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome<T>> + '_ {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    /// Successful values, logging every failure
    pub fn successful(self) -> Vec<(PathBuf, T)> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| {
                let path = outcome.path;
                outcome.result.log_and_continue().map(|value| (path, value))
            })
            .collect()
    }

    /// Successful values, skipping sources that failed to parse or were
    /// cancelled
    ///
    /// # Errors
    ///
    /// The first failure of any other kind, such as a provider or callback
    /// error.
    pub fn try_successful(self) -> Result<Vec<(PathBuf, T)>> {
        let mut values = Vec::with_capacity(self.outcomes.len());
        for outcome in self.outcomes {
            if let Some(value) = outcome.result.recoverable()? {
                values.push((outcome.path, value));
            }
        }
        Ok(values)
    }

    pub fn into_outcomes(self) -> Vec<BatchOutcome<T>> {
        self.outcomes
    }
}

/// Batch inputs keyed by provider, then by source path
type BatchInputs = Vec<(ProviderKey, HashMap<PathBuf, ErasedInput>)>;

/// Parse every input, resolve `options.providers` and hand the result to `f`
///
/// # Errors
///
/// Fails as a whole only when the providers cannot be ordered, a batchable
/// provider cannot build its inputs or the thread pool cannot be created.
/// Per-source failures, including cancellation, are reported in the
/// matching [`BatchOutcome`].
pub fn process_batch<T, F>(
    inputs: Vec<BatchInput>,
    options: &BatchOptions,
    registry: &ProviderRegistry,
    cancel: &CancellationToken,
    f: F,
) -> Result<BatchResults<T>>
where
    T: Send,
    F: Fn(&Path, &ResolvedMetadata<'_>) -> Result<T> + Sync,
{
    let batch_span = span!(Level::INFO, "process_batch", sources = inputs.len());
    let _enter = batch_span.enter();

    let order = registry.resolution_order(&options.providers)?;
    let batch_inputs = generate_batch_inputs(&order, options, registry, &inputs)?;

    let threads = options.threads.unwrap_or(0);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("weft-worker-{index}"))
        .build()
        .map_err(|e| CstError::internal_error(format!("Could not build thread pool: {e}")))?;
    debug!(
        "Processing {} sources on {} threads",
        inputs.len(),
        pool.current_num_threads()
    );

    let completed = AtomicUsize::new(0);
    let outcomes: Vec<BatchOutcome<T>> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let result = if cancel.is_cancelled() {
                    Err(CstError::Cancelled {
                        path: input.path.clone(),
                    })
                } else {
                    let result = process_one(input, options, registry, &batch_inputs, &f);
                    completed.fetch_add(1, Ordering::Relaxed);
                    result
                };
                if let Err(err) = &result {
                    warn!("{}: {}", input.path.display(), err);
                }
                BatchOutcome {
                    path: input.path.clone(),
                    result,
                }
            })
            .collect()
    });

    info!(
        "Processed {} of {} sources",
        completed.load(Ordering::Relaxed),
        outcomes.len()
    );
    Ok(BatchResults { outcomes })
}

fn generate_batch_inputs(
    order: &[ProviderKey],
    options: &BatchOptions,
    registry: &ProviderRegistry,
    inputs: &[BatchInput],
) -> Result<BatchInputs> {
    let paths: Vec<PathBuf> = inputs.iter().map(|input| input.path.clone()).collect();
    let mut generated = Vec::new();
    for key in order {
        let Some(gen_cache) = registry
            .descriptor(key)
            .and_then(|descriptor| descriptor.gen_cache)
        else {
            continue;
        };
        debug!("Generating batch inputs for {}", key);
        generated.push((*key, gen_cache(&options.root, &paths)?));
    }
    Ok(generated)
}

fn process_one<T, F>(
    input: &BatchInput,
    options: &BatchOptions,
    registry: &ProviderRegistry,
    batch_inputs: &BatchInputs,
    f: &F,
) -> Result<T>
where
    F: Fn(&Path, &ResolvedMetadata<'_>) -> Result<T>,
{
    let module = parse_module_with_config(&input.source, &options.parser)?;
    // Freshly parsed, so nothing else holds these node identities
    let mut wrapper = MetadataWrapper::without_copy(module)?;
    for (key, by_path) in batch_inputs {
        if let Some(value) = by_path.get(&input.path) {
            wrapper.insert_input(*key, Arc::clone(value));
        }
    }
    let resolved = wrapper.resolve(registry, &options.providers)?;
    f(&input.path, &resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FilePathProvider, ParentNodeProvider};

    #[test]
    fn test_results_keep_input_order() {
        let inputs: Vec<BatchInput> = (0..20)
            .map(|i| BatchInput::new(format!("m{i}.py"), format!("x = {i}\n")))
            .collect();
        let mut options = BatchOptions::new("/src", vec![ProviderKey::of::<FilePathProvider>()]);
        options.threads = Some(4);

        let results = process_batch(
            inputs,
            &options,
            ProviderRegistry::builtin(),
            &CancellationToken::new(),
            |_, resolved| Ok(resolved.get::<FilePathProvider>(resolved.module())?.clone()),
        )
        .unwrap();

        let paths: Vec<PathBuf> = results.successful().into_iter().map(|(_, p)| p).collect();
        let expected: Vec<PathBuf> = (0..20)
            .map(|i| PathBuf::from(format!("/src/m{i}.py")))
            .collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_parse_failures_are_per_source() {
        let inputs = vec![
            BatchInput::new("good.py", "pass\n"),
            BatchInput::new("bad.py", "def (\n"),
        ];
        let options = BatchOptions::new("/", vec![ProviderKey::of::<ParentNodeProvider>()]);

        let results = process_batch(
            inputs,
            &options,
            ProviderRegistry::builtin(),
            &CancellationToken::new(),
            |_, resolved| Ok(resolved.cache::<ParentNodeProvider>()?.len()),
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        let failures: Vec<_> = results.failures().map(|o| o.path.clone()).collect();
        assert_eq!(failures, vec![PathBuf::from("bad.py")]);
    }

    #[test]
    fn test_try_successful_skips_only_source_failures() {
        let inputs = || {
            vec![
                BatchInput::new("a.py", "a = 1\n"),
                BatchInput::new("broken.py", "a = (\n"),
                BatchInput::new("b.py", "b = 2\n"),
            ]
        };
        let options = BatchOptions::new("/", Vec::new());
        let registry = ProviderRegistry::builtin();
        let cancel = CancellationToken::new();

        let results = process_batch(inputs(), &options, registry, &cancel, |path, _| {
            Ok(path.display().to_string())
        })
        .unwrap();
        let values: Vec<String> = results
            .try_successful()
            .unwrap()
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        assert_eq!(values, vec!["a.py", "b.py"]);

        let results = process_batch(inputs(), &options, registry, &cancel, |path, _| {
            if path == Path::new("b.py") {
                return Err(CstError::internal_error("callback gave up"));
            }
            Ok(())
        })
        .unwrap();
        let err = results.try_successful().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = BatchOptions::new("/", Vec::new());

        let results = process_batch(
            vec![BatchInput::new("a.py", "a\n")],
            &options,
            ProviderRegistry::builtin(),
            &cancel,
            |_, _| Ok(()),
        )
        .unwrap();

        let outcome = &results.outcomes()[0];
        assert!(matches!(outcome.result, Err(CstError::Cancelled { .. })));
    }
}
