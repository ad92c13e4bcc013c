//! weft integration tests
//!
//! Shared fixtures and a corpus runner for the cross-module scenarios under
//! `tests/`.

pub mod corpus;

pub use corpus::{CorpusEntry, CorpusReport, SAMPLE_SOURCES, run_corpus};
