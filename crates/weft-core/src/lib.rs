//! weft core
//!
//! A lossless concrete syntax tree for a small indentation-based language.
//! Parsing a source and rendering the tree gives back the exact input,
//! whitespace and comments included. Trees are immutable and can be
//! rewritten through transformers or searched with declarative matchers,
//! and metadata providers compute facts about nodes (positions, parents,
//! expression contexts) on demand.

pub mod batch;
pub mod codegen;
pub mod config;
pub mod display;
pub mod error;
pub mod matchers;
pub mod metadata;
pub mod node;
pub mod parser;
pub mod result;
pub mod round_trip;
pub mod sentinel;
pub mod tokenizer;
pub mod transforms;
pub mod trivia;
pub mod visitor;


// Re-export commonly used types
pub use batch::{
    BatchInput, BatchOptions, BatchOutcome, BatchResults, CancellationToken, process_batch,
};
pub use codegen::{CodegenState, render};
pub use config::{BatchConfig, MetadataConfig, ParserConfig, WeftConfig};
pub use display::{DumpOptions, dump};
pub use error::{CstError, ErrorKind};
pub use metadata::{
    BatchableProvider, CodePosition, CodeRange, ComputeContext, EnclosingFunctionProvider,
    ExpressionContext, ExpressionContextProvider, FilePathProvider, MetadataError,
    MetadataProvider, MetadataWrapper, ParentNodeProvider, PositionProvider, ProviderCache,
    ProviderDescriptor, ProviderKey, ProviderRegistry, ResolvedMetadata,
    WhitespaceInclusivePositionProvider,
};
pub use matchers::{Captures, MatchRule, Matcher, MatcherTransformer, MatcherVisitor, Matching, SequenceItem};
pub use node::{CstNode, FieldValue, Node, NodeId, NodeKind};
pub use parser::{
    parse_expression, parse_module, parse_module_bytes, parse_module_with_config, parse_statement,
};
pub use result::{Result, ResultExt};
pub use round_trip::{RoundTripReport, RoundTripValidator};
pub use sentinel::{MaybeSentinel, Transformed};
pub use transforms::SplitSimpleStatements;
pub use visitor::{Transformer, Visitor};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Initialize JSON-formatted logging, one event per line
pub fn init_json_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
