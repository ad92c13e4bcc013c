//! Source positions of rendered nodes

use super::MetadataError;
use super::provider::{ComputeContext, MetadataProvider, ProviderCache};
use crate::codegen::{RecordedPositions, record_positions};
use crate::node::Node;
use std::fmt;

/// A location in rendered text: 1-indexed line, 0-indexed column in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodePosition {
    pub line: usize,
    pub column: usize,
}

impl CodePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Start-inclusive, end-exclusive span of rendered text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeRange {
    pub start: CodePosition,
    pub end: CodePosition,
}

impl CodeRange {
    pub fn new(start: CodePosition, end: CodePosition) -> Self {
        Self { start, end }
    }
}

fn render_positions(module: &Node) -> Result<RecordedPositions, MetadataError> {
    let inner = module
        .as_module()
        .ok_or(MetadataError::NotAModule { kind: module.kind() })?;
    Ok(record_positions(inner, module))
}

/// Syntactic range of every node
///
/// Statement ranges exclude their leading lines and indentation, and simple
/// statement lines also exclude their trailing whitespace and newline.
pub struct PositionProvider;

impl MetadataProvider for PositionProvider {
    type Value = CodeRange;
    const NAME: &'static str = "PositionProvider";

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<CodeRange>, MetadataError> {
        Ok(render_positions(ctx.module())?.syntactic)
    }
}

/// Range of every node including all trivia it owns
pub struct WhitespaceInclusivePositionProvider;

impl MetadataProvider for WhitespaceInclusivePositionProvider {
    type Value = CodeRange;
    const NAME: &'static str = "WhitespaceInclusivePositionProvider";

    fn compute(ctx: &ComputeContext<'_>) -> Result<ProviderCache<CodeRange>, MetadataError> {
        Ok(render_positions(ctx.module())?.inclusive)
    }
}
