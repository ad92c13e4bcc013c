//! Round-trip validation
//!
//! Parses a source, renders the tree back and checks that nothing was lost.
//! The deep copy of the tree is held to the same standard, so a report also
//! covers `deep_clone`.
//!
//! # Example
//!
//! ```rust
//! use weft_core::round_trip::RoundTripValidator;
//!
//! let report = RoundTripValidator::new().validate("x = 1  # one\n").unwrap();
//! assert!(report.is_lossless());
//! ```

use crate::codegen::advance;
use crate::config::ParserConfig;
use crate::metadata::CodePosition;
use crate::parser::parse_module_with_config;
use crate::result::Result;
use similar::TextDiff;
use tracing::{debug, warn};

/// Outcome of a round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripReport {
    /// Source as given
    pub original: String,
    /// Rendering of the parsed tree
    pub rendered: String,
    /// The deep copy equals the parsed tree and renders the same text
    pub clone_equal: bool,
    /// First position where `rendered` departs from `original`
    pub first_difference: Option<CodePosition>,
    /// Unified diff of the two texts when they differ
    pub diff: Option<String>,
}

impl RoundTripReport {
    pub fn is_lossless(&self) -> bool {
        self.first_difference.is_none() && self.clone_equal
    }

    /// Human-readable problems, empty for a lossless round trip
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Some(position) = self.first_difference {
            issues.push(format!(
                "Rendered text differs from the source at line {}, column {}",
                position.line, position.column
            ));
        }
        if !self.clone_equal {
            issues.push("Deep copy does not match the parsed tree".to_string());
        }
        issues
    }
}

/// Checks that parsing and rendering reproduce a source exactly
#[derive(Debug, Clone, Default)]
pub struct RoundTripValidator {
    config: ParserConfig,
}

impl RoundTripValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse `source` and compare its rendering against it
    ///
    /// # Errors
    ///
    /// Returns the parse error if `source` is not valid input. A source that
    /// parses but renders differently is reported, not an error.
    pub fn validate(&self, source: &str) -> Result<RoundTripReport> {
        let module = parse_module_with_config(source, &self.config)?;
        let rendered = module.code();

        let copy = module.deep_clone();
        let clone_equal = copy.deep_equals(&module) && copy.code() == rendered;

        let first_difference = first_difference(source, &rendered);
        let diff = first_difference.map(|_| {
            TextDiff::from_lines(source, rendered.as_str())
                .unified_diff()
                .context_radius(2)
                .header("original", "rendered")
                .to_string()
        });

        if let Some(position) = first_difference {
            warn!(
                "Round trip diverged at line {}, column {}",
                position.line, position.column
            );
        } else {
            debug!("Round trip of {} bytes is lossless", source.len());
        }

        Ok(RoundTripReport {
            original: source.to_string(),
            rendered,
            clone_equal,
            first_difference,
            diff,
        })
    }
}

/// Line (1-based) and column (0-based, in characters) of the first mismatch
fn first_difference(expected: &str, actual: &str) -> Option<CodePosition> {
    let mut common = expected
        .char_indices()
        .zip(actual.chars())
        .find(|((_, a), b)| a != b)
        .map_or_else(|| expected.len().min(actual.len()), |((idx, _), _)| idx);
    if common == expected.len() && common == actual.len() {
        return None;
    }
    // `\r` against `\r\n` is a different line break, not a new line
    if expected[..common].ends_with('\r') {
        common -= 1;
    }
    Some(advance(CodePosition::new(1, 0), &expected[..common]))
}
