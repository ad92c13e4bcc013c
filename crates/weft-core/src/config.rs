//! Configuration for parsing, metadata resolution and batch processing
//!
//! Configuration is plain data: it can be built in code or deserialized
//! from a TOML or JSON string. Keys are camelCase and every field has a
//! default, so partial documents are accepted:
//!
//! ```toml
//! [parser]
//! defaultIndent = "  "
//!
//! [batch]
//! threads = 4
//! ```

use crate::error::CstError;
use crate::result::Result;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WeftConfig {
    pub parser: ParserConfig,
    pub metadata: MetadataConfig,
    pub batch: BatchConfig,
}

/// Fallbacks used when a source does not establish its own conventions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserConfig {
    /// Indentation used when the source contains no indented block
    pub default_indent: String,
    /// Line break used when the source contains no line break
    pub default_newline: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_indent: "    ".to_string(),
            default_newline: "\n".to_string(),
        }
    }
}

/// Metadata wrapper behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataConfig {
    /// Deep-copy trees before wrapping them
    pub copy_tree: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self { copy_tree: true }
    }
}

/// Batch processing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses one per logical CPU
    pub threads: Option<usize>,
}

impl WeftConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| CstError::config_error(format!("Invalid TOML configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CstError::config_error(format!("Invalid JSON configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<()> {
        let indent = &self.parser.default_indent;
        if indent.is_empty() || !indent.chars().all(|c| c == ' ' || c == '\t') {
            return Err(CstError::config_error(format!(
                "defaultIndent must be non-empty spaces or tabs, got {indent:?}"
            )));
        }
        if !matches!(self.parser.default_newline.as_str(), "\n" | "\r\n" | "\r") {
            return Err(CstError::config_error(format!(
                "defaultNewline must be a line break, got {:?}",
                self.parser.default_newline
            )));
        }
        if self.batch.threads == Some(0) {
            return Err(CstError::config_error("batch.threads must be at least 1"));
        }
        Ok(())
    }
}
