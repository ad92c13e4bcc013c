//! Error types for tree construction, traversal and metadata resolution

use crate::metadata::MetadataError;
use crate::node::NodeKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for weft operations
#[derive(Debug, Error)]
pub enum CstError {
    /// Source text could not be tokenized or parsed
    #[error("Syntax error at line {line}, column {column}: {message}")]
    ParserSyntaxError {
        message: String,
        line: usize,
        column: usize,
    },

    /// Source declares an encoding the engine cannot round-trip
    #[error("Unsupported source encoding: {encoding}")]
    UnsupportedEncoding { encoding: String },

    /// A node violates one of its structural invariants
    #[error("Invalid {kind} node: {message}")]
    InvalidNode { kind: NodeKind, message: String },

    /// `with_changes` named a field the node kind does not have
    #[error("{node} has no field named '{field}'")]
    InvalidField { node: NodeKind, field: String },

    /// A field was given a value of the wrong shape
    #[error("Field '{field}' of {node} expects {expected}, got {found}")]
    InvalidFieldType {
        node: NodeKind,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A child node of an unsupported kind was placed in a field
    #[error("Field '{field}' of {node} cannot hold a {found} node")]
    InvalidChildKind {
        node: NodeKind,
        field: &'static str,
        found: NodeKind,
    },

    /// A transform tried to remove a required singular child
    #[error("Cannot remove required field '{field}' of {node}")]
    CannotRemoveRequiredField { node: NodeKind, field: &'static str },

    /// A transform returned several nodes for a non-sequence field
    #[error("Cannot flatten into field '{field}' of {node}: the field is not a sequence")]
    InvalidFlattenContext { node: NodeKind, field: &'static str },

    /// A transform removed or flattened the root of the tree
    #[error("Transforming the root {kind} must produce exactly one node")]
    InvalidRootResult { kind: NodeKind },

    /// Metadata resolution or lookup failed
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Batch processing of a source was abandoned
    #[error("Processing of '{}' was cancelled", path.display())]
    Cancelled { path: PathBuf },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Structural,
    Traversal,
    Metadata,
    Config,
    Batch,
    Internal,
}

impl CstError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CstError::ParserSyntaxError { .. } | CstError::UnsupportedEncoding { .. } => {
                ErrorKind::Parse
            }
            CstError::InvalidNode { .. }
            | CstError::InvalidField { .. }
            | CstError::InvalidFieldType { .. }
            | CstError::InvalidChildKind { .. } => ErrorKind::Structural,
            CstError::CannotRemoveRequiredField { .. }
            | CstError::InvalidFlattenContext { .. }
            | CstError::InvalidRootResult { .. } => ErrorKind::Traversal,
            CstError::Metadata(_) => ErrorKind::Metadata,
            CstError::ConfigError { .. } => ErrorKind::Config,
            CstError::Cancelled { .. } => ErrorKind::Batch,
            CstError::InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable (processing of other trees can continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Parse | ErrorKind::Batch)
    }

    /// Create a syntax error at a 1-indexed line and 0-indexed column
    pub fn syntax_error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::ParserSyntaxError {
            message: message.into(),
            line,
            column,
        }
    }

    /// Create an invalid node error
    pub fn invalid_node(kind: NodeKind, message: impl Into<String>) -> Self {
        Self::InvalidNode {
            kind,
            message: message.into(),
        }
    }

    /// Create an unknown field error
    pub fn invalid_field(node: NodeKind, field: impl Into<String>) -> Self {
        Self::InvalidField {
            node,
            field: field.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = CstError::syntax_error("unexpected token", 3, 4);
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.is_recoverable());

        let err = CstError::CannotRemoveRequiredField {
            node: NodeKind::FunctionDef,
            field: "name",
        };
        assert_eq!(err.kind(), ErrorKind::Traversal);
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Cannot remove required field 'name' of FunctionDef"
        );
    }

    #[test]
    fn test_metadata_errors_convert() {
        let err: CstError = MetadataError::MetadataNotComputed {
            provider: "PositionProvider",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Metadata);
    }
}
