//! The crate-wide `Result` and helpers for sorting per-source failures

use crate::error::CstError;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, CstError>;

/// Separates failures confined to one source from ones that end a run
pub trait ResultExt<T> {
    /// `Ok(None)` when the source failed to parse or was cancelled; any
    /// other error is handed back
    fn recoverable(self) -> Result<Option<T>>;

    /// The value, or `None` once the failure has been logged
    fn log_and_continue(self) -> Option<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn recoverable(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                warn!("Skipping source: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn log_and_continue(self) -> Option<T> {
        let err = match self {
            Ok(value) => return Some(value),
            Err(err) => err,
        };
        if err.is_recoverable() {
            warn!("Skipping source: {}", err);
        } else {
            error!("{:?} failure: {}", err.kind(), err);
        }
        None
    }
}
