//! CLI error type.

use kabind_client::StoreError;
use kabind_marshal::MarshalError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs a store path and none was given.
    #[error("store path required for {0}")]
    MissingPath(&'static str),

    /// Opening or using the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bulk operation failed.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// A `KEY=VALUE` argument had no `=`.
    #[error("invalid pair {0:?}, expected KEY=VALUE")]
    InvalidPair(String),

    /// JSON output could not be produced.
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}
