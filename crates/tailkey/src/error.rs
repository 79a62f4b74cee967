//! Backend error taxonomy.
//!
//! Collaborator failures pass through verbatim; the backend adds no
//! classification of its own.

use tailscale_api::ApiError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::paths::Operation;
use crate::storage::StorageError;

/// Convenience alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced to the host from backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request field data did not match the operation's input shape.
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// No handler is bound for the path/operation pair.
    #[error("unsupported operation: cannot {operation} {path}")]
    UnsupportedOperation {
        /// Requested path.
        path: String,
        /// Requested operation.
        operation: Operation,
    },

    /// A configuration candidate failed validation.
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    /// The operation requires configuration that has not been written yet.
    #[error("configuration has not been set")]
    NotConfigured,

    /// The upstream authority call failed.
    #[error(transparent)]
    Upstream(#[from] ApiError),

    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
