//! Server error types.

use tabula_store::StoreError;
use tabula_tables::TableError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that end a session or stop the server.
///
/// Per-query failures never surface here; they become response statuses.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A protocol line exceeded the configured limit.
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured limit.
        limit: usize,
    },

    /// A query block exceeded the configured limit.
    #[error("block exceeds {limit} bytes")]
    BlockTooLarge {
        /// Configured limit.
        limit: usize,
    },

    /// The peer closed the connection in the middle of a line or block.
    #[error("connection closed mid-request")]
    UnexpectedEof,

    /// Storage failure outside of a query.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Table registry failure.
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// A blocking query task panicked or was cancelled.
    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ServerError {
    /// Returns true if the error is a protocol limit violation.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            ServerError::LineTooLong { .. } | ServerError::BlockTooLarge { .. }
        )
    }
}
