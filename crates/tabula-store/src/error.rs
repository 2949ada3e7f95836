//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be created or opened.
    #[error("failed to open database: {0}")]
    Database(#[from] redb::DatabaseError),

    /// A transaction could not be started.
    #[error("failed to begin transaction: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// The backing table could not be opened.
    #[error("failed to open table: {0}")]
    Table(#[from] redb::TableError),

    /// Low-level storage failure during a read or write.
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// The transaction could not be committed.
    #[error("failed to commit transaction: {0}")]
    Commit(#[from] redb::CommitError),

    /// A coalesced batch failed as a whole (begin or commit).
    ///
    /// Every caller in the batch receives this error.
    #[error("batch failed: {reason}")]
    BatchFailed {
        /// Description of the underlying failure.
        reason: String,
    },

    /// The batch executing this call went away without reporting a result.
    #[error("batch aborted before completion")]
    BatchAborted,

    /// A file-backed store was requested without a path.
    #[error("no database path configured")]
    MissingPath,

    /// I/O error while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Creates a batch failure from any displayable error.
    pub fn batch_failed(reason: impl ToString) -> Self {
        Self::BatchFailed {
            reason: reason.to_string(),
        }
    }
}
