//! Table errors.

use tabula_store::StoreError;
use thiserror::Error;

use crate::codec::CodecError;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur during table operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum TableError {
    /// The referenced table, key, field, group or expiry class is absent.
    #[error("not found")]
    NotFound,

    /// The record has the wrong number of fields for the operation.
    #[error("bad record: expected {expected} fields, found {found}")]
    BadRecord { expected: usize, found: usize },

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(#[from] CodecError),

    /// A table name was registered twice.
    #[error("table {name} is already registered")]
    DuplicateTable { name: String },

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TableError {
    /// Returns true for [`TableError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true for [`TableError::BadRecord`].
    pub fn is_bad_record(&self) -> bool {
        matches!(self, Self::BadRecord { .. })
    }
}
