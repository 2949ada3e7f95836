//! Protocol errors.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Malformed input found by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ScanError {
    /// The stream ended inside a quoted string.
    #[error("unterminated quoted string")]
    UnterminatedQuote,

    /// A single token exceeded the size limit.
    #[error("token exceeds {limit} bytes")]
    TokenTooLarge { limit: usize },
}

/// Errors decoding protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Tokenizer failure.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A response line did not end with a known status keyword.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// A response line was empty.
    #[error("empty response line")]
    EmptyReply,

    /// A line could not be parsed as a reply header.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}
