//! Error types for the client library.

use std::fmt;

use tabula_proto::ProtocolError;
use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout.
    #[error("connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response line could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server rejected a request block.
    #[error("server error: {0}")]
    ServerError(String),

    /// The server answered with something other than the expected reply.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and ready.
    Connected,
    /// The connection failed mid-request and cannot be reused.
    Failed,
    /// Connection closed.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}
