//! Response lines.
//!
//! Every query in a block gets one response line. Write commands reply with
//! the bare status keyword; `LKUP` lines carry the result fields, each
//! quoted and followed by a space, before the status; `CNT` lines carry the
//! count and a space before the status.

use bytes::Bytes;

use crate::error::{ProtocolError, ProtocolResult};
use crate::scan::{tokenize, TokenKind};
use crate::status::Status;

/// Quotes `field`, doubling any embedded `"`.
pub fn escape(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len() + 2);
    out.push(b'"');
    for &b in field {
        if b == b'"' {
            out.push(b'"');
        }
        out.push(b);
    }
    out.push(b'"');
    out
}

/// Formats a status-only response line.
pub fn status_line(status: Status) -> Vec<u8> {
    status.as_str().as_bytes().to_vec()
}

/// Formats a lookup response line: quoted fields, then the status.
pub fn fields_line(fields: &[Bytes], status: Status) -> Vec<u8> {
    let mut line = Vec::new();
    for field in fields {
        line.extend_from_slice(&escape(field));
        line.push(b' ');
    }
    line.extend_from_slice(status.as_str().as_bytes());
    line
}

/// Formats a count response line: the count, then the status.
///
/// The count is always present; it is `0` when the query failed.
pub fn count_line(count: u64, status: Status) -> Vec<u8> {
    format!("{count} {status}").into_bytes()
}

/// A parsed response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Result fields (lookup values, or the count as a decimal string).
    pub fields: Vec<Bytes>,
    /// Query status.
    pub status: Status,
}

impl Reply {
    /// Parses a response line.
    pub fn parse(line: &[u8]) -> ProtocolResult<Self> {
        let mut fields: Vec<Bytes> = tokenize(line)?
            .into_iter()
            .filter(|t| t.kind != TokenKind::RecordEnd)
            .map(|t| t.data)
            .collect();
        let status = fields.pop().ok_or(ProtocolError::EmptyReply)?;
        let status = String::from_utf8_lossy(&status).parse()?;
        Ok(Self { fields, status })
    }

    /// Interprets the first field as a count.
    pub fn count(&self) -> Option<u64> {
        let first = self.fields.first()?;
        std::str::from_utf8(first).ok()?.parse().ok()
    }
}
