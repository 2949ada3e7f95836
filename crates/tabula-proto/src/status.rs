//! Per-query status keywords.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Outcome of one query, as reported on its response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// A referenced key, field, group or class was absent.
    NotFound,
    /// The record had the wrong number of fields.
    Invalid,
    /// The table name is not registered; the query was skipped.
    NoTable,
    /// Any other failure.
    Fail,
}

impl Status {
    /// Returns the wire keyword.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::NotFound => "!found",
            Status::Invalid => "!valid",
            Status::NoTable => "!table",
            Status::Fail => "fail",
        }
    }

    /// Returns true for [`Status::Ok`].
    pub const fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Status::Ok),
            "!found" => Ok(Status::NotFound),
            "!valid" => Ok(Status::Invalid),
            "!table" => Ok(Status::NoTable),
            "fail" => Ok(Status::Fail),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        for status in [
            Status::Ok,
            Status::NotFound,
            Status::Invalid,
            Status::NoTable,
            Status::Fail,
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert_eq!(Status::NotFound.to_string(), "!found");
        assert!("OK".parse::<Status>().is_err());
    }
}
