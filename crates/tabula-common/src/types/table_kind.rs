//! Table layout kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The storage layout a table name is bound to.
///
/// Every kind answers the same five operations (insert, lookup, delete,
/// count, expire) but encodes keys and indexes differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// `key -> value`, one value per key.
    Simple,
    /// `group -> {field -> value}` with a persisted per-group counter.
    Grouped,
    /// `key -> (value, expiry class)` with a reverse index for range expiry.
    Indexed,
    /// Grouped layout plus a reverse index from expiry class to `(group, field)`.
    GroupedIndexed,
}

impl TableKind {
    /// All kinds, in declaration order.
    pub const ALL: [TableKind; 4] = [
        TableKind::Simple,
        TableKind::Grouped,
        TableKind::Indexed,
        TableKind::GroupedIndexed,
    ];

    /// Returns the configuration name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableKind::Simple => "simple",
            TableKind::Grouped => "grouped",
            TableKind::Indexed => "indexed",
            TableKind::GroupedIndexed => "grouped_indexed",
        }
    }

    /// Returns true if this kind supports range expiry.
    #[must_use]
    pub const fn expires(&self) -> bool {
        matches!(self, TableKind::Indexed | TableKind::GroupedIndexed)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known table kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown table kind: {0}")]
pub struct ParseTableKindError(pub String);

impl FromStr for TableKind {
    type Err = ParseTableKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseTableKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for kind in TableKind::ALL {
            assert_eq!(kind.as_str().parse::<TableKind>().unwrap(), kind);
        }
        assert_eq!("GROUPED".parse::<TableKind>().unwrap(), TableKind::Grouped);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "btree".parse::<TableKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown table kind: btree");
    }

    #[test]
    fn test_expires() {
        assert!(!TableKind::Simple.expires());
        assert!(!TableKind::Grouped.expires());
        assert!(TableKind::Indexed.expires());
        assert!(TableKind::GroupedIndexed.expires());
    }

    #[test]
    fn test_serde_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: TableKind,
        }
        let w: Wrapper = toml::from_str("kind = \"grouped_indexed\"").unwrap();
        assert_eq!(w.kind, TableKind::GroupedIndexed);
    }
}
