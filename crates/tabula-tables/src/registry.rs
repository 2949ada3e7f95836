//! Table registry.

use std::collections::BTreeMap;

use bytes::Bytes;
use tabula_common::constants::{
    DEFAULT_GROUPED_INDEXED_TABLE, DEFAULT_GROUPED_TABLE, DEFAULT_INDEXED_TABLE,
    DEFAULT_SIMPLE_TABLE,
};
use tabula_common::TableKind;

use crate::error::{TableError, TableResult};
use crate::table::{new_table, Table};

/// Maps table names to table instances.
///
/// Built once at startup and shared read-only afterwards. Looking up an
/// unknown name never touches storage.
#[derive(Debug, Default)]
pub struct Registry {
    tables: BTreeMap<Bytes, Box<dyn Table>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the four default tables:
    /// `bag` (simple), `group` (grouped), `bug` (indexed) and `gbug`
    /// (grouped, indexed).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, kind) in Self::default_tables() {
            registry.tables.insert(Bytes::from_static(name.as_bytes()), new_table(name, kind));
        }
        registry
    }

    /// Returns the default `(name, kind)` registrations.
    pub fn default_tables() -> [(&'static str, TableKind); 4] {
        [
            (DEFAULT_SIMPLE_TABLE, TableKind::Simple),
            (DEFAULT_GROUPED_TABLE, TableKind::Grouped),
            (DEFAULT_INDEXED_TABLE, TableKind::Indexed),
            (DEFAULT_GROUPED_INDEXED_TABLE, TableKind::GroupedIndexed),
        ]
    }

    /// Builds a registry from `(name, kind)` pairs.
    pub fn from_tables<I, N>(tables: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = (N, TableKind)>,
        N: Into<Bytes>,
    {
        let mut registry = Self::new();
        for (name, kind) in tables {
            registry.register(name, kind)?;
        }
        Ok(registry)
    }

    /// Registers a table. Fails if the name is already taken.
    pub fn register(&mut self, name: impl Into<Bytes>, kind: TableKind) -> TableResult<()> {
        let name = name.into();
        if self.tables.contains_key(&name) {
            return Err(TableError::DuplicateTable {
                name: String::from_utf8_lossy(&name).into_owned(),
            });
        }
        self.tables.insert(name.clone(), new_table(name, kind));
        Ok(())
    }

    /// Returns the table registered as `name`.
    pub fn get(&self, name: &[u8]) -> Option<&dyn Table> {
        self.tables.get(name).map(|t| &**t)
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &[u8]) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the registered tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &dyn Table> {
        self.tables.values().map(|t| &**t)
    }

    /// Returns the number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
