//! The table operation contract and its four layouts.

use std::fmt;

use bytes::Bytes;
use tabula_common::TableKind;
use tabula_store::{Bucket, ReadTx, WriteTxn};

use crate::error::{TableError, TableResult};

mod counter;
mod grouped;
mod grouped_indexed;
mod indexed;
mod simple;

pub use grouped::GroupedTable;
pub use grouped_indexed::GroupedIndexedTable;
pub use indexed::IndexedTable;
pub use simple::SimpleTable;

/// Value stored in reverse-index buckets; only key presence matters.
pub(crate) const MARKER: &[u8] = b"";

/// Uniform operation contract shared by every table layout.
///
/// Write operations take the enclosing write transaction, read operations
/// take any transaction. Each operation validates the number of record
/// fields first and fails with [`TableError::BadRecord`] on a mismatch,
/// before touching storage.
pub trait Table: Send + Sync + fmt::Debug {
    /// Returns the table name, which is also its top-level bucket.
    fn name(&self) -> &Bytes;

    /// Returns the layout of this table.
    fn kind(&self) -> TableKind;

    /// Inserts or overwrites a record.
    fn insert(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()>;

    /// Looks up a record and returns its result fields.
    fn lookup(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<Vec<Bytes>>;

    /// Deletes a record.
    fn delete(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()>;

    /// Counts the records addressed by `fields`.
    fn count(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<u64>;

    /// Removes every record whose expiry class is `<=` the threshold in
    /// `fields`, returning how many records were removed.
    fn expire(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<u64>;
}

/// Creates a table of `kind` stored under the bucket `name`.
pub fn new_table(name: impl Into<Bytes>, kind: TableKind) -> Box<dyn Table> {
    let name = name.into();
    match kind {
        TableKind::Simple => Box::new(SimpleTable::new(name)),
        TableKind::Grouped => Box::new(GroupedTable::new(name)),
        TableKind::Indexed => Box::new(IndexedTable::new(name)),
        TableKind::GroupedIndexed => Box::new(GroupedIndexedTable::new(name)),
    }
}

/// Fails with `BadRecord` unless `fields` has exactly `expected` entries.
pub(crate) fn check_arity(fields: &[Bytes], expected: usize) -> TableResult<()> {
    if fields.len() != expected {
        return Err(TableError::BadRecord {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

/// Opens the table's top-level bucket for reading.
pub(crate) fn root<'t>(tx: &'t dyn ReadTx, name: &[u8]) -> TableResult<Option<Bucket<'t>>> {
    Ok(Bucket::root(tx).bucket(name)?)
}

#[cfg(test)]
pub(crate) mod testing {
    use bytes::Bytes;
    use tabula_store::Store;

    use super::Table;
    use crate::error::TableResult;

    pub(crate) fn fields(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect()
    }

    pub(crate) fn insert(store: &Store, table: &dyn Table, items: &[&str]) -> TableResult<()> {
        store.update(|tx| table.insert(tx, &fields(items)))
    }

    pub(crate) fn lookup(store: &Store, table: &dyn Table, items: &[&str]) -> TableResult<Vec<Bytes>> {
        store.view(|tx| table.lookup(tx, &fields(items)))
    }

    pub(crate) fn delete(store: &Store, table: &dyn Table, items: &[&str]) -> TableResult<()> {
        store.update(|tx| table.delete(tx, &fields(items)))
    }

    pub(crate) fn count(store: &Store, table: &dyn Table, items: &[&str]) -> TableResult<u64> {
        store.view(|tx| table.count(tx, &fields(items)))
    }

    pub(crate) fn expire(store: &Store, table: &dyn Table, items: &[&str]) -> TableResult<u64> {
        store.update(|tx| table.expire(tx, &fields(items)))
    }

    /// Returns the names of the child buckets under `table/<path...>`.
    pub(crate) fn children(store: &Store, table: &str, path: &[&str]) -> Vec<String> {
        store
            .view(|tx| {
                let Some(mut bucket) = tx.bucket(table.as_bytes())? else {
                    return Ok(Vec::new());
                };
                for name in path {
                    match bucket.bucket(name.as_bytes())? {
                        Some(child) => bucket = child,
                        None => return Ok(Vec::new()),
                    }
                }
                bucket
                    .buckets()
                    .map(|name| name.map(|n| String::from_utf8_lossy(&n).into_owned()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .unwrap_or_else(|e: tabula_store::StoreError| panic!("view failed: {e}"))
    }

    pub(crate) fn memory_store() -> Store {
        Store::open_memory().unwrap()
    }
}
