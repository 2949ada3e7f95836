//! Read and write transactions.

use std::cell::RefCell;
use std::ops::Bound;

use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition, WriteTransaction};

use crate::bucket::{Bucket, BucketMut};
use crate::error::StoreResult;

/// The single redb table holding every bucket.
pub(crate) const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// Read access to the encoded keyspace.
///
/// Implemented by both [`ReadTxn`] and [`WriteTxn`], so code that only reads
/// (lookups, counts) can run inside either kind of transaction. The methods
/// operate on raw encoded keys; use [`Bucket`] for the structured view.
pub trait ReadTx {
    /// Point read of an encoded key.
    fn get_raw(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Returns the first entry with `lower <= key < upper`.
    fn first_raw(
        &self,
        lower: Bound<&[u8]>,
        upper: &[u8],
    ) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;
}

fn table_get<T>(table: &T, key: &[u8]) -> StoreResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
}

fn table_first<T>(
    table: &T,
    lower: Bound<&[u8]>,
    upper: &[u8],
) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut range = table.range::<&[u8]>((lower, Bound::Excluded(upper)))?;
    match range.next() {
        Some(entry) => {
            let (key, value) = entry?;
            Ok(Some((key.value().to_vec(), value.value().to_vec())))
        }
        None => Ok(None),
    }
}

// =============================================================================
// Read-only snapshot
// =============================================================================

/// A read-only snapshot transaction.
///
/// The snapshot is consistent as of the moment it was opened; concurrent
/// writers neither block it nor become visible to it.
pub struct ReadTxn {
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
}

impl ReadTxn {
    pub(crate) fn open(txn: &ReadTransaction) -> StoreResult<Self> {
        Ok(Self {
            table: txn.open_table(RECORDS)?,
        })
    }

    /// Returns the top-level bucket `name`, if it exists.
    pub fn bucket(&self, name: &[u8]) -> StoreResult<Option<Bucket<'_>>> {
        Bucket::root(self).bucket(name)
    }
}

impl ReadTx for ReadTxn {
    fn get_raw(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        table_get(&self.table, key)
    }

    fn first_raw(
        &self,
        lower: Bound<&[u8]>,
        upper: &[u8],
    ) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        table_first(&self.table, lower, upper)
    }
}

// =============================================================================
// Write transaction
// =============================================================================

/// A write transaction.
///
/// Writes become visible to other transactions only when the enclosing
/// [`Store::update`](crate::Store::update) or [`Store::batch`](crate::Store::batch)
/// call commits.
pub struct WriteTxn<'a> {
    table: RefCell<Table<'a, &'static [u8], &'static [u8]>>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn open(txn: &'a WriteTransaction) -> StoreResult<Self> {
        Ok(Self {
            table: RefCell::new(txn.open_table(RECORDS)?),
        })
    }

    /// Returns the top-level bucket `name`, if it exists.
    pub fn bucket(&self, name: &[u8]) -> StoreResult<Option<BucketMut<'_, 'a>>> {
        BucketMut::root(self).bucket(name)
    }

    /// Returns the top-level bucket `name`, creating it if needed.
    pub fn create_bucket_if_not_exists(&self, name: &[u8]) -> StoreResult<BucketMut<'_, 'a>> {
        BucketMut::root(self).create_bucket_if_not_exists(name)
    }

    /// Deletes the top-level bucket `name` and everything in it.
    ///
    /// Returns false if the bucket did not exist.
    pub fn delete_bucket(&self, name: &[u8]) -> StoreResult<bool> {
        BucketMut::root(self).delete_bucket(name)
    }

    pub(crate) fn put_raw(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.table.borrow_mut().insert(key, value)?;
        Ok(())
    }

    pub(crate) fn remove_raw(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.table.borrow_mut().remove(key)?.is_some())
    }

    /// Removes every key in `[lower, upper)`; returns how many were removed.
    pub(crate) fn remove_range_raw(&self, lower: &[u8], upper: &[u8]) -> StoreResult<usize> {
        let keys = {
            let table = self.table.borrow();
            let mut keys = Vec::new();
            for entry in table.range::<&[u8]>(lower..upper)? {
                let (key, _) = entry?;
                keys.push(key.value().to_vec());
            }
            keys
        };

        let mut table = self.table.borrow_mut();
        for key in &keys {
            table.remove(key.as_slice())?;
        }
        Ok(keys.len())
    }
}

impl ReadTx for WriteTxn<'_> {
    fn get_raw(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        table_get(&*self.table.borrow(), key)
    }

    fn first_raw(
        &self,
        lower: Bound<&[u8]>,
        upper: &[u8],
    ) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        table_first(&*self.table.borrow(), lower, upper)
    }
}
