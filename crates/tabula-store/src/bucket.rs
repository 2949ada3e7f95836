//! Bucket handles and cursors.
//!
//! A bucket handle is a transaction reference plus the encoded prefix of the
//! bucket's path (see the `path` module). Handles are cheap and hold no
//! snapshot state of their own; everything is read through the transaction.

use std::ops::Bound;

use crate::error::StoreResult;
use crate::path;
use crate::txn::{ReadTx, WriteTxn};

fn get(tx: &dyn ReadTx, prefix: &[u8], key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
    tx.get_raw(&path::value_key(prefix, key))
}

fn has_bucket(tx: &dyn ReadTx, child: &[u8]) -> StoreResult<bool> {
    Ok(tx.get_raw(child)?.is_some())
}

fn is_empty(tx: &dyn ReadTx, prefix: &[u8]) -> StoreResult<bool> {
    let lower = path::tagged(prefix, path::VALUE_TAG);
    let upper = path::subtree_end(prefix);
    Ok(tx.first_raw(Bound::Included(lower.as_slice()), &upper)?.is_none())
}

// =============================================================================
// Read handle
// =============================================================================

/// Read-only handle to a bucket.
pub struct Bucket<'t> {
    tx: &'t dyn ReadTx,
    prefix: Vec<u8>,
}

impl<'t> Bucket<'t> {
    /// Returns the root bucket of a transaction.
    pub fn root(tx: &'t dyn ReadTx) -> Self {
        Self {
            tx,
            prefix: Vec::new(),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        get(self.tx, &self.prefix, key)
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns the child bucket `name`, if it exists.
    pub fn bucket(&self, name: &[u8]) -> StoreResult<Option<Bucket<'t>>> {
        let child = path::child_prefix(&self.prefix, name);
        if !has_bucket(self.tx, &child)? {
            return Ok(None);
        }
        Ok(Some(Bucket {
            tx: self.tx,
            prefix: child,
        }))
    }

    /// Returns true if the bucket holds no values and no child buckets.
    pub fn is_empty(&self) -> StoreResult<bool> {
        is_empty(self.tx, &self.prefix)
    }

    /// Returns a cursor over the bucket's values in ascending key order.
    pub fn cursor(&self) -> Cursor<'t> {
        Cursor::new(self.tx, &self.prefix)
    }

    /// Returns an iterator over the names of the child buckets in ascending
    /// order.
    pub fn buckets(&self) -> BucketNames<'t> {
        BucketNames::new(self.tx, &self.prefix)
    }
}

impl std::fmt::Debug for Bucket<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket").field("prefix", &self.prefix).finish()
    }
}

// =============================================================================
// Write handle
// =============================================================================

/// Read-write handle to a bucket inside a [`WriteTxn`].
pub struct BucketMut<'t, 'a> {
    tx: &'t WriteTxn<'a>,
    prefix: Vec<u8>,
}

impl<'t, 'a> BucketMut<'t, 'a> {
    /// Returns the root bucket of a write transaction.
    pub fn root(tx: &'t WriteTxn<'a>) -> Self {
        Self {
            tx,
            prefix: Vec::new(),
        }
    }

    /// Returns a read-only view of this bucket.
    pub fn as_bucket(&self) -> Bucket<'t> {
        Bucket {
            tx: self.tx,
            prefix: self.prefix.clone(),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        get(self.tx, &self.prefix, key)
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tx.put_raw(&path::value_key(&self.prefix, key), value)
    }

    /// Removes `key`. Returns false if it was not present.
    pub fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        self.tx.remove_raw(&path::value_key(&self.prefix, key))
    }

    /// Returns the child bucket `name`, if it exists.
    pub fn bucket(&self, name: &[u8]) -> StoreResult<Option<BucketMut<'t, 'a>>> {
        let child = path::child_prefix(&self.prefix, name);
        if !has_bucket(self.tx, &child)? {
            return Ok(None);
        }
        Ok(Some(BucketMut {
            tx: self.tx,
            prefix: child,
        }))
    }

    /// Returns the child bucket `name`, creating it if needed.
    pub fn create_bucket_if_not_exists(&self, name: &[u8]) -> StoreResult<BucketMut<'t, 'a>> {
        let child = path::child_prefix(&self.prefix, name);
        if !has_bucket(self.tx, &child)? {
            self.tx.put_raw(&child, &[])?;
        }
        Ok(BucketMut {
            tx: self.tx,
            prefix: child,
        })
    }

    /// Deletes the child bucket `name` with all of its values and children.
    ///
    /// Returns false if the bucket did not exist.
    pub fn delete_bucket(&self, name: &[u8]) -> StoreResult<bool> {
        let child = path::child_prefix(&self.prefix, name);
        if !has_bucket(self.tx, &child)? {
            return Ok(false);
        }
        let removed = self.tx.remove_range_raw(&child, &path::subtree_end(&child))?;
        tracing::trace!(entries = removed, "deleted bucket");
        Ok(true)
    }

    /// Returns true if the bucket holds no values and no child buckets.
    pub fn is_empty(&self) -> StoreResult<bool> {
        is_empty(self.tx, &self.prefix)
    }

    /// Returns a cursor over the bucket's values in ascending key order.
    ///
    /// The cursor re-seeks on every step, so entries may be deleted while
    /// iterating.
    pub fn cursor(&self) -> Cursor<'t> {
        Cursor::new(self.tx, &self.prefix)
    }

    /// Returns an iterator over the names of the child buckets in ascending
    /// order. Child buckets may be deleted while iterating.
    pub fn buckets(&self) -> BucketNames<'t> {
        BucketNames::new(self.tx, &self.prefix)
    }
}

impl std::fmt::Debug for BucketMut<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketMut").field("prefix", &self.prefix).finish()
    }
}

// =============================================================================
// Cursors
// =============================================================================

/// Ascending cursor over the values of one bucket.
///
/// Each step seeks strictly past the previously returned key instead of
/// holding a storage iterator open.
pub struct Cursor<'t> {
    tx: &'t dyn ReadTx,
    prefix_len: usize,
    lower: Vec<u8>,
    upper: Vec<u8>,
    last: Option<Vec<u8>>,
    done: bool,
}

impl<'t> Cursor<'t> {
    fn new(tx: &'t dyn ReadTx, prefix: &[u8]) -> Self {
        let (lower, upper) = path::values_range(prefix);
        Self {
            tx,
            prefix_len: lower.len(),
            lower,
            upper,
            last: None,
            done: false,
        }
    }

    /// Positions the cursor at the first key `>= key` and returns that entry.
    pub fn seek(&mut self, key: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let mut target = self.lower.clone();
        target.extend_from_slice(key);
        self.done = false;
        self.step(Bound::Included(target.as_slice()))
    }

    /// Positions the cursor at the first entry and returns it.
    pub fn first(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let lower = self.lower.clone();
        self.done = false;
        self.step(Bound::Included(lower.as_slice()))
    }

    fn step(&mut self, lower: Bound<&[u8]>) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        match self.tx.first_raw(lower, &self.upper)? {
            Some((key, value)) => {
                let raw = key[self.prefix_len..].to_vec();
                self.last = Some(key);
                Ok(Some((raw, value)))
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl Iterator for Cursor<'_> {
    type Item = StoreResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.last.take() {
            Some(last) => {
                let out = self.step(Bound::Excluded(last.as_slice()));
                if self.last.is_none() {
                    self.last = Some(last);
                }
                out
            }
            None => self.first(),
        };
        match result {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Ascending iterator over the child bucket names of one bucket.
pub struct BucketNames<'t> {
    tx: &'t dyn ReadTx,
    parent_len: usize,
    next: Vec<u8>,
    upper: Vec<u8>,
    done: bool,
}

impl<'t> BucketNames<'t> {
    fn new(tx: &'t dyn ReadTx, prefix: &[u8]) -> Self {
        let (lower, upper) = path::children_range(prefix);
        Self {
            tx,
            parent_len: prefix.len(),
            next: lower,
            upper,
            done: false,
        }
    }

    fn advance(&mut self) -> StoreResult<Option<Vec<u8>>> {
        let Some((key, _)) = self
            .tx
            .first_raw(Bound::Included(self.next.as_slice()), &self.upper)? else {
            return Ok(None);
        };
        // The first key of every child subtree is the child's marker.
        let segment = &key[self.parent_len + 1..];
        let Some((name, used)) = path::decode_segment(segment) else {
            return Ok(None);
        };
        let marker = &key[..self.parent_len + 1 + used];
        self.next = path::subtree_end(marker);
        Ok(Some(name))
    }
}

impl Iterator for BucketNames<'_> {
    type Item = StoreResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(name)) => Some(Ok(name)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
