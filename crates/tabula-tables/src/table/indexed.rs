//! Reverse-indexed map with range expiry.
//!
//! ```text
//! <name>/
//!   fwd/            key → (value, class)
//!   bak/<class>/    key → marker
//! ```
//!
//! Expiry walks `bak` in ascending class order and stops at the first class
//! above the threshold. Re-inserting a key under a different class moves
//! its `bak` entry, so no stale index entry survives the overwrite.

use bytes::Bytes;
use tabula_common::TableKind;
use tabula_store::{BucketMut, ReadTx, WriteTxn};
use tracing::trace;

use super::{check_arity, root, Table, MARKER};
use crate::codec;
use crate::error::{TableError, TableResult};

const FWD_BUCKET: &[u8] = b"fwd";
const BAK_BUCKET: &[u8] = b"bak";

/// A table mapping keys to `(value, expiry class)` with a reverse index from
/// class to keys.
///
/// Records are `key value class`. Lookup returns `[value, class]`.
#[derive(Debug, Clone)]
pub struct IndexedTable {
    name: Bytes,
}

impl IndexedTable {
    /// Creates an indexed table stored under the bucket `name`.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self { name: name.into() }
    }
}

/// Removes `key` from the reverse bucket of `class`, pruning the class bucket
/// once it is empty.
fn unlink(bak: &BucketMut<'_, '_>, class: &[u8], key: &[u8]) -> TableResult<()> {
    if let Some(keys) = bak.bucket(class)? {
        keys.delete(key)?;
        if keys.is_empty()? {
            bak.delete_bucket(class)?;
        }
    }
    Ok(())
}

impl Table for IndexedTable {
    fn name(&self) -> &Bytes {
        &self.name
    }

    fn kind(&self) -> TableKind {
        TableKind::Indexed
    }

    fn insert(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 3)?;
        let (key, value, class) = (&fields[0], &fields[1], &fields[2]);
        let entry = codec::encode_pair(value, class)?;

        let table = tx.create_bucket_if_not_exists(&self.name)?;
        let fwd = table.create_bucket_if_not_exists(FWD_BUCKET)?;
        let bak = table.create_bucket_if_not_exists(BAK_BUCKET)?;

        let previous = match fwd.get(key)? {
            Some(raw) => Some(codec::decode_pair(Bytes::from(raw))?.1),
            None => None,
        };
        if let Some(old) = previous.filter(|old| old != class) {
            unlink(&bak, &old, key)?;
        }

        bak.create_bucket_if_not_exists(class)?.put(key, MARKER)?;
        fwd.put(key, &entry)?;
        Ok(())
    }

    fn lookup(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<Vec<Bytes>> {
        check_arity(fields, 1)?;
        let fwd = root(tx, &self.name)?
            .map(|t| t.bucket(FWD_BUCKET))
            .transpose()?
            .flatten()
            .ok_or(TableError::NotFound)?;
        let raw = fwd.get(&fields[0])?.ok_or(TableError::NotFound)?;
        let (value, class) = codec::decode_pair(Bytes::from(raw))?;
        Ok(vec![value, class])
    }

    fn delete(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 1)?;
        let key = &fields[0];

        let table = tx.bucket(&self.name)?.ok_or(TableError::NotFound)?;
        let fwd = table.bucket(FWD_BUCKET)?.ok_or(TableError::NotFound)?;
        let bak = table.bucket(BAK_BUCKET)?.ok_or(TableError::NotFound)?;
        let raw = fwd.get(key)?.ok_or(TableError::NotFound)?;
        let (_, class) = codec::decode_pair(Bytes::from(raw))?;

        unlink(&bak, &class, key)?;
        fwd.delete(key)?;
        Ok(())
    }

    fn count(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        let Some(table) = root(tx, &self.name)? else {
            return Ok(0);
        };
        match table.bucket(FWD_BUCKET)? {
            Some(fwd) => Ok(u64::from(fwd.contains(&fields[0])?)),
            None => Ok(0),
        }
    }

    fn expire(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        let threshold = &fields[0];

        let table = tx.bucket(&self.name)?.ok_or(TableError::NotFound)?;
        let fwd = table.bucket(FWD_BUCKET)?.ok_or(TableError::NotFound)?;
        let bak = table.bucket(BAK_BUCKET)?.ok_or(TableError::NotFound)?;

        let mut removed = 0;
        for class in bak.buckets() {
            let class = class?;
            if class.as_slice() > &threshold[..] {
                break;
            }
            if let Some(keys) = bak.bucket(&class)? {
                for entry in keys.cursor() {
                    let (key, _) = entry?;
                    if fwd.delete(&key)? {
                        removed += 1;
                    }
                }
            }
            bak.delete_bucket(&class)?;
            trace!(class = %String::from_utf8_lossy(&class), "expired class");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn test_insert_lookup() {
        let store = memory_store();
        let table = IndexedTable::new("bug");

        insert(&store, &table, &["k1", "v1", "2024-01"]).unwrap();
        assert_eq!(
            lookup(&store, &table, &["k1"]).unwrap(),
            fields(&["v1", "2024-01"])
        );
        assert_eq!(count(&store, &table, &["k1"]).unwrap(), 1);
        assert_eq!(count(&store, &table, &["k2"]).unwrap(), 0);
    }

    #[test]
    fn test_expire_up_to_threshold() {
        let store = memory_store();
        let table = IndexedTable::new("bug");

        insert(&store, &table, &["k1", "v1", "2024-01"]).unwrap();
        insert(&store, &table, &["k2", "v2", "2024-02"]).unwrap();
        insert(&store, &table, &["k3", "v3", "2024-03"]).unwrap();
        insert(&store, &table, &["k4", "v4", "2024-01"]).unwrap();

        assert_eq!(expire(&store, &table, &["2024-02"]).unwrap(), 3);

        for key in ["k1", "k2", "k4"] {
            assert!(lookup(&store, &table, &[key]).unwrap_err().is_not_found());
        }
        assert_eq!(
            lookup(&store, &table, &["k3"]).unwrap(),
            fields(&["v3", "2024-03"])
        );
        assert_eq!(children(&store, "bug", &["bak"]), vec!["2024-03"]);
    }

    #[test]
    fn test_expire_threshold_between_classes() {
        let store = memory_store();
        let table = IndexedTable::new("bug");

        insert(&store, &table, &["k1", "v1", "2024-01"]).unwrap();
        assert_eq!(expire(&store, &table, &["2023-12"]).unwrap(), 0);
        assert_eq!(count(&store, &table, &["k1"]).unwrap(), 1);

        // A prefix of a class sorts before it.
        assert_eq!(expire(&store, &table, &["2024"]).unwrap(), 0);
        assert_eq!(expire(&store, &table, &["2024-01-x"]).unwrap(), 1);
        assert!(children(&store, "bug", &["bak"]).is_empty());
    }

    #[test]
    fn test_expire_missing_table() {
        let store = memory_store();
        let table = IndexedTable::new("bug");
        assert!(expire(&store, &table, &["2024"]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_unlinks_reverse_entry() {
        let store = memory_store();
        let table = IndexedTable::new("bug");

        insert(&store, &table, &["k1", "v1", "c1"]).unwrap();
        insert(&store, &table, &["k2", "v2", "c1"]).unwrap();

        delete(&store, &table, &["k1"]).unwrap();
        assert!(lookup(&store, &table, &["k1"]).unwrap_err().is_not_found());
        assert!(delete(&store, &table, &["k1"]).unwrap_err().is_not_found());
        assert_eq!(children(&store, "bug", &["bak"]), vec!["c1"]);

        // Expiry only sees the key that is still live.
        assert_eq!(expire(&store, &table, &["c1"]).unwrap(), 1);

        insert(&store, &table, &["k3", "v3", "c2"]).unwrap();
        delete(&store, &table, &["k3"]).unwrap();
        assert!(children(&store, "bug", &["bak"]).is_empty());
    }

    #[test]
    fn test_reinsert_moves_class() {
        let store = memory_store();
        let table = IndexedTable::new("bug");

        insert(&store, &table, &["k1", "v1", "2024-01"]).unwrap();
        insert(&store, &table, &["k1", "v2", "2024-05"]).unwrap();
        assert_eq!(children(&store, "bug", &["bak"]), vec!["2024-05"]);

        // Expiring the old class must not touch the re-inserted key.
        assert_eq!(expire(&store, &table, &["2024-03"]).unwrap(), 0);
        assert_eq!(
            lookup(&store, &table, &["k1"]).unwrap(),
            fields(&["v2", "2024-05"])
        );
    }

    #[test]
    fn test_empty_fields() {
        let store = memory_store();
        let table = IndexedTable::new("bug");

        insert(&store, &table, &["k", "", ""]).unwrap();
        assert_eq!(lookup(&store, &table, &["k"]).unwrap(), fields(&["", ""]));
        assert_eq!(expire(&store, &table, &[""]).unwrap(), 1);
        assert_eq!(count(&store, &table, &["k"]).unwrap(), 0);
    }
}
