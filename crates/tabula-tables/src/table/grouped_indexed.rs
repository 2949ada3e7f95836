//! Grouped, reverse-indexed map.
//!
//! ```text
//! <name>/
//!   data/<group>/     field → (value, class)
//!   count/            group → element count
//!   expiry/<class>/   (group, field) → marker
//! ```
//!
//! As in the grouped and indexed tables, overwrites neither inflate the
//! count nor leave a stale expiry entry.

use bytes::Bytes;
use tabula_common::TableKind;
use tabula_store::{BucketMut, ReadTx, WriteTxn};
use tracing::{trace, warn};

use super::grouped::DATA_BUCKET;
use super::{check_arity, counter, root, Table, MARKER};
use crate::codec;
use crate::error::{TableError, TableResult};

const EXPIRY_BUCKET: &[u8] = b"expiry";

/// A grouped table whose entries also carry an expiry class.
///
/// Records are `group field value class`. Counting addresses a group, lookup
/// returns `[value, class]` and expiry removes `(group, field)` pairs by
/// class.
#[derive(Debug, Clone)]
pub struct GroupedIndexedTable {
    name: Bytes,
}

impl GroupedIndexedTable {
    /// Creates a grouped, indexed table stored under the bucket `name`.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self { name: name.into() }
    }
}

/// Removes `field` from `group`: data entry, group counter and, when empty,
/// the group bucket. Returns false if the field was not present.
fn remove_field(table: &BucketMut<'_, '_>, group: &[u8], field: &[u8]) -> TableResult<bool> {
    let Some(groups) = table.bucket(DATA_BUCKET)? else {
        return Ok(false);
    };
    let Some(data) = groups.bucket(group)? else {
        return Ok(false);
    };
    if !data.contains(field)? {
        return Ok(false);
    }

    counter::decrement(table, group)?;
    data.delete(field)?;
    if data.is_empty()? {
        groups.delete_bucket(group)?;
    }
    Ok(true)
}

/// Removes the reverse entry of `(group, field)` under `class`.
fn unlink(table: &BucketMut<'_, '_>, class: &[u8], group: &[u8], field: &[u8]) -> TableResult<()> {
    let Some(expiry) = table.bucket(EXPIRY_BUCKET)? else {
        return Ok(());
    };
    if let Some(pairs) = expiry.bucket(class)? {
        pairs.delete(&codec::encode_pair(group, field)?)?;
        if pairs.is_empty()? {
            expiry.delete_bucket(class)?;
        }
    }
    Ok(())
}

impl Table for GroupedIndexedTable {
    fn name(&self) -> &Bytes {
        &self.name
    }

    fn kind(&self) -> TableKind {
        TableKind::GroupedIndexed
    }

    fn insert(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 4)?;
        let (group, field, value, class) = (&fields[0], &fields[1], &fields[2], &fields[3]);
        let entry = codec::encode_pair(value, class)?;
        let reverse = codec::encode_pair(group, field)?;

        let table = tx.create_bucket_if_not_exists(&self.name)?;
        let data = table
            .create_bucket_if_not_exists(DATA_BUCKET)?
            .create_bucket_if_not_exists(group)?;

        let previous = match data.get(field)? {
            Some(raw) => Some(codec::decode_pair(Bytes::from(raw))?.1),
            None => None,
        };
        match previous {
            None => counter::increment(&table, group)?,
            Some(old) if old != *class => unlink(&table, &old, group, field)?,
            Some(_) => {}
        }

        data.put(field, &entry)?;
        table
            .create_bucket_if_not_exists(EXPIRY_BUCKET)?
            .create_bucket_if_not_exists(class)?
            .put(&reverse, MARKER)?;
        Ok(())
    }

    fn lookup(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<Vec<Bytes>> {
        check_arity(fields, 2)?;
        let data = root(tx, &self.name)?
            .map(|t| t.bucket(DATA_BUCKET))
            .transpose()?
            .flatten()
            .map(|d| d.bucket(&fields[0]))
            .transpose()?
            .flatten()
            .ok_or(TableError::NotFound)?;
        let raw = data.get(&fields[1])?.ok_or(TableError::NotFound)?;
        let (value, class) = codec::decode_pair(Bytes::from(raw))?;
        Ok(vec![value, class])
    }

    fn delete(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 2)?;
        let (group, field) = (&fields[0], &fields[1]);

        let table = tx.bucket(&self.name)?.ok_or(TableError::NotFound)?;
        let raw = table
            .bucket(DATA_BUCKET)?
            .map(|d| d.bucket(group))
            .transpose()?
            .flatten()
            .map(|g| g.get(field))
            .transpose()?
            .flatten()
            .ok_or(TableError::NotFound)?;
        let (_, class) = codec::decode_pair(Bytes::from(raw))?;

        remove_field(&table, group, field)?;
        unlink(&table, &class, group, field)?;
        Ok(())
    }

    fn count(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        counter::get(tx, &self.name, &fields[0])
    }

    fn expire(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        let threshold = &fields[0];

        let table = tx.bucket(&self.name)?.ok_or(TableError::NotFound)?;
        let expiry = table.bucket(EXPIRY_BUCKET)?.ok_or(TableError::NotFound)?;

        let mut removed = 0;
        for class in expiry.buckets() {
            let class = class?;
            if class.as_slice() > &threshold[..] {
                break;
            }
            if let Some(pairs) = expiry.bucket(&class)? {
                for entry in pairs.cursor() {
                    let (pair, _) = entry?;
                    let (group, field) = match codec::decode_pair(Bytes::from(pair)) {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "skipping unreadable expiry entry");
                            continue;
                        }
                    };
                    if remove_field(&table, &group, &field)? {
                        removed += 1;
                    }
                }
            }
            expiry.delete_bucket(&class)?;
            trace!(class = %String::from_utf8_lossy(&class), "expired class");
        }
        Ok(removed)
    }
}
