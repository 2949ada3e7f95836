//! Grouped counted map.
//!
//! ```text
//! <name>/
//!   data/<group>/   field → value
//!   count/          group → element count
//! ```
//!
//! The count tracks distinct fields: overwriting an existing field leaves it
//! unchanged.

use bytes::Bytes;
use tabula_common::TableKind;
use tabula_store::{ReadTx, WriteTxn};

use super::{check_arity, counter, root, Table};
use crate::error::{TableError, TableResult};

/// Child bucket holding one sub-bucket per group.
pub(crate) const DATA_BUCKET: &[u8] = b"data";

/// A table of groups, each holding `field → value` entries and a persisted
/// element count.
///
/// Records are `group field value`. Counting addresses a whole group.
#[derive(Debug, Clone)]
pub struct GroupedTable {
    name: Bytes,
}

impl GroupedTable {
    /// Creates a grouped table stored under the bucket `name`.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self { name: name.into() }
    }
}

impl Table for GroupedTable {
    fn name(&self) -> &Bytes {
        &self.name
    }

    fn kind(&self) -> TableKind {
        TableKind::Grouped
    }

    fn insert(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 3)?;
        let (group, field, value) = (&fields[0], &fields[1], &fields[2]);

        let table = tx.create_bucket_if_not_exists(&self.name)?;
        let data = table
            .create_bucket_if_not_exists(DATA_BUCKET)?
            .create_bucket_if_not_exists(group)?;

        let is_new = !data.contains(field)?;
        data.put(field, value)?;
        if is_new {
            counter::increment(&table, group)?;
        }
        Ok(())
    }

    fn lookup(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<Vec<Bytes>> {
        check_arity(fields, 2)?;
        let value = root(tx, &self.name)?
            .map(|t| t.bucket(DATA_BUCKET))
            .transpose()?
            .flatten()
            .map(|d| d.bucket(&fields[0]))
            .transpose()?
            .flatten()
            .map(|g| g.get(&fields[1]))
            .transpose()?
            .flatten()
            .ok_or(TableError::NotFound)?;
        Ok(vec![Bytes::from(value)])
    }

    fn delete(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 2)?;
        let (group, field) = (&fields[0], &fields[1]);

        let table = tx.bucket(&self.name)?.ok_or(TableError::NotFound)?;
        let groups = table.bucket(DATA_BUCKET)?.ok_or(TableError::NotFound)?;
        let data = groups.bucket(group)?.ok_or(TableError::NotFound)?;
        if !data.contains(field)? {
            return Err(TableError::NotFound);
        }

        counter::decrement(&table, group)?;
        data.delete(field)?;
        if data.is_empty()? {
            groups.delete_bucket(group)?;
        }
        Ok(())
    }

    fn count(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        counter::get(tx, &self.name, &fields[0])
    }

    fn expire(&self, _tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        Ok(0)
    }
}
