//! Simple map: unique key to a single value.

use bytes::Bytes;
use tabula_common::TableKind;
use tabula_store::{ReadTx, WriteTxn};

use super::{check_arity, root, Table};
use crate::error::{TableError, TableResult};

/// A table mapping each key to one value.
///
/// Records are `key value`. The table has no expiry concept, so
/// [`Table::expire`] only validates its argument.
#[derive(Debug, Clone)]
pub struct SimpleTable {
    name: Bytes,
}

impl SimpleTable {
    /// Creates a simple table stored under the bucket `name`.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self { name: name.into() }
    }
}

impl Table for SimpleTable {
    fn name(&self) -> &Bytes {
        &self.name
    }

    fn kind(&self) -> TableKind {
        TableKind::Simple
    }

    fn insert(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 2)?;
        let table = tx.create_bucket_if_not_exists(&self.name)?;
        table.put(&fields[0], &fields[1])?;
        Ok(())
    }

    fn lookup(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<Vec<Bytes>> {
        check_arity(fields, 1)?;
        let table = root(tx, &self.name)?.ok_or(TableError::NotFound)?;
        let value = table.get(&fields[0])?.ok_or(TableError::NotFound)?;
        Ok(vec![Bytes::from(value)])
    }

    fn delete(&self, tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<()> {
        check_arity(fields, 1)?;
        let table = tx.bucket(&self.name)?.ok_or(TableError::NotFound)?;
        if !table.delete(&fields[0])? {
            return Err(TableError::NotFound);
        }
        Ok(())
    }

    fn count(&self, tx: &dyn ReadTx, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        match root(tx, &self.name)? {
            Some(table) => Ok(u64::from(table.contains(&fields[0])?)),
            None => Ok(0),
        }
    }

    fn expire(&self, _tx: &WriteTxn<'_>, fields: &[Bytes]) -> TableResult<u64> {
        check_arity(fields, 1)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn test_insert_lookup_overwrite() {
        let store = memory_store();
        let table = SimpleTable::new("bag");

        insert(&store, &table, &["k1", "v1"]).unwrap();
        assert_eq!(lookup(&store, &table, &["k1"]).unwrap(), fields(&["v1"]));

        insert(&store, &table, &["k1", "v2"]).unwrap();
        assert_eq!(lookup(&store, &table, &["k1"]).unwrap(), fields(&["v2"]));
    }

    #[test]
    fn test_missing_table_and_key() {
        let store = memory_store();
        let table = SimpleTable::new("bag");

        assert!(lookup(&store, &table, &["k1"]).unwrap_err().is_not_found());
        assert!(delete(&store, &table, &["k1"]).unwrap_err().is_not_found());
        assert_eq!(count(&store, &table, &["k1"]).unwrap(), 0);

        insert(&store, &table, &["k2", "v"]).unwrap();
        assert!(lookup(&store, &table, &["k1"]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_and_count() {
        let store = memory_store();
        let table = SimpleTable::new("bag");

        insert(&store, &table, &["k1", "v1"]).unwrap();
        assert_eq!(count(&store, &table, &["k1"]).unwrap(), 1);

        delete(&store, &table, &["k1"]).unwrap();
        assert_eq!(count(&store, &table, &["k1"]).unwrap(), 0);
        assert!(lookup(&store, &table, &["k1"]).unwrap_err().is_not_found());
        assert!(delete(&store, &table, &["k1"]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_value_is_present() {
        let store = memory_store();
        let table = SimpleTable::new("bag");

        insert(&store, &table, &["k", ""]).unwrap();
        assert_eq!(lookup(&store, &table, &["k"]).unwrap(), vec![Bytes::new()]);
        assert_eq!(count(&store, &table, &["k"]).unwrap(), 1);
    }

    #[test]
    fn test_expire_is_noop() {
        let store = memory_store();
        let table = SimpleTable::new("bag");

        insert(&store, &table, &["k", "v"]).unwrap();
        assert_eq!(expire(&store, &table, &["zzzz"]).unwrap(), 0);
        assert_eq!(lookup(&store, &table, &["k"]).unwrap(), fields(&["v"]));
    }
}
