//! # tabula-tables
//!
//! Table layouts for Tabula.
//!
//! A table is a named collection of records stored under one top-level
//! bucket. Four layouts are provided, each implementing the [`Table`] trait:
//!
//! | Kind | Insert fields | Layout |
//! |---|---|---|
//! | [`SimpleTable`] | key, value | `key → value` |
//! | [`GroupedTable`] | group, field, value | `data/<group>: field → value`, `count: group → n` |
//! | [`IndexedTable`] | key, value, class | `fwd: key → (value, class)`, `bak/<class>: key` |
//! | [`GroupedIndexedTable`] | group, field, value, class | grouped layout plus `expiry/<class>: (group, field)` |
//!
//! Every operation receives the caller's transaction and reads or writes only
//! through it; tables hold no state between calls. The [`Registry`] maps
//! table names to instances.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use tabula_store::Store;
//! use tabula_tables::{Registry, TableError};
//!
//! # fn main() -> Result<(), TableError> {
//! let store = Store::open_memory()?;
//! let registry = Registry::with_defaults();
//! let bag = registry.get(b"bag").unwrap();
//!
//! store.update(|tx| bag.insert(tx, &[Bytes::from("k1"), Bytes::from("v1")]))?;
//! let value = store.view(|tx| bag.lookup(tx, &[Bytes::from("k1")]))?;
//! assert_eq!(value, vec![Bytes::from("v1")]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
mod error;
mod registry;
mod table;

pub use error::{TableError, TableResult};
pub use registry::Registry;
pub use table::{
    new_table, GroupedIndexedTable, GroupedTable, IndexedTable, SimpleTable, Table,
};
