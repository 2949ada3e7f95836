//! # tabula-store
//!
//! Ordered transactional bucket store for Tabula.
//!
//! Tables are built from *buckets*: named, ordered collections of byte-string
//! keys and values that can nest further buckets. This crate provides that
//! model on top of a single [`redb`] table and exposes three kinds of
//! transactions:
//!
//! - [`Store::view`]: a read-only snapshot, isolated from concurrent writers
//! - [`Store::update`]: one immediate write transaction
//! - [`Store::batch`]: a write transaction that may be coalesced with other
//!   concurrently submitted writes into a single commit
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Store                             │
//! │   view()            update()              batch()          │
//! │     │                  │                     │             │
//! │     ▼                  ▼                     ▼             │
//! │  ReadTxn           WriteTxn  ◄──────────  Batcher          │
//! │     │                  │           (group commit queue)    │
//! │     ▼                  ▼                                   │
//! │  Bucket            BucketMut                               │
//! │     └────────┬─────────┘                                   │
//! │              ▼                                             │
//! │   path encoding: nested bucket names → ordered flat keys   │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       redb (one table)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tabula_store::{Store, StoreResult};
//!
//! # fn main() -> StoreResult<()> {
//! let store = Store::open_memory()?;
//!
//! store.update(|tx| {
//!     let users = tx.create_bucket_if_not_exists(b"users")?;
//!     users.put(b"alice", b"admin")
//! })?;
//!
//! let role = store.view(|tx| match tx.bucket(b"users")? {
//!     Some(users) => users.get(b"alice"),
//!     None => Ok(None),
//! })?;
//! assert_eq!(role.as_deref(), Some(&b"admin"[..]));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod bucket;
mod config;
mod db;
mod error;
mod path;
mod txn;

pub use batch::BatchStats;
pub use bucket::{Bucket, BucketMut, BucketNames, Cursor};
pub use config::{BatchConfig, StoreConfig};
pub use db::Store;
pub use error::{StoreError, StoreResult};
pub use txn::{ReadTx, ReadTxn, WriteTxn};
