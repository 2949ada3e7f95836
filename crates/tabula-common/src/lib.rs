//! # tabula-common
//!
//! Common constants and types shared by all Tabula crates.
//!
//! - **Constants**: network defaults, protocol limits and batching defaults
//! - **Types**: [`TableKind`], the closed set of table layouts a table name can
//!   be registered with
//!
//! ## Example
//!
//! ```rust
//! use tabula_common::{TableKind, DEFAULT_PORT};
//!
//! let kind: TableKind = "indexed".parse().unwrap();
//! assert_eq!(kind, TableKind::Indexed);
//! assert_eq!(DEFAULT_PORT, 7379);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::{ParseTableKindError, TableKind};
