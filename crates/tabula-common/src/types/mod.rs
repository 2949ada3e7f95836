//! Shared types.

mod table_kind;

pub use table_kind::{ParseTableKindError, TableKind};
