//! # tabula-server
//!
//! Network server for Tabula.
//!
//! This crate provides:
//!
//! - **Sessions**: the per-connection command loop that reads query blocks
//!   and writes response blocks.
//!
//! - **Dispatch**: runs a block of queries against the registered tables in
//!   one transaction and turns per-query errors into statuses.
//!
//! - **Server**: the TCP accept loop with a connection cap and graceful
//!   shutdown.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabula_server::{Server, ServerConfig};
//! use tabula_store::Store;
//!
//! let config = ServerConfig::builder().memory_mode(true).build();
//! let store = Arc::new(Store::open_memory_with(config.store_config())?);
//! let registry = Arc::new(config.build_registry()?);
//!
//! let server = Server::bind(&config, store, registry).await?;
//! server.serve().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Server configuration.
pub mod config;

/// Query block execution.
pub mod dispatch;

/// Server error types.
pub mod error;

/// TCP accept loop.
pub mod server;

/// Per-connection command loop.
pub mod session;

pub use config::{ServerConfig, ServerConfigBuilder, TableConfig};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{ServerError, ServerResult};
pub use server::{Server, ServerStats, SessionInfo};
pub use session::{Session, SessionId, SessionLimits, SessionState};
