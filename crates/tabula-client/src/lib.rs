//! # tabula-client
//!
//! Client library for Tabula.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabula_client::Client;
//! use tabula_proto::Query;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("127.0.0.1:7379").await?;
//!     client.ping().await?;
//!
//!     client.record(&[Query::new("bag", ["k1", "v1"])]).await?;
//!     let replies = client.lookup(&[Query::new("bag", ["k1"])]).await?;
//!     assert!(replies[0].status.is_ok());
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;

/// Client connection.
pub mod client;

pub use client::{Client, ClientConfig, ClientStats};
pub use error::{ClientError, ClientResult, ConnectionState};
pub use tabula_proto::{Query, Reply, Status};
