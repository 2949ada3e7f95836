//! # tabula-test
//!
//! Integration tests for Tabula.
//!
//! This crate contains:
//! - A [`TestServer`] harness that runs a real server on a loopback port
//! - End-to-end tests under `tests/`

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tabula_client::{Client, ClientResult};
use tabula_server::{Server, ServerConfig, ServerResult};
use tabula_store::Store;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

const STOP_POLLS: usize = 500;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    addr: SocketAddr,
    store: Arc<Store>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<ServerResult<()>>>,
}

impl TestServer {
    /// Starts an in-memory server with the default tables.
    pub async fn start() -> ServerResult<Self> {
        Self::start_with(ServerConfig::builder().memory_mode(true).build()).await
    }

    /// Starts a server with `config`, overriding the address with
    /// `127.0.0.1:0`.
    ///
    /// The store is file-backed when the configuration names a data
    /// directory and is not in memory mode.
    pub async fn start_with(mut config: ServerConfig) -> ServerResult<Self> {
        config.host = "127.0.0.1".to_string();
        config.port = 0;

        let store_config = config.store_config();
        let store = if store_config.path.is_some() {
            Store::open(store_config)?
        } else {
            Store::open_memory_with(store_config)?
        };
        let store = Arc::new(store);
        let registry = Arc::new(config.build_registry()?);

        let server = Server::bind(&config, Arc::clone(&store), registry).await?;
        let addr = server.local_addr()?;
        debug!(%addr, "test server started");

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            store,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    /// Returns the listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the server's store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Connects a new client.
    pub async fn connect(&self) -> ClientResult<Client> {
        Client::connect(self.addr).await
    }

    /// Stops accepting connections, then waits for open sessions to release
    /// the store so the database file can be reopened.
    pub async fn stop(mut self) -> ServerResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await??;
        }
        for _ in 0..STOP_POLLS {
            if Arc::strong_count(&self.store) == 1 {
                break;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
