//! TCP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tabula_store::Store;
use tabula_tables::Registry;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::session::{Session, SessionId, SessionLimits};

/// A connected client.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Remote address.
    pub peer: SocketAddr,
    /// When the connection was accepted.
    pub connected_at: Instant,
}

/// Server statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerStats {
    /// Currently open sessions.
    pub active_sessions: usize,
    /// Sessions accepted since start.
    pub total_sessions: u64,
}

#[derive(Debug)]
struct Shared {
    dispatcher: Dispatcher,
    limits: SessionLimits,
    sessions: DashMap<SessionId, SessionInfo>,
    total_sessions: AtomicU64,
}

/// Accepts connections and runs one [`Session`] per client.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    permits: Arc<Semaphore>,
    shared: Arc<Shared>,
}

impl Server {
    /// Binds to the configured address.
    pub async fn bind(
        config: &ServerConfig,
        store: Arc<Store>,
        registry: Arc<Registry>,
    ) -> ServerResult<Self> {
        if config.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".into()));
        }

        let listener = TcpListener::bind(config.socket_addr()).await?;
        let limits = SessionLimits {
            max_line_bytes: config.max_line_bytes,
            max_block_bytes: config.max_block_bytes,
            ..SessionLimits::default()
        };

        Ok(Self {
            listener,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            shared: Arc::new(Shared {
                dispatcher: Dispatcher::new(store, registry),
                limits,
                sessions: DashMap::new(),
                total_sessions: AtomicU64::new(0),
            }),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns a snapshot of the server statistics.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            active_sessions: self.shared.sessions.len(),
            total_sessions: self.shared.total_sessions.load(Ordering::Relaxed),
        }
    }

    /// Serves connections until the listener fails.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// At most `max_connections` sessions run at once; further clients wait
    /// in the accept backlog. Sessions still open at shutdown are left to
    /// finish on their own.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, "Tabula server listening");

        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = &mut shutdown => break,
            };

            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Accept error: {}", e);
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                shared.handle(stream, peer).await;
                drop(permit);
            });
        }

        let active = self.shared.sessions.len();
        if active > 0 {
            warn!("Shutting down with {} active sessions", active);
        }
        info!("Tabula server stopped");
        Ok(())
    }
}

impl Shared {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let id = SessionId::next();
        if let Err(e) = stream.set_nodelay(true) {
            debug!(session = %id, "set_nodelay failed: {}", e);
        }

        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(
            id,
            SessionInfo {
                peer,
                connected_at: Instant::now(),
            },
        );
        debug!(session = %id, %peer, "Connection accepted");

        let mut session = Session::new(id, stream, self.dispatcher.clone(), self.limits);
        match session.run().await {
            Ok(()) => debug!(session = %id, "Connection closed"),
            Err(e) => warn!(session = %id, %peer, "Connection error: {}", e),
        }

        self.sessions.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<ServerResult<()>>) {
        let config = ServerConfig::builder().port(0).memory_mode(true).build();
        let store = Arc::new(Store::open_memory().unwrap());
        let registry = Arc::new(config.build_registry().unwrap());
        let server = Server::bind(&config, store, registry).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));
        (addr, tx, handle)
    }

    #[tokio::test]
    async fn test_ping_over_tcp() {
        let (addr, shutdown, handle) = start().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut stream = BufReader::new(stream);
        stream.get_mut().write_all(b"PING\r\n").await.unwrap();

        let mut line = String::new();
        stream.read_line(&mut line).await.unwrap();
        assert_eq!(line, "PONG\r\n");

        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_zero_connections_rejected() {
        let config = ServerConfig::builder()
            .port(0)
            .max_connections(0)
            .build();
        let store = Arc::new(Store::open_memory().unwrap());
        let registry = Arc::new(Registry::with_defaults());
        let err = Server::bind(&config, store, registry).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
