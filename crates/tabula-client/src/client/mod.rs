//! Client connection management.
//!
//! Provides the main `Client` struct for connecting to a Tabula server and
//! sending query blocks.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tabula_common::constants::{DEFAULT_HOST, DEFAULT_PORT};
use tabula_proto::framing::{trim_eol, unstuff};
use tabula_proto::{encode_block, BlockLine, Command, Query, Reply, PONG};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::error::{ClientError, ClientResult, ConnectionState};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the connection string.
    pub fn connection_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Statistics about client usage.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Request blocks sent.
    pub blocks_sent: u64,
    /// Queries sent across all blocks.
    pub queries_sent: u64,
    /// Requests that failed.
    pub failures: u64,
}

struct Connection {
    stream: BufReader<TcpStream>,
}

impl Connection {
    async fn send(&mut self, data: &[u8]) -> ClientResult<()> {
        let stream = self.stream.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads one physical line, terminator included.
    async fn read_raw_line(&mut self) -> ClientResult<Vec<u8>> {
        let mut line = Vec::new();
        if self.stream.read_until(b'\n', &mut line).await? == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(line)
    }

    /// Reads one physical line without its terminator.
    async fn read_line(&mut self) -> ClientResult<Vec<u8>> {
        let mut line = self.read_raw_line().await?;
        let len = trim_eol(&line).len();
        line.truncate(len);
        Ok(line)
    }

    /// Reads one response line of a block, joining physical lines that are
    /// continued inside a quoted field. Line breaks inside the field keep
    /// their exact bytes.
    async fn read_block_line(&mut self) -> ClientResult<Option<Vec<u8>>> {
        let mut raw = self.read_raw_line().await?;
        let mut line = match unstuff(trim_eol(&raw)) {
            BlockLine::End => return Ok(None),
            BlockLine::Line(content) => content.to_vec(),
        };
        while open_quote(&line) {
            line.extend_from_slice(&raw[trim_eol(&raw).len()..]);
            raw = self.read_raw_line().await?;
            if let BlockLine::Line(content) = unstuff(trim_eol(&raw)) {
                line.extend_from_slice(content);
            }
        }
        Ok(Some(line))
    }

    async fn exchange_line(&mut self, line: &str) -> ClientResult<String> {
        self.send(format!("{line}\r\n").as_bytes()).await?;
        let reply = self.read_line().await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    async fn exchange_block(
        &mut self,
        request: &[u8],
        header: &str,
        expected: usize,
    ) -> ClientResult<Vec<Reply>> {
        self.send(request).await?;

        let first = self.read_line().await?;
        if first != header.as_bytes() {
            let text = String::from_utf8_lossy(&first).into_owned();
            return Err(match text.strip_prefix("ERR ") {
                Some(reason) => ClientError::ServerError(reason.to_string()),
                None => ClientError::UnexpectedReply(text),
            });
        }

        let mut replies = Vec::with_capacity(expected);
        while let Some(line) = self.read_block_line().await? {
            replies.push(Reply::parse(&line)?);
        }
        Ok(replies)
    }
}

fn open_quote(line: &[u8]) -> bool {
    line.iter().filter(|&&b| b == b'"').count() % 2 == 1
}

/// Tabula client.
///
/// Requests on one client are serialized; share it behind an `Arc` to use
/// it from several tasks.
pub struct Client {
    /// Configuration.
    config: ClientConfig,
    /// The connection, `None` once closed.
    conn: AsyncMutex<Option<Connection>>,
    /// Connection state.
    state: RwLock<ConnectionState>,
    /// When the connection was established.
    connected_at: Instant,
    /// Statistics.
    stats: RwLock<ClientStats>,
}

impl Client {
    /// Connects to a server at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        Self::from_stream(ClientConfig::default(), stream)
    }

    /// Connects using `config`.
    pub async fn connect_with(config: ClientConfig) -> ClientResult<Self> {
        let addr = config.connection_string();
        let timeout = config.connect_timeout;
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectionTimeout(timeout.as_millis() as u64))?
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        Self::from_stream(config, stream)
    }

    fn from_stream(config: ClientConfig, stream: TcpStream) -> ClientResult<Self> {
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "connected");
        Ok(Self {
            config,
            conn: AsyncMutex::new(Some(Connection {
                stream: BufReader::new(stream),
            })),
            state: RwLock::new(ConnectionState::Connected),
            connected_at: Instant::now(),
            stats: RwLock::new(ClientStats::default()),
        })
    }

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Returns true if connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns client statistics.
    pub fn stats(&self) -> ClientStats {
        self.stats.read().clone()
    }

    /// Returns how long the connection has been open.
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Sends `PING` and waits for `PONG`.
    pub async fn ping(&self) -> ClientResult<()> {
        let reply = self.send_raw(Command::Ping.as_str()).await?;
        if reply != PONG {
            return Err(ClientError::UnexpectedReply(reply));
        }
        Ok(())
    }

    /// Inserts one record per query.
    pub async fn record(&self, queries: &[Query]) -> ClientResult<Vec<Reply>> {
        self.block(Command::Record, queries).await
    }

    /// Looks up one record per query.
    pub async fn lookup(&self, queries: &[Query]) -> ClientResult<Vec<Reply>> {
        self.block(Command::Lookup, queries).await
    }

    /// Deletes one record per query.
    pub async fn delete(&self, queries: &[Query]) -> ClientResult<Vec<Reply>> {
        self.block(Command::Delete, queries).await
    }

    /// Counts per query. Each reply carries the count as its first field.
    pub async fn count(&self, queries: &[Query]) -> ClientResult<Vec<Reply>> {
        self.block(Command::Count, queries).await
    }

    /// Expires per query.
    pub async fn expire(&self, queries: &[Query]) -> ClientResult<Vec<Reply>> {
        self.block(Command::Expire, queries).await
    }

    /// Sends a table command with its query block and reads the replies.
    pub async fn block(&self, command: Command, queries: &[Query]) -> ClientResult<Vec<Reply>> {
        let header = command.reply_header().ok_or_else(|| {
            ClientError::UnexpectedReply(format!("{command} does not take a block"))
        })?;

        let mut request = Vec::new();
        request.extend_from_slice(command.as_str().as_bytes());
        request.extend_from_slice(b"\r\n");
        request.extend_from_slice(&encode_block(queries.iter().map(Query::to_line)));

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ClientError::ConnectionClosed)?;
        let result = conn.exchange_block(&request, header, queries.len()).await;

        {
            let mut stats = self.stats.write();
            stats.blocks_sent += 1;
            stats.queries_sent += queries.len() as u64;
        }
        self.observe(result)
    }

    /// Sends one raw command line and returns the single reply line.
    pub async fn send_raw(&self, line: &str) -> ClientResult<String> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let result = conn.exchange_line(line).await;
        self.observe(result)
    }

    /// Sends `QUIT` and closes the connection.
    pub async fn quit(&self) -> ClientResult<()> {
        let mut guard = self.conn.lock().await;
        if let Some(mut conn) = guard.take() {
            conn.send(b"QUIT\r\n").await?;
            conn.stream.get_mut().shutdown().await?;
        }
        *self.state.write() = ConnectionState::Closed;
        Ok(())
    }

    fn observe<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(e) = &result {
            self.stats.write().failures += 1;
            if matches!(e, ClientError::Io(_) | ClientError::ConnectionClosed) {
                *self.state.write() = ConnectionState::Failed;
            }
        }
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
