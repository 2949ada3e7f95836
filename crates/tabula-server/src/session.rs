//! Client sessions.
//!
//! A session reads command lines until the client sends `QUIT` or closes the
//! connection. Table commands read a dot-terminated query block, run it
//! through the [`Dispatcher`] and answer with a header line and a response
//! block.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tabula_common::constants::{DEFAULT_MAX_BLOCK_BYTES, DEFAULT_MAX_LINE_BYTES, MAX_TOKEN_BYTES};
use tabula_proto::command::unknown_command;
use tabula_proto::framing::{trim_eol, unstuff};
use tabula_proto::{encode_block, BlockLine, Command, Query, QueryAssembler, ScanError, PONG};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace};

use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};

/// Session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Allocates a new process-unique session ID.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a command line.
    AwaitCommand,
    /// Reading or running the block of a table command.
    Processing(Command),
    /// The session has ended.
    Closed,
}

/// Per-session protocol limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Maximum length of one line, terminator included.
    pub max_line_bytes: usize,
    /// Maximum total size of one query block.
    pub max_block_bytes: usize,
    /// Maximum size of one token.
    pub max_token_bytes: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_block_bytes: DEFAULT_MAX_BLOCK_BYTES,
            max_token_bytes: MAX_TOKEN_BYTES,
        }
    }
}

/// One client connection.
pub struct Session<S> {
    id: SessionId,
    stream: BufReader<S>,
    dispatcher: Dispatcher,
    limits: SessionLimits,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session over `stream`.
    pub fn new(id: SessionId, stream: S, dispatcher: Dispatcher, limits: SessionLimits) -> Self {
        Self {
            id,
            stream: BufReader::new(stream),
            dispatcher,
            limits,
            state: SessionState::AwaitCommand,
        }
    }

    /// Returns the session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serves commands until the client quits or disconnects.
    pub async fn run(&mut self) -> ServerResult<()> {
        let result = self.serve().await;
        self.state = SessionState::Closed;
        result
    }

    async fn serve(&mut self) -> ServerResult<()> {
        while let Some(line) = self.read_line().await? {
            let line = String::from_utf8_lossy(trim_eol(&line)).into_owned();
            trace!(session = %self.id, command = %line, "command");

            match Command::parse(&line) {
                Some(Command::Quit) => {
                    debug!(session = %self.id, "client quit");
                    break;
                }
                Some(Command::Ping) => self.write_line(PONG.as_bytes()).await?,
                Some(command) => self.process(command).await?,
                None => self.write_line(unknown_command(&line).as_bytes()).await?,
            }
        }
        Ok(())
    }

    async fn process(&mut self, command: Command) -> ServerResult<()> {
        self.state = SessionState::Processing(command);

        match self.read_block().await? {
            Ok(queries) => {
                let lines = self.dispatcher.execute(command, queries).await?;
                let mut reply = Vec::new();
                if let Some(header) = command.reply_header() {
                    reply.extend_from_slice(header.as_bytes());
                    reply.extend_from_slice(b"\r\n");
                }
                reply.extend_from_slice(&encode_block(lines));
                self.write_all(&reply).await?;
            }
            Err(err) => {
                debug!(session = %self.id, %command, error = %err, "rejected block");
                self.write_line(format!("ERR {err}").as_bytes()).await?;
            }
        }

        self.state = SessionState::AwaitCommand;
        Ok(())
    }

    /// Reads a query block up to its terminator.
    ///
    /// A tokenizer error does not stop the read; the rest of the block is
    /// drained so the session stays in sync, and the error is returned in
    /// place of the queries.
    async fn read_block(&mut self) -> ServerResult<Result<Vec<Query>, ScanError>> {
        let mut assembler = QueryAssembler::with_max_token(self.limits.max_token_bytes);
        let mut failure = None;
        let mut total = 0usize;

        loop {
            let line = self.read_line().await?.ok_or(ServerError::UnexpectedEof)?;
            total += line.len();
            if total > self.limits.max_block_bytes {
                return Err(ServerError::BlockTooLarge {
                    limit: self.limits.max_block_bytes,
                });
            }

            let content = match unstuff(trim_eol(&line)) {
                BlockLine::End => break,
                BlockLine::Line(content) => content,
            };
            if failure.is_none() {
                // Inside a quoted field the line break is data and keeps its exact bytes.
                let fed = assembler.feed(content).and_then(|()| {
                    if assembler.in_quote() {
                        assembler.feed(&line[trim_eol(&line).len()..])
                    } else {
                        assembler.feed(b"\n")
                    }
                });
                if let Err(err) = fed {
                    failure = Some(err);
                }
            }
        }

        Ok(match failure {
            Some(err) => Err(err),
            None => assembler.finish(),
        })
    }

    /// Reads one line, terminator included. Returns `None` on a clean EOF.
    async fn read_line(&mut self) -> ServerResult<Option<Vec<u8>>> {
        let limit = self.limits.max_line_bytes;
        let mut line = Vec::new();
        let n = (&mut self.stream)
            .take(limit as u64)
            .read_until(b'\n', &mut line)
            .await?;

        if n == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') {
            if n >= limit {
                return Err(ServerError::LineTooLong { limit });
            }
            return Err(ServerError::UnexpectedEof);
        }
        Ok(Some(line))
    }

    async fn write_line(&mut self, line: &[u8]) -> ServerResult<()> {
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line);
        buf.extend_from_slice(b"\r\n");
        self.write_all(&buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> ServerResult<()> {
        let stream = self.stream.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabula_store::Store;
    use tabula_tables::Registry;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    fn dispatcher() -> Dispatcher {
        let store = Store::open_memory().unwrap();
        Dispatcher::new(Arc::new(store), Arc::new(Registry::with_defaults()))
    }

    fn start(limits: SessionLimits) -> (DuplexStream, JoinHandle<(SessionState, ServerResult<()>)>) {
        let (client, server) = duplex(64 * 1024);
        let handle = tokio::spawn(async move {
            let mut session = Session::new(SessionId::next(), server, dispatcher(), limits);
            let result = session.run().await;
            (session.state(), result)
        });
        (client, handle)
    }

    async fn converse(script: &str) -> String {
        let (mut client, handle) = start(SessionLimits::default());
        client.write_all(script.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();
        let (state, result) = handle.await.unwrap();
        assert_eq!(state, SessionState::Closed);
        result.unwrap();

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_ping_and_unknown() {
        let out = converse("PING\r\nHELLO there\r\nping\nQUIT\r\n").await;
        assert_eq!(out, "PONG\r\nUnknown: HELLO there\r\nUnknown: ping\r\n");
    }

    #[tokio::test]
    async fn test_record_and_lookup() {
        let out = converse(
            "RCD\r\nbag k1 v1\r\nbag k2 \"two words\"\r\n.\r\n\
             LKUP\r\nbag k1\r\nbag k2\r\nbag nope\r\n.\r\nQUIT\r\n",
        )
        .await;
        assert_eq!(
            out,
            "LINES\r\nok\r\nok\r\n.\r\n\
             RSTS\r\n\"v1\" ok\r\n\"two words\" ok\r\n!found\r\n.\r\n"
        );
    }

    #[tokio::test]
    async fn test_blank_lines_and_empty_block() {
        let out = converse("RCD\r\n\r\nbag k v\r\n\r\n.\r\nCNT\r\n.\r\nQUIT\r\n").await;
        assert_eq!(out, "LINES\r\nok\r\n.\r\nRSTS\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_dot_stuffed_lines() {
        let out = converse("RCD\r\n..bag k v\r\nbag .k .v\r\n.\r\nLKUP\r\nbag .k\r\n.\r\n").await;
        assert_eq!(out, "LINES\r\n!table\r\nok\r\n.\r\nRSTS\r\n\".v\" ok\r\n.\r\n");
    }

    #[tokio::test]
    async fn test_quoted_field_spans_lines() {
        let out = converse(
            "RCD\r\nbag k \"a\r\nb\"\r\nbag k2 \"a\nb\"\r\n.\r\nLKUP\r\nbag k\r\nbag k2\r\n.\r\n",
        )
        .await;
        assert_eq!(
            out,
            "LINES\r\nok\r\nok\r\n.\r\nRSTS\r\n\"a\r\nb\" ok\r\n\"a\nb\" ok\r\n.\r\n"
        );
    }

    #[tokio::test]
    async fn test_unterminated_quote_keeps_session() {
        let out = converse("RCD\r\nbag k \"open\r\n.\r\nPING\r\n").await;
        assert_eq!(out, "ERR unterminated quoted string\r\nPONG\r\n");
    }

    #[tokio::test]
    async fn test_line_too_long_ends_session() {
        let limits = SessionLimits {
            max_line_bytes: 16,
            ..SessionLimits::default()
        };
        let (mut client, handle) = start(limits);
        client
            .write_all(b"PING\r\nTHIS LINE IS FAR TOO LONG\r\n")
            .await
            .unwrap();

        let (state, result) = handle.await.unwrap();
        assert_eq!(state, SessionState::Closed);
        assert!(matches!(result, Err(ServerError::LineTooLong { limit: 16 })));
    }

    #[tokio::test]
    async fn test_block_too_large_ends_session() {
        let limits = SessionLimits {
            max_block_bytes: 20,
            ..SessionLimits::default()
        };
        let (mut client, handle) = start(limits);
        client
            .write_all(b"RCD\r\nbag k1 v1\r\nbag k2 v2\r\nbag k3 v3\r\n.\r\n")
            .await
            .unwrap();

        let (_, result) = handle.await.unwrap();
        assert!(matches!(result, Err(ServerError::BlockTooLarge { limit: 20 })));
    }

    #[tokio::test]
    async fn test_eof_inside_block() {
        let (mut client, handle) = start(SessionLimits::default());
        client.write_all(b"RCD\r\nbag k v\r\n").await.unwrap();
        drop(client);

        let (state, result) = handle.await.unwrap();
        assert_eq!(state, SessionState::Closed);
        assert!(matches!(result, Err(ServerError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let (client, handle) = start(SessionLimits::default());
        drop(client);
        let (_, result) = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_session_id() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert!(b > a);
        assert_eq!(SessionId(7).to_string(), "session_7");
    }
}
