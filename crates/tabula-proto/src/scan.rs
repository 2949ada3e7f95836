//! Resumable tokenizer for query blocks.
//!
//! The scanner is a finite-state machine fed with successive chunks of a
//! byte stream. Partial tokens are kept in the scanner between calls, so
//! every byte is examined exactly once no matter how the input is split.
//!
//! ```text
//!            ┌──── ws ────┐
//!            ▼            │
//!   ┌─────────────┐ ──────┘        '"'        ┌─────────┐  '"'  ┌───────────┐
//!   │    Idle     │ ─────────────────────────▶│ Quoted  │──────▶│ QuoteSeen │
//!   └─────────────┘                           └─────────┘◀──────└───────────┘
//!     │        │  other                                    '"'        │ other
//!     │ CR/LF  └────────────▶ Literal ── ws ──▶ emit                  ▼
//!     ▼                                                             emit
//!   Separator ── other ──▶ emit RecordEnd
//! ```
//!
//! Whitespace is any byte `<= 0x20`. A run of `\r`/`\n` bytes outside a token
//! yields a single [`TokenKind::RecordEnd`].

use bytes::{Bytes, BytesMut};
use tabula_common::constants::MAX_TOKEN_BYTES;

use crate::error::ScanError;

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An unquoted run of non-whitespace bytes.
    Literal,
    /// A double-quoted string, quotes removed and `""` collapsed to `"`.
    Quoted,
    /// One or more line terminators.
    RecordEnd,
}

/// A scanned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// Raw content. Empty for [`TokenKind::RecordEnd`].
    pub data: Bytes,
}

impl Token {
    fn record_end() -> Self {
        Self {
            kind: TokenKind::RecordEnd,
            data: Bytes::new(),
        }
    }
}

/// Outcome of one [`Scanner::scan`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// A complete token. `consumed` bytes of the input were used; the rest
    /// must be passed to the next call.
    Token {
        /// Bytes of the input consumed.
        consumed: usize,
        /// The token.
        token: Token,
    },
    /// The input was consumed without completing a token. Call again with
    /// the next chunk, or with `at_eof` set.
    NeedMore {
        /// Bytes of the input consumed (always all of it).
        consumed: usize,
    },
    /// End of stream; no further tokens.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Literal,
    Quoted,
    QuoteSeen,
    Separator,
}

/// Incremental tokenizer.
#[derive(Debug)]
pub struct Scanner {
    state: State,
    token: BytesMut,
    max_token: usize,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Creates a scanner with the default token size limit.
    pub fn new() -> Self {
        Self::with_max_token(MAX_TOKEN_BYTES)
    }

    /// Creates a scanner that rejects tokens longer than `max_token` bytes.
    pub fn with_max_token(max_token: usize) -> Self {
        Self {
            state: State::Idle,
            token: BytesMut::new(),
            max_token,
        }
    }

    /// Returns true if no token is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Returns true if the scanner is inside an open quoted string.
    pub fn in_quote(&self) -> bool {
        self.state == State::Quoted
    }

    /// Discards any partial token.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.token.clear();
    }

    fn push(&mut self, b: u8) -> Result<(), ScanError> {
        if self.token.len() >= self.max_token {
            return Err(ScanError::TokenTooLarge {
                limit: self.max_token,
            });
        }
        self.token.extend_from_slice(&[b]);
        Ok(())
    }

    fn emit(&mut self, kind: TokenKind, consumed: usize) -> Scan {
        self.state = State::Idle;
        let token = match kind {
            TokenKind::RecordEnd => Token::record_end(),
            _ => Token {
                kind,
                data: self.token.split().freeze(),
            },
        };
        Scan::Token { consumed, token }
    }

    /// Scans `data`, continuing any token left unfinished by the previous
    /// call.
    ///
    /// `at_eof` signals that `data` is the final chunk. An unterminated
    /// quoted string at end of stream is an error; the scanner is reset.
    pub fn scan(&mut self, data: &[u8], at_eof: bool) -> Result<Scan, ScanError> {
        for (i, &b) in data.iter().enumerate() {
            match self.state {
                State::Idle => match b {
                    b'\r' | b'\n' => self.state = State::Separator,
                    _ if b <= b' ' => {}
                    b'"' => self.state = State::Quoted,
                    _ => {
                        self.state = State::Literal;
                        self.push(b)?;
                    }
                },
                State::Literal => {
                    if b <= b' ' {
                        return Ok(self.emit(TokenKind::Literal, i));
                    }
                    self.push(b)?;
                }
                State::Quoted => {
                    if b == b'"' {
                        self.state = State::QuoteSeen;
                    } else {
                        self.push(b)?;
                    }
                }
                State::QuoteSeen => {
                    if b != b'"' {
                        return Ok(self.emit(TokenKind::Quoted, i));
                    }
                    self.push(b'"')?;
                    self.state = State::Quoted;
                }
                State::Separator => {
                    if b != b'\r' && b != b'\n' {
                        return Ok(self.emit(TokenKind::RecordEnd, i));
                    }
                }
            }
        }

        let consumed = data.len();
        if !at_eof {
            return Ok(Scan::NeedMore { consumed });
        }
        match self.state {
            State::Idle => Ok(Scan::End),
            State::Literal => Ok(self.emit(TokenKind::Literal, consumed)),
            State::QuoteSeen => Ok(self.emit(TokenKind::Quoted, consumed)),
            State::Separator => Ok(self.emit(TokenKind::RecordEnd, consumed)),
            State::Quoted => {
                self.reset();
                Err(ScanError::UnterminatedQuote)
            }
        }
    }
}

/// Tokenizes a complete buffer.
pub fn tokenize(data: &[u8]) -> Result<Vec<Token>, ScanError> {
    let mut scanner = Scanner::new();
    let mut tokens = Vec::new();
    let mut rest = data;
    loop {
        match scanner.scan(rest, true)? {
            Scan::Token { consumed, token } => {
                rest = &rest[consumed..];
                tokens.push(token);
            }
            Scan::NeedMore { .. } | Scan::End => return Ok(tokens),
        }
    }
}
