//! # tabula-proto
//!
//! The Tabula line protocol.
//!
//! A session is a sequence of command lines. `PING` and `QUIT` stand alone;
//! the table commands (`RCD`, `LKUP`, `DEL`, `CNT`, `XPR`) are each followed
//! by a dot-terminated block of query lines and answered with a header line
//! (`LINES` or `RSTS`) and a dot-terminated block holding one response line
//! per query.
//!
//! ```text
//! C: RCD                      C: LKUP
//! C: bag k1 v1                C: bag k1
//! C: bag k2 "two words"       C: bag nope
//! C: .                        C: .
//! S: LINES                    S: RSTS
//! S: ok                       S: "v1" ok
//! S: ok                       S: !found
//! S: .                        S: .
//! ```
//!
//! Query lines are tokenized by the resumable [`Scanner`]; the
//! [`QueryAssembler`] groups tokens into [`Query`] values.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod framing;
pub mod query;
pub mod response;
pub mod scan;
pub mod status;

pub use command::{Command, LINES_HEADER, PONG, RESULTS_HEADER};
pub use error::{ProtocolError, ProtocolResult, ScanError};
pub use framing::{encode_block, BlockLine};
pub use query::{parse_block, Query, QueryAssembler};
pub use response::{escape, Reply};
pub use scan::{tokenize, Scan, Scanner, Token, TokenKind};
pub use status::Status;
