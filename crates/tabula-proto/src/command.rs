//! Session commands.

use std::fmt;

/// A command line sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `PING`: replies `PONG`.
    Ping,
    /// `QUIT`: ends the session.
    Quit,
    /// `RCD`: insert one record per query.
    Record,
    /// `LKUP`: look up one record per query.
    Lookup,
    /// `DEL`: delete one record per query.
    Delete,
    /// `CNT`: count per query.
    Count,
    /// `XPR`: expire per query.
    Expire,
}

/// Reply header preceding the response block of a write command.
pub const LINES_HEADER: &str = "LINES";

/// Reply header preceding the response block of a read command.
pub const RESULTS_HEADER: &str = "RSTS";

/// Reply to `PING`.
pub const PONG: &str = "PONG";

impl Command {
    /// Every command.
    pub const ALL: [Command; 7] = [
        Command::Ping,
        Command::Quit,
        Command::Record,
        Command::Lookup,
        Command::Delete,
        Command::Count,
        Command::Expire,
    ];

    /// Parses a command line. Matching is exact and case-sensitive.
    pub fn parse(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == line)
    }

    /// Returns the wire keyword.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Quit => "QUIT",
            Command::Record => "RCD",
            Command::Lookup => "LKUP",
            Command::Delete => "DEL",
            Command::Count => "CNT",
            Command::Expire => "XPR",
        }
    }

    /// Returns true if the command reads a query block.
    pub const fn takes_block(&self) -> bool {
        !matches!(self, Command::Ping | Command::Quit)
    }

    /// Returns true if the command modifies tables.
    pub const fn is_write(&self) -> bool {
        matches!(self, Command::Record | Command::Delete | Command::Expire)
    }

    /// Returns the header line that precedes the response block, if any.
    pub const fn reply_header(&self) -> Option<&'static str> {
        match self {
            Command::Record | Command::Delete | Command::Expire => Some(LINES_HEADER),
            Command::Lookup | Command::Count => Some(RESULTS_HEADER),
            Command::Ping | Command::Quit => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats the reply to an unrecognized command line.
pub fn unknown_command(line: &str) -> String {
    format!("Unknown: {line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        for command in Command::ALL {
            assert_eq!(Command::parse(command.as_str()), Some(command));
        }
        assert_eq!(Command::parse("ping"), None);
        assert_eq!(Command::parse("RCD "), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_classification() {
        assert!(Command::Record.is_write());
        assert!(Command::Expire.is_write());
        assert!(!Command::Lookup.is_write());
        assert!(!Command::Ping.takes_block());
        assert!(Command::Count.takes_block());
        assert_eq!(Command::Count.reply_header(), Some("RSTS"));
        assert_eq!(Command::Delete.reply_header(), Some("LINES"));
        assert_eq!(Command::Quit.reply_header(), None);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(unknown_command("HELLO"), "Unknown: HELLO");
    }
}
