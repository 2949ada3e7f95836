//! Dot-block framing.
//!
//! A block is a sequence of lines terminated by a line holding a single `.`.
//! Lines that begin with `.` are sent with an extra leading `.` so they are
//! never mistaken for the terminator.

use std::borrow::Cow;

/// The block terminator line.
pub const TERMINATOR: &[u8] = b".";

/// Result of reading one line of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLine<'a> {
    /// A content line, unstuffed.
    Line(&'a [u8]),
    /// The terminator; the block is complete.
    End,
}

/// Strips the line terminator (`\n` or `\r\n`) from `line`.
pub fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Classifies a received block line (without its terminator).
pub fn unstuff(line: &[u8]) -> BlockLine<'_> {
    if line == TERMINATOR {
        return BlockLine::End;
    }
    match line.strip_prefix(b".") {
        Some(rest) => BlockLine::Line(rest),
        None => BlockLine::Line(line),
    }
}

/// Prepares a line (without its terminator) for sending inside a block.
pub fn stuff(line: &[u8]) -> Cow<'_, [u8]> {
    if line.first() == Some(&b'.') {
        let mut out = Vec::with_capacity(line.len() + 1);
        out.push(b'.');
        out.extend_from_slice(line);
        Cow::Owned(out)
    } else {
        Cow::Borrowed(line)
    }
}

/// Encodes `lines` as a complete block, terminator included.
///
/// A line may hold embedded `\n` bytes (inside quoted fields); each physical
/// line is stuffed on its own.
pub fn encode_block<I, L>(lines: I) -> Vec<u8>
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for line in lines {
        for (i, part) in line.as_ref().split(|&b| b == b'\n').enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            out.extend_from_slice(&stuff(part));
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(TERMINATOR);
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_eol() {
        assert_eq!(trim_eol(b"abc\r\n"), b"abc");
        assert_eq!(trim_eol(b"abc\n"), b"abc");
        assert_eq!(trim_eol(b"abc"), b"abc");
        assert_eq!(trim_eol(b"abc\r"), b"abc");
    }

    #[test]
    fn test_stuffing() {
        assert_eq!(unstuff(b"."), BlockLine::End);
        assert_eq!(unstuff(b".."), BlockLine::Line(b"."));
        assert_eq!(unstuff(b"..x"), BlockLine::Line(b".x"));
        assert_eq!(unstuff(b"bag k1"), BlockLine::Line(b"bag k1"));

        assert_eq!(stuff(b".x").as_ref(), b"..x");
        assert_eq!(stuff(b"ok").as_ref(), b"ok");
    }

    #[test]
    fn test_encode_block() {
        assert_eq!(
            encode_block(["ok", ".hidden", ""]),
            b"ok\r\n..hidden\r\n\r\n.\r\n".to_vec()
        );
        assert_eq!(encode_block(Vec::<Vec<u8>>::new()), b".\r\n".to_vec());
        assert_eq!(
            encode_block(["\"a\n.\" ok"]),
            b"\"a\n..\" ok\r\n.\r\n".to_vec()
        );
    }
}
