//! Query assembly.
//!
//! A query block is a sequence of lines; each non-blank line is one query.
//! The first field names the table, the rest form the record.

use bytes::Bytes;

use crate::error::ScanError;
use crate::response::escape;
use crate::scan::{Scan, Scanner, TokenKind};

/// One query: a table name followed by the record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    fields: Vec<Bytes>,
}

impl Query {
    /// Creates a query for `table` with `record` fields.
    pub fn new(table: impl Into<Bytes>, record: impl IntoIterator<Item = impl Into<Bytes>>) -> Self {
        let mut fields = vec![table.into()];
        fields.extend(record.into_iter().map(Into::into));
        Self { fields }
    }

    /// Creates a query from raw fields. Returns `None` if `fields` is empty.
    pub fn from_fields(fields: Vec<Bytes>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self { fields })
    }

    /// Returns the table name.
    pub fn table(&self) -> &Bytes {
        &self.fields[0]
    }

    /// Returns the record fields (everything after the table name).
    pub fn record(&self) -> &[Bytes] {
        &self.fields[1..]
    }

    /// Returns all fields, table name first.
    pub fn fields(&self) -> &[Bytes] {
        &self.fields
    }

    /// Encodes the query as one request line (without terminator), every
    /// field quoted.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = Vec::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(b' ');
            }
            line.extend_from_slice(&escape(field));
        }
        line
    }
}

/// Builds queries from a stream of block bytes.
///
/// Feed the block in chunks with [`feed`](Self::feed) and call
/// [`finish`](Self::finish) at the end.
#[derive(Debug, Default)]
pub struct QueryAssembler {
    scanner: Scanner,
    current: Vec<Bytes>,
    queries: Vec<Query>,
}

impl QueryAssembler {
    /// Creates an assembler with the default token size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an assembler that rejects tokens longer than `max_token`.
    pub fn with_max_token(max_token: usize) -> Self {
        Self {
            scanner: Scanner::with_max_token(max_token),
            ..Self::default()
        }
    }

    fn run(&mut self, mut data: &[u8], at_eof: bool) -> Result<(), ScanError> {
        loop {
            match self.scanner.scan(data, at_eof)? {
                Scan::Token { consumed, token } => {
                    data = &data[consumed..];
                    match token.kind {
                        TokenKind::RecordEnd => self.end_query(),
                        TokenKind::Literal | TokenKind::Quoted => self.current.push(token.data),
                    }
                }
                Scan::NeedMore { .. } | Scan::End => return Ok(()),
            }
        }
    }

    fn end_query(&mut self) {
        let fields = std::mem::take(&mut self.current);
        if let Some(query) = Query::from_fields(fields) {
            self.queries.push(query);
        }
    }

    /// Returns true if the bytes fed so far end inside a quoted field.
    pub fn in_quote(&self) -> bool {
        self.scanner.in_quote()
    }

    /// Scans the next chunk of the block.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), ScanError> {
        self.run(data, false)
    }

    /// Ends the block and returns its queries in order.
    pub fn finish(mut self) -> Result<Vec<Query>, ScanError> {
        self.run(&[], true)?;
        self.end_query();
        Ok(self.queries)
    }
}

/// Parses a complete block into queries.
pub fn parse_block(data: &[u8]) -> Result<Vec<Query>, ScanError> {
    let mut assembler = QueryAssembler::new();
    assembler.feed(data)?;
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(fields: &[&str]) -> Query {
        Query::from_fields(fields.iter().map(|f| Bytes::copy_from_slice(f.as_bytes())).collect())
            .unwrap()
    }

    #[test]
    fn test_one_query_per_line() {
        let queries = parse_block(b"group g1 f1 v1\ngroup g1 f2 v2\n").unwrap();
        assert_eq!(
            queries,
            vec![q(&["group", "g1", "f1", "v1"]), q(&["group", "g1", "f2", "v2"])]
        );
        assert_eq!(queries[0].table().as_ref(), b"group");
        assert_eq!(queries[0].record().len(), 3);
    }

    #[test]
    fn test_blank_lines_produce_no_query() {
        let queries = parse_block(b"\n\r\n  \nbag k1\n\n\nbag k2").unwrap();
        assert_eq!(queries, vec![q(&["bag", "k1"]), q(&["bag", "k2"])]);
        assert!(parse_block(b"").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        let queries = parse_block(b"bag \"a key\" \"say \"\"hi\"\"\" \"\"\n").unwrap();
        assert_eq!(queries, vec![q(&["bag", "a key", "say \"hi\"", ""])]);
    }

    #[test]
    fn test_chunked_feed() {
        let mut assembler = QueryAssembler::new();
        let chunks: [&[u8]; 5] = [b"bug k1 v", b"1 2024", b"-01\r", b"\nbug ", b"k2 v2 2024-02"];
        for chunk in chunks {
            assembler.feed(chunk).unwrap();
        }
        assert_eq!(
            assembler.finish().unwrap(),
            vec![
                q(&["bug", "k1", "v1", "2024-01"]),
                q(&["bug", "k2", "v2", "2024-02"])
            ]
        );
    }

    #[test]
    fn test_unterminated_quote_fails_block() {
        assert_eq!(
            parse_block(b"bag k1\nbag \"k2\n"),
            Err(ScanError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_to_line_round_trips() {
        let query = Query::new("bag", ["k 1", "v\"1", ""]);
        assert_eq!(query.to_line(), b"\"bag\" \"k 1\" \"v\"\"1\" \"\"".to_vec());

        let mut block = query.to_line();
        block.push(b'\n');
        assert_eq!(parse_block(&block).unwrap(), vec![query]);
    }
}
