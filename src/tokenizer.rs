//! Quote-aware row extraction on top of the circular buffer.

use tracing::{debug, trace, warn};

use crate::buffer::CircularBuffer;
use crate::delimiters::DelimiterSet;
use crate::error::{CsvError, Result};
use crate::source::CharSource;

/// One logical row, not yet split into columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// True only for the first row extracted from a stream.
    pub is_header_candidate: bool,
    /// Raw row text without the row delimiter.
    pub text: String,
}

/// Pulls logical rows out of a character stream.
///
/// Row delimiters inside quoted sections belong to the row. Lines starting
/// with the comment delimiter are consumed and dropped, as are blank lines.
pub struct RowTokenizer<S> {
    buffer: CircularBuffer<S>,
    row: Vec<char>,
    quote: Vec<char>,
    comment: Vec<char>,
    strict_quotes: bool,
    header_pending: bool,
    rows_read: u64,
}

impl<S: CharSource> RowTokenizer<S> {
    /// Create a tokenizer with a buffer of `capacity` characters. The
    /// capacity must hold the longest delimiter.
    pub fn new(source: S, delimiters: &DelimiterSet, capacity: usize) -> Result<Self> {
        let longest = delimiters.longest();
        if capacity < longest {
            return Err(CsvError::InvalidConfig(format!(
                "buffer capacity {capacity} is smaller than the longest delimiter ({longest})"
            )));
        }
        Ok(Self {
            buffer: CircularBuffer::with_capacity(source, capacity)?,
            row: delimiters.row().chars().collect(),
            quote: delimiters.quote().chars().collect(),
            comment: delimiters.comment().chars().collect(),
            strict_quotes: true,
            header_pending: true,
            rows_read: 0,
        })
    }

    /// When false, a quoted section left open at end of stream is returned
    /// as-is instead of failing with [`CsvError::MalformedRow`].
    pub fn strict_quotes(&mut self, strict: bool) -> &mut Self {
        self.strict_quotes = strict;
        self
    }

    /// Number of rows returned so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Extract the next row. `Ok(None)` means the stream has ended.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if self.buffer.is_exhausted()? {
                debug!(rows = self.rows_read, "end of stream");
                return Ok(None);
            }

            if self.buffer.peek_matches(0, &self.comment)? {
                self.skip_line()?;
                continue;
            }

            let mut text = String::new();
            let mut inside_quote = false;
            loop {
                if !inside_quote && self.buffer.peek_matches(0, &self.row)? {
                    self.buffer.advance(self.row.len())?;
                    break;
                }
                if self.buffer.peek_matches(0, &self.quote)? {
                    self.buffer.take_next(self.quote.len(), &mut text)?;
                    inside_quote = !inside_quote;
                } else if !self.buffer.take_next(1, &mut text)? {
                    break;
                }
            }

            if inside_quote {
                let row = self.rows_read + 1;
                if self.strict_quotes {
                    return Err(CsvError::MalformedRow { row });
                }
                warn!(row, "unterminated quoted field at end of stream");
            }

            if text.is_empty() {
                continue;
            }

            self.rows_read += 1;
            let is_header_candidate = std::mem::replace(&mut self.header_pending, false);
            return Ok(Some(Row {
                is_header_candidate,
                text,
            }));
        }
    }

    /// Consume a comment line up to and including its row delimiter,
    /// ignoring quotes.
    fn skip_line(&mut self) -> Result<()> {
        let mut skipped = 0usize;
        loop {
            if self.buffer.peek_matches(0, &self.row)? {
                self.buffer.advance(self.row.len())?;
                break;
            }
            if !self.buffer.advance(1)? {
                break;
            }
            skipped += 1;
        }
        trace!(chars = skipped, "skipped comment line");
        Ok(())
    }

    /// Close the underlying buffer and source. Idempotent.
    pub fn close(&mut self) {
        self.buffer.close();
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::{ChunkedSource, FailingSource};
    use crate::source::StrSource;

    fn tokenizer(text: &str, capacity: usize) -> RowTokenizer<StrSource<'_>> {
        RowTokenizer::new(StrSource::new(text), &DelimiterSet::default(), capacity).unwrap()
    }

    fn collect<S: CharSource>(mut tokenizer: RowTokenizer<S>) -> Vec<String> {
        let mut rows = Vec::new();
        while let Some(row) = tokenizer.next_row().unwrap() {
            rows.push(row.text);
        }
        rows
    }

    const HEADER: &str = "SUPER-COLUMN-1;SUPER-COLUMN-2;SUPER-COLUMN-3;EMPTY-COLUMN-4;INNER-COLUMN-5";
    const ROWS: [&str; 3] = [
        "\"prefix-----c1__1\";\"c2__1-----suffix\";\"1\";\"1;2;3;4\";\"inner 3;3\"",
        "\"prefix-----c1__2\";\"c2__2-----suffix\";\"2\";\"1;2;3;4\";\"inner 2;2\"",
        "\"prefix-----c1__3\";\"c2__3-----suffix\";\"3\";\"1;2;3;4\";\"inner 3;3\"",
    ];

    #[test]
    fn test_reads_rows_in_order() {
        let text = format!("{HEADER}\n{}", ROWS.join("\n"));
        let rows = collect(tokenizer(&text, 128));
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], HEADER);
        assert_eq!(&rows[1..], &ROWS);
    }

    #[test]
    fn test_header_flag_only_on_first_row() {
        let mut t = tokenizer("#note\nh1;h2\na;b\nc;d\n", 16);
        assert!(t.next_row().unwrap().unwrap().is_header_candidate);
        assert!(!t.next_row().unwrap().unwrap().is_header_candidate);
        assert!(!t.next_row().unwrap().unwrap().is_header_candidate);
        assert_eq!(t.next_row().unwrap(), None);
        assert_eq!(t.rows_read(), 3);
    }

    #[test]
    fn test_row_delimiter_inside_quotes() {
        let rows = collect(tokenizer("\"line 1\nline 2\";x\ny\n", 8));
        assert_eq!(rows, vec!["\"line 1\nline 2\";x", "y"]);
    }

    #[test]
    fn test_comment_lines_dropped() {
        let rows = collect(tokenizer("# leading\na;b\n#middle \"quoted\nc;d\n# trailing", 8));
        assert_eq!(rows, vec!["a;b", "c;d"]);
    }

    #[test]
    fn test_comment_marker_mid_row_is_data() {
        let rows = collect(tokenizer("a;#b\n", 8));
        assert_eq!(rows, vec!["a;#b"]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let rows = collect(tokenizer("\n\na\n\nb\n\n", 8));
        assert_eq!(rows, vec!["a", "b"]);
    }

    #[test]
    fn test_no_trailing_row_delimiter() {
        let rows = collect(tokenizer("a;b\nc;d", 8));
        assert_eq!(rows, vec!["a;b", "c;d"]);
    }

    #[test]
    fn test_empty_stream() {
        let mut t = tokenizer("", 8);
        assert_eq!(t.next_row().unwrap(), None);
        assert_eq!(t.next_row().unwrap(), None);
    }

    #[test]
    fn test_multi_char_delimiters() {
        let delimiters = DelimiterSet::new("||", "\r\n", "<q>", "--").unwrap();
        let text = "--skip\r\n<q>a\r\nb<q>||c\r\nd||e";
        let mut t = RowTokenizer::new(ChunkedSource::new(text, 2), &delimiters, 4).unwrap();
        assert_eq!(t.next_row().unwrap().unwrap().text, "<q>a\r\nb<q>||c");
        assert_eq!(t.next_row().unwrap().unwrap().text, "d||e");
        assert_eq!(t.next_row().unwrap(), None);
    }

    #[test]
    fn test_capacity_must_hold_delimiters() {
        let delimiters = DelimiterSet::new("||", "\r\n", "<q>", "#").unwrap();
        assert!(RowTokenizer::new(StrSource::new("x"), &delimiters, 2).is_err());
    }

    #[test]
    fn test_unterminated_quote_strict() {
        let mut t = tokenizer("a\n\"b;c\nd", 8);
        assert_eq!(t.next_row().unwrap().unwrap().text, "a");
        assert!(matches!(t.next_row(), Err(CsvError::MalformedRow { row: 2 })));
    }

    #[test]
    fn test_unterminated_quote_lenient() {
        let mut t = tokenizer("a\n\"b;c\nd", 8);
        t.strict_quotes(false);
        assert_eq!(t.next_row().unwrap().unwrap().text, "a");
        assert_eq!(t.next_row().unwrap().unwrap().text, "\"b;c\nd");
        assert_eq!(t.next_row().unwrap(), None);
    }

    #[test]
    fn test_quoting_disabled() {
        let delimiters = DelimiterSet::new(";", "\n", "", "#").unwrap();
        let mut t = RowTokenizer::new(StrSource::new("\"a\nb;\"c\"\n"), &delimiters, 4).unwrap();
        assert_eq!(t.next_row().unwrap().unwrap().text, "\"a");
        assert_eq!(t.next_row().unwrap().unwrap().text, "b;\"c\"");
        assert_eq!(t.next_row().unwrap(), None);
    }

    #[test]
    fn test_io_error_discards_partial_row() {
        let delimiters = DelimiterSet::default();
        let mut t = RowTokenizer::new(FailingSource::new("a;b\nc;d\n", 6), &delimiters, 4).unwrap();
        assert_eq!(t.next_row().unwrap().unwrap().text, "a;b");
        assert!(matches!(t.next_row(), Err(CsvError::Io(_))));
    }

    #[test]
    fn test_closed_tokenizer_fails() {
        let mut t = tokenizer("a\nb\n", 8);
        assert!(t.next_row().unwrap().is_some());
        t.close();
        assert!(t.is_closed());
        assert!(matches!(t.next_row(), Err(CsvError::StreamClosed)));
    }

    #[test]
    fn test_capacity_invariance() {
        let text = format!("{HEADER}\n#c\n{}\n\n\"x\ny\";z", ROWS.join("\n"));
        let expected = collect(tokenizer(&text, 8192));
        for capacity in [4, 5, 7, 64] {
            assert_eq!(collect(tokenizer(&text, capacity)), expected, "capacity {capacity}");
            let chunked = RowTokenizer::new(
                ChunkedSource::new(&text, 3),
                &DelimiterSet::default(),
                capacity,
            )
            .unwrap();
            assert_eq!(collect(chunked), expected, "chunked, capacity {capacity}");
        }
    }
}
