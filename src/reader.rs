//! Row and record streams over a delimited input.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::buffer::DEFAULT_CAPACITY;
use crate::delimiters::DelimiterSet;
use crate::error::{CsvError, Result};
use crate::mapping::RecordMapper;
use crate::source::{CharSource, Charset, DecodingSource};
use crate::split::{split_record, unembrace};
use crate::tokenizer::RowTokenizer;

/// Configures and opens a [`CsvReader`].
///
/// # Example
///
/// ```no_run
/// use delimited_stream::{DelimiterSet, ReaderBuilder};
///
/// let mut builder = ReaderBuilder::new();
/// builder
///     .delimiters(DelimiterSet::new(",", "\n", "\"", "#").unwrap())
///     .verify_header(["id", "name"]);
///
/// let mut reader = builder.from_path("people.csv").unwrap();
/// while let Some(record) = reader.read_record().unwrap() {
///     println!("{:?}", record);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    delimiters: DelimiterSet,
    buffer_capacity: usize,
    skip_header: bool,
    expected_header: Option<Vec<String>>,
    charset: Charset,
    strict_quotes: bool,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    /// Create a builder with default settings: `;` / `\n` / `"` / `#`
    /// delimiters, an 8192 character buffer, UTF-8 input, no header
    /// handling and strict quotes.
    pub fn new() -> Self {
        Self {
            delimiters: DelimiterSet::default(),
            buffer_capacity: DEFAULT_CAPACITY,
            skip_header: false,
            expected_header: None,
            charset: Charset::default(),
            strict_quotes: true,
        }
    }

    /// Set the delimiter set.
    pub fn delimiters(&mut self, delimiters: DelimiterSet) -> &mut Self {
        self.delimiters = delimiters;
        self
    }

    /// Set the circular buffer capacity in characters.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Drop the first row of the stream. Takes priority over
    /// [`verify_header`](Self::verify_header).
    pub fn skip_header(&mut self, skip: bool) -> &mut Self {
        self.skip_header = skip;
        self
    }

    /// Require the first row to hold exactly these column names, in order.
    pub fn verify_header<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expected_header = Some(names.into_iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Set how input bytes are decoded.
    pub fn charset(&mut self, charset: Charset) -> &mut Self {
        self.charset = charset;
        self
    }

    /// Fail on a quoted section left open at end of stream (the default),
    /// or return it as-is.
    pub fn strict_quotes(&mut self, strict: bool) -> &mut Self {
        self.strict_quotes = strict;
        self
    }

    /// Whether the header row will be skipped.
    pub fn skips_header(&self) -> bool {
        self.skip_header
    }

    /// Whether the header row will actually be verified; skipping disables it.
    pub fn verifies_header(&self) -> bool {
        !self.skip_header && self.expected_header.is_some()
    }

    /// Build a reader over an already decoded character source.
    pub fn from_source<S: CharSource>(&self, source: S) -> Result<CsvReader<S>> {
        let mut tokenizer = RowTokenizer::new(source, &self.delimiters, self.buffer_capacity)?;
        tokenizer.strict_quotes(self.strict_quotes);
        debug!(
            delimiters = %self.delimiters,
            capacity = self.buffer_capacity,
            skip_header = self.skip_header,
            verify_header = self.verifies_header(),
            "opened reader"
        );
        Ok(CsvReader {
            tokenizer,
            delimiters: self.delimiters.clone(),
            skip_header: self.skip_header,
            expected_header: if self.skip_header {
                None
            } else {
                self.expected_header.clone()
            },
            headers: None,
            row_count: 0,
            halted: false,
        })
    }

    /// Build a reader decoding bytes from `reader`.
    pub fn from_reader<R: Read>(&self, reader: R) -> Result<CsvReader<DecodingSource<R>>> {
        let source = DecodingSource::with_charset(reader, self.charset)?;
        self.from_source(source)
    }

    /// Open the file at `path`.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<CsvReader<DecodingSource<File>>> {
        let file = File::open(path.as_ref())?;
        self.from_reader(file)
    }
}

/// Forward-only reader of rows and records.
///
/// Every pull returns `Ok(Some(_))` for data, `Ok(None)` at end of stream and
/// `Err(_)` on failure, so a failing stream is never mistaken for an ended
/// one. A reader cannot be rewound; open a new one to start over.
pub struct CsvReader<S> {
    tokenizer: RowTokenizer<S>,
    delimiters: DelimiterSet,
    skip_header: bool,
    expected_header: Option<Vec<String>>,
    headers: Option<Vec<String>>,
    row_count: u64,
    halted: bool,
}

impl<S: CharSource> CsvReader<S> {
    /// Read the next row as raw text, applying the header policy.
    pub fn read_row(&mut self) -> Result<Option<String>> {
        if self.tokenizer.is_closed() {
            return Err(CsvError::StreamClosed);
        }
        if self.halted {
            return Ok(None);
        }

        loop {
            let Some(row) = self.tokenizer.next_row()? else {
                return Ok(None);
            };

            if row.is_header_candidate {
                if self.skip_header {
                    debug!("skipping header row");
                    self.headers = Some(self.unembraced_fields(&row.text));
                    continue;
                }
                if self.expected_header.is_some() {
                    self.verify_header(&row.text)?;
                    continue;
                }
            }

            self.row_count += 1;
            return Ok(Some(row.text));
        }
    }

    /// Read the next row split into fields. Fields keep their quote wrappers.
    pub fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        Ok(self
            .read_row()?
            .map(|row| split_record(&row, &self.delimiters)))
    }

    /// Read up to `batch` records. Fewer are returned only at end of stream.
    pub fn read_batch(&mut self, batch: usize) -> Result<Vec<Vec<String>>> {
        if batch == 0 {
            return Err(CsvError::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }
        let mut records = Vec::with_capacity(batch);
        while records.len() < batch {
            match self.read_record()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(records)
    }

    fn unembraced_fields(&self, text: &str) -> Vec<String> {
        split_record(text, &self.delimiters)
            .iter()
            .map(|field| unembrace(self.delimiters.quote(), field))
            .collect()
    }

    fn verify_header(&mut self, text: &str) -> Result<()> {
        let found = self.unembraced_fields(text);
        let expected = self.expected_header.clone().unwrap_or_default();
        if found != expected {
            self.halted = true;
            warn!(?expected, ?found, "header mismatch");
            return Err(CsvError::HeaderMismatch { expected, found });
        }
        debug!(columns = found.len(), "header verified");
        self.headers = Some(found);
        Ok(())
    }

    /// Iterate over raw rows.
    pub fn rows(&mut self) -> RowIter<'_, S> {
        RowIter {
            reader: self,
            done: false,
        }
    }

    /// Iterate over split records.
    pub fn records(&mut self) -> RecordIter<'_, S> {
        RecordIter {
            reader: self,
            done: false,
        }
    }

    /// Iterate over values decoded by `mapper`.
    ///
    /// With `ignore_errors`, rows that fail to map are logged and skipped;
    /// stream errors are always returned.
    pub fn deserialize<'r, 'm, T: Default>(
        &'r mut self,
        mapper: &'m RecordMapper<T>,
        ignore_errors: bool,
    ) -> DeserializeIter<'r, 'm, S, T> {
        DeserializeIter {
            reader: self,
            mapper,
            ignore_errors,
            done: false,
        }
    }

    /// Header fields, unembraced, once the header row has been skipped or
    /// verified.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Number of data rows returned so far (the header is not counted).
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// The delimiters this reader splits with.
    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delimiters
    }

    /// Close the reader and its underlying stream. Idempotent; any later
    /// read fails with [`CsvError::StreamClosed`].
    pub fn close(&mut self) {
        self.tokenizer.close();
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.tokenizer.is_closed()
    }
}

/// Iterator over raw rows; see [`CsvReader::rows`].
pub struct RowIter<'r, S> {
    reader: &'r mut CsvReader<S>,
    done: bool,
}

impl<S: CharSource> Iterator for RowIter<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.reader.read_row().transpose();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}

/// Iterator over split records; see [`CsvReader::records`].
pub struct RecordIter<'r, S> {
    reader: &'r mut CsvReader<S>,
    done: bool,
}

impl<S: CharSource> Iterator for RecordIter<'_, S> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.reader.read_record().transpose();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}

/// Iterator over mapped values; see [`CsvReader::deserialize`].
pub struct DeserializeIter<'r, 'm, S, T> {
    reader: &'r mut CsvReader<S>,
    mapper: &'m RecordMapper<T>,
    ignore_errors: bool,
    done: bool,
}

impl<S: CharSource, T: Default> Iterator for DeserializeIter<'_, '_, S, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let record = match self.reader.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let row = self.reader.row_count();
            match self.mapper.from_record(&record, self.reader.delimiters(), row) {
                Ok(value) => return Some(Ok(value)),
                Err(e) if self.ignore_errors => {
                    warn!(row, error = %e, "skipping row that failed to map");
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StrSource;
    use std::io::Cursor;

    const CSV: &str = "SUPER-COLUMN-1;SUPER-COLUMN-2\n\"c1__1\";\"inner 3;3\"\n\"c1__2\";\"inner 2;2\"\n\"c1__3\";\"inner 3;3\"\n";

    #[test]
    fn test_builder_defaults() {
        let builder = ReaderBuilder::new();
        assert_eq!(builder.buffer_capacity, 8192);
        assert_eq!(builder.delimiters, DelimiterSet::default());
        assert!(!builder.skips_header());
        assert!(!builder.verifies_header());
    }

    #[test]
    fn test_skip_header_disables_verify() {
        let mut builder = ReaderBuilder::new();
        builder.verify_header(["a"]);
        assert!(builder.verifies_header());
        builder.skip_header(true);
        assert!(!builder.verifies_header());
        builder.skip_header(false);
        assert!(builder.verifies_header());
    }

    #[test]
    fn test_header_returned_without_policy() {
        let mut reader = ReaderBuilder::new().from_source(StrSource::new(CSV)).unwrap();
        assert_eq!(
            reader.read_row().unwrap().as_deref(),
            Some("SUPER-COLUMN-1;SUPER-COLUMN-2")
        );
        assert_eq!(reader.headers(), None);
        assert_eq!(reader.rows().count(), 3);
        assert_eq!(reader.row_count(), 4);
    }

    #[test]
    fn test_skip_header() {
        let mut builder = ReaderBuilder::new();
        builder.skip_header(true).buffer_capacity(16);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        let rows: Vec<String> = reader.rows().collect::<Result<_>>().unwrap();
        assert_eq!(
            rows,
            vec![
                "\"c1__1\";\"inner 3;3\"",
                "\"c1__2\";\"inner 2;2\"",
                "\"c1__3\";\"inner 3;3\"",
            ]
        );
        assert_eq!(
            reader.headers(),
            Some(&["SUPER-COLUMN-1".to_string(), "SUPER-COLUMN-2".to_string()][..])
        );
    }

    #[test]
    fn test_rows_filter_count() {
        let mut builder = ReaderBuilder::new();
        builder.skip_header(true);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        let count = reader
            .rows()
            .filter(|r| r.as_ref().is_ok_and(|row| row.contains("inner 3;3")))
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_verify_header_ok() {
        let mut builder = ReaderBuilder::new();
        builder.verify_header(["SUPER-COLUMN-1", "SUPER-COLUMN-2"]);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        let first = reader.read_record().unwrap().unwrap();
        assert_eq!(first, vec!["\"c1__1\"", "\"inner 3;3\""]);
        assert_eq!(reader.headers().map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_verify_header_quoted_names() {
        let mut builder = ReaderBuilder::new();
        builder.verify_header(["id", "full;name"]);
        let mut reader = builder
            .from_source(StrSource::new("\"id\";\"full;name\"\n1;x\n"))
            .unwrap();
        assert_eq!(reader.read_record().unwrap(), Some(vec!["1".to_string(), "x".to_string()]));
    }

    #[test]
    fn test_verify_header_mismatch_stops_stream() {
        let mut builder = ReaderBuilder::new();
        builder.verify_header(["SUPER-COLUMN-1", "OTHER"]);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        match reader.read_row() {
            Err(CsvError::HeaderMismatch { expected, found }) => {
                assert_eq!(expected, vec!["SUPER-COLUMN-1", "OTHER"]);
                assert_eq!(found, vec!["SUPER-COLUMN-1", "SUPER-COLUMN-2"]);
            }
            other => panic!("expected header mismatch, got {other:?}"),
        }
        assert_eq!(reader.read_row().unwrap(), None);
    }

    #[test]
    fn test_verify_header_count_mismatch() {
        let mut builder = ReaderBuilder::new();
        builder.verify_header(["SUPER-COLUMN-1"]);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        let results: Vec<_> = reader.records().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CsvError::HeaderMismatch { .. })));
    }

    #[test]
    fn test_skip_wins_over_verify() {
        let mut builder = ReaderBuilder::new();
        builder.verify_header(["nope"]).skip_header(true);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        assert_eq!(reader.records().count(), 3);
    }

    #[test]
    fn test_read_batch() {
        let mut builder = ReaderBuilder::new();
        builder.skip_header(true);
        let mut reader = builder.from_source(StrSource::new(CSV)).unwrap();
        assert!(matches!(reader.read_batch(0), Err(CsvError::InvalidConfig(_))));
        assert_eq!(reader.read_batch(2).unwrap().len(), 2);
        assert_eq!(reader.read_batch(2).unwrap().len(), 1);
        assert!(reader.read_batch(2).unwrap().is_empty());
    }

    #[test]
    fn test_from_reader_decodes_bytes() {
        let bytes = "h\n\"grüße\";\"x\"\n".as_bytes().to_vec();
        let mut builder = ReaderBuilder::new();
        builder.skip_header(true);
        let mut reader = builder.from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(
            reader.read_record().unwrap(),
            Some(vec!["\"grüße\"".to_string(), "\"x\"".to_string()])
        );
    }

    #[test]
    fn test_closed_reader_fails() {
        let mut reader = ReaderBuilder::new().from_source(StrSource::new(CSV)).unwrap();
        assert!(reader.read_row().unwrap().is_some());
        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(matches!(reader.read_row(), Err(CsvError::StreamClosed)));
        assert!(matches!(reader.read_record(), Err(CsvError::StreamClosed)));
        let mut rows = reader.rows();
        assert!(matches!(rows.next(), Some(Err(CsvError::StreamClosed))));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_invalid_capacity() {
        let mut builder = ReaderBuilder::new();
        builder.buffer_capacity(0);
        assert!(matches!(
            builder.from_source(StrSource::new(CSV)),
            Err(CsvError::InvalidConfig(_))
        ));
    }
}
