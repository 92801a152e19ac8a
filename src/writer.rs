//! Writing delimited records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use encoding_rs::{CoderResult, Encoder, Encoding, UTF_8};
use tracing::debug;

use crate::delimiters::DelimiterSet;
use crate::error::{CsvError, Result};
use crate::mapping::RecordMapper;
use crate::split::embrace;

/// Configures and opens a [`CsvWriter`].
///
/// # Example
///
/// ```no_run
/// use delimited_stream::WriterBuilder;
///
/// let mut writer = WriterBuilder::new()
///     .header(["name", "city"])
///     .from_path("out.csv")
///     .unwrap();
/// writer.write_record(["Alice", "New York; NY"]).unwrap();
/// writer.close().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct WriterBuilder {
    delimiters: DelimiterSet,
    header: Option<Vec<String>>,
    encoding: &'static Encoding,
}

impl Default for WriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterBuilder {
    /// Create a builder with the default delimiters, UTF-8 output and no
    /// header.
    pub fn new() -> Self {
        Self {
            delimiters: DelimiterSet::default(),
            header: None,
            encoding: UTF_8,
        }
    }

    /// Set the delimiter set.
    pub fn delimiters(&mut self, delimiters: DelimiterSet) -> &mut Self {
        self.delimiters = delimiters;
        self
    }

    /// Write these column names as the first row.
    pub fn header<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.header = Some(names.into_iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Set the output encoding. Characters the encoding cannot represent are
    /// written as HTML numeric character references. UTF-16 encodings
    /// produce UTF-8, as `encoding_rs` has no UTF-16 encoder.
    pub fn encoding(&mut self, encoding: &'static Encoding) -> &mut Self {
        self.encoding = encoding;
        self
    }

    /// Build a writer over `writer`.
    pub fn from_writer<W: Write>(&self, writer: W) -> CsvWriter<W> {
        CsvWriter {
            inner: Some(writer),
            delimiters: self.delimiters.clone(),
            header: self.header.clone(),
            header_written: false,
            row_count: 0,
            line: String::with_capacity(1024),
            encoder: (self.encoding.output_encoding() != UTF_8)
                .then(|| self.encoding.new_encoder()),
            encoded: Vec::new(),
        }
    }

    /// Create (or truncate) the file at `path`.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<CsvWriter<BufWriter<File>>> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened writer");
        Ok(self.from_writer(BufWriter::new(file)))
    }
}

/// Writes records as delimited text, UTF-8 unless configured otherwise.
///
/// Every value is embraced with the quote delimiter (inner quotes doubled),
/// values are joined with the column delimiter and each record ends with the
/// row delimiter. Comment lines are never written.
pub struct CsvWriter<W: Write> {
    inner: Option<W>,
    delimiters: DelimiterSet,
    header: Option<Vec<String>>,
    header_written: bool,
    row_count: u64,
    line: String,
    encoder: Option<Encoder>,
    encoded: Vec<u8>,
}

/// Encode `text` into `out`, replacing `out`'s contents.
fn encode_into(encoder: &mut Encoder, text: &str, out: &mut Vec<u8>, last: bool) -> io::Result<()> {
    out.clear();
    let mut input = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_if_no_unmappables(input.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "encoded line too large"))?;
        // Room for one numeric character reference such as "&#1114111;".
        out.reserve(needed + 10);
        let (result, read, _) = encoder.encode_from_utf8_to_vec(input, out, last);
        input = &input[read..];
        match result {
            CoderResult::InputEmpty => return Ok(()),
            CoderResult::OutputFull => continue,
        }
    }
}

impl<W: Write> CsvWriter<W> {
    fn write_line<I, S>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = self.inner.as_mut().ok_or(CsvError::StreamClosed)?;

        self.line.clear();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.line.push_str(self.delimiters.column());
            }
            self.line
                .push_str(&embrace(self.delimiters.quote(), field.as_ref()));
        }
        self.line.push_str(self.delimiters.row());

        match self.encoder.as_mut() {
            Some(encoder) => {
                encode_into(encoder, &self.line, &mut self.encoded, false)?;
                inner.write_all(&self.encoded)?;
            }
            None => inner.write_all(self.line.as_bytes())?,
        }
        Ok(())
    }

    /// Write a pending header and end the encoder's output.
    fn finish(&mut self) -> Result<()> {
        self.write_header()?;
        let inner = self.inner.as_mut().ok_or(CsvError::StreamClosed)?;
        if let Some(encoder) = self.encoder.as_mut() {
            encode_into(encoder, "", &mut self.encoded, true)?;
            inner.write_all(&self.encoded)?;
        }
        self.encoder = None;
        inner.flush()?;
        Ok(())
    }

    /// Write the configured header row if it has not been written yet.
    /// Called implicitly before the first record and on close.
    pub fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        if self.inner.is_none() {
            return Err(CsvError::StreamClosed);
        }
        if let Some(header) = self.header.take() {
            self.write_line(&header)?;
            self.header = Some(header);
        }
        self.header_written = true;
        Ok(())
    }

    /// Write one record.
    pub fn write_record<I, S>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.write_header()?;
        self.write_line(fields)?;
        self.row_count += 1;
        Ok(())
    }

    /// Write several records.
    pub fn write_records<I, R, S>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Encode `value` with `mapper` and write it.
    pub fn serialize<T>(&mut self, mapper: &RecordMapper<T>, value: &T) -> Result<()> {
        let record = mapper.to_record(value);
        self.write_record(&record)
    }

    /// Number of records written, not counting the header.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Flush buffered output to the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(CsvError::StreamClosed)?;
        inner.flush()?;
        Ok(())
    }

    /// Write a pending header, flush and release the underlying writer.
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        self.finish()?;
        self.inner = None;
        debug!(rows = self.row_count, "closed writer");
        Ok(())
    }

    /// Write a pending header, flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.inner.take().ok_or(CsvError::StreamClosed)
    }
}
