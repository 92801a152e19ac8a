//! Character sources: decoding a byte stream into characters using
//! chardetng and `encoding_rs`.

use std::io::{self, Cursor, Read};

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8, UTF_16BE, UTF_16LE};
use tracing::{debug, trace};

use crate::error::{CsvError, Result};

/// Number of bytes inspected by [`Charset::Detect`].
pub const DETECT_SAMPLE_SIZE: usize = 8192;

const READ_CHUNK_SIZE: usize = 8192;

/// A forward-only stream of characters.
pub trait CharSource {
    /// Read up to `buf.len()` characters into `buf`.
    ///
    /// Returns the number of characters written; `0` means the stream is
    /// exhausted. Fewer characters than requested is not end of stream.
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize>;
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        (**self).read_chars(buf)
    }
}

impl<S: CharSource + ?Sized> CharSource for Box<S> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        (**self).read_chars(buf)
    }
}

/// In-memory source over already decoded text.
#[derive(Debug, Clone)]
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars(),
        }
    }
}

impl CharSource for StrSource<'_> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        for (slot, ch) in buf.iter_mut().zip(self.chars.by_ref()) {
            *slot = ch;
            n += 1;
        }
        Ok(n)
    }
}

/// How the bytes of an input stream are turned into characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Decode with the given encoding. A byte order mark, if present,
    /// still takes precedence and is removed.
    Fixed(&'static Encoding),
    /// Guess the encoding from the first [`DETECT_SAMPLE_SIZE`] bytes.
    Detect,
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Fixed(UTF_8)
    }
}

impl Charset {
    /// Resolve a WHATWG encoding label such as `"latin1"` or `"utf-16le"`.
    /// The label `"auto"` selects [`Charset::Detect`].
    pub fn from_label(label: &str) -> Result<Self> {
        if label.eq_ignore_ascii_case("auto") {
            return Ok(Charset::Detect);
        }
        Encoding::for_label(label.trim().as_bytes())
            .map(Charset::Fixed)
            .ok_or_else(|| CsvError::InvalidConfig(format!("unknown encoding label: {label}")))
    }
}

/// Check if the given bytes are valid UTF-8, allowing the last multi-byte
/// sequence to be cut off by the end of the sample.
pub fn is_utf8_prefix(data: &[u8]) -> bool {
    match simdutf8::compat::from_utf8(data) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// Check if the data starts with a UTF-8 BOM (Byte Order Mark).
pub fn has_utf8_bom(data: &[u8]) -> bool {
    data.starts_with(&[0xEF, 0xBB, 0xBF])
}

/// Guess the encoding of a sample of bytes.
///
/// Byte order marks win, then valid UTF-8, then whatever chardetng
/// considers most likely.
pub fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if sample.starts_with(&[0xFF, 0xFE]) {
        return UTF_16LE;
    }
    if sample.starts_with(&[0xFE, 0xFF]) {
        return UTF_16BE;
    }
    if has_utf8_bom(sample) || is_utf8_prefix(sample) {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, false);
    detector.guess(None, true)
}

/// Incremental byte-to-character decoder over any [`Read`].
pub struct DecodingSource<R> {
    inner: io::Chain<Cursor<Vec<u8>>, R>,
    decoder: Decoder,
    bytes: Box<[u8]>,
    decoded: String,
    cursor: usize,
    finished: bool,
}

impl<R: Read> DecodingSource<R> {
    /// Decode `reader` with a fixed encoding.
    pub fn new(reader: R, encoding: &'static Encoding) -> Self {
        Self::with_lead(Vec::new(), reader, encoding)
    }

    /// Decode `reader` according to `charset`, sniffing a sample first when
    /// detection is requested.
    pub fn with_charset(mut reader: R, charset: Charset) -> io::Result<Self> {
        match charset {
            Charset::Fixed(encoding) => Ok(Self::new(reader, encoding)),
            Charset::Detect => {
                let mut sample = Vec::with_capacity(DETECT_SAMPLE_SIZE);
                reader
                    .by_ref()
                    .take(DETECT_SAMPLE_SIZE as u64)
                    .read_to_end(&mut sample)?;
                let encoding = detect_encoding(&sample);
                debug!(encoding = encoding.name(), sampled = sample.len(), "detected input encoding");
                Ok(Self::with_lead(sample, reader, encoding))
            }
        }
    }

    fn with_lead(lead: Vec<u8>, reader: R, encoding: &'static Encoding) -> Self {
        Self {
            inner: Cursor::new(lead).chain(reader),
            decoder: encoding.new_decoder(),
            bytes: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
            decoded: String::new(),
            cursor: 0,
            finished: false,
        }
    }

    /// Encoding in use. May differ from the requested one once a byte order
    /// mark has been seen.
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    fn read_bytes(&mut self) -> io::Result<usize> {
        loop {
            match self.inner.read(&mut self.bytes) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let read = self.read_bytes()?;
        let last = read == 0;

        self.decoded.clear();
        self.cursor = 0;

        let mut input = &self.bytes[..read];
        loop {
            let needed = self.decoder.max_utf8_buffer_length(input.len()).ok_or_else(|| {
                io::Error::new(io::ErrorKind::OutOfMemory, "decoded chunk too large")
            })?;
            self.decoded.reserve(needed);
            let (result, consumed, _) = self.decoder.decode_to_string(input, &mut self.decoded, last);
            input = &input[consumed..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }

        trace!(bytes = read, decoded_bytes = self.decoded.len(), "decoded chunk");
        if last {
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> CharSource for DecodingSource<R> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.cursor == self.decoded.len() {
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }

        let rest = &self.decoded[self.cursor..];
        let mut n = 0;
        let mut taken = 0;
        for (slot, ch) in buf.iter_mut().zip(rest.chars()) {
            *slot = ch;
            n += 1;
            taken += ch.len_utf8();
        }
        self.cursor += taken;
        Ok(n)
    }
}
