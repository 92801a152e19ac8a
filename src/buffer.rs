//! Fixed-size circular character buffer over a [`CharSource`].
//!
//! The buffer owns its source. Data is pulled synchronously, only when a
//! peek or take needs more characters than are currently held.

use std::io;

use tracing::{debug, trace};

use crate::error::{CsvError, Result};
use crate::source::CharSource;

/// Default buffer capacity in characters.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Circular buffer of characters read ahead from a [`CharSource`].
///
/// `available` is tracked explicitly, so a full buffer and an empty buffer
/// are never confused even though both have the write position equal to the
/// read position.
pub struct CircularBuffer<S> {
    source: Option<S>,
    storage: Box<[char]>,
    read_pos: usize,
    available: usize,
    at_end: bool,
}

impl<S: CharSource> CircularBuffer<S> {
    fn build(source: S, capacity: usize) -> Self {
        Self {
            source: Some(source),
            storage: vec!['\0'; capacity].into_boxed_slice(),
            read_pos: 0,
            available: 0,
            at_end: false,
        }
    }

    /// Create a buffer holding at most `capacity` characters.
    pub fn with_capacity(source: S, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CsvError::InvalidConfig(
                "buffer capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self::build(source, capacity))
    }

    /// Create a buffer with [`DEFAULT_CAPACITY`].
    pub fn new(source: S) -> Self {
        Self::build(source, DEFAULT_CAPACITY)
    }

    /// Capacity in characters. Zero once closed.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Characters held and not yet consumed.
    #[inline]
    pub fn available(&self) -> usize {
        self.available
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Returns true if nothing is buffered and the source is exhausted.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.fill(1)? == 0)
    }

    /// Top the buffer up until at least `wanted` characters are held, the
    /// buffer is full, or the source is exhausted. Returns the number of
    /// characters available afterwards.
    fn fill(&mut self, wanted: usize) -> Result<usize> {
        let source = self.source.as_mut().ok_or(CsvError::StreamClosed)?;
        let capacity = self.storage.len();
        let wanted = wanted.min(capacity);

        while self.available < wanted && !self.at_end {
            let write_pos = (self.read_pos + self.available) % capacity;
            // One contiguous free run: either up to the end of storage, or up
            // to the read position when the free space has wrapped.
            let run = (capacity - self.available).min(capacity - write_pos);
            let target = &mut self.storage[write_pos..write_pos + run];

            let read = loop {
                match source.read_chars(target) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            };

            if read == 0 {
                trace!(available = self.available, "source exhausted");
                self.at_end = true;
            } else {
                trace!(read, write_pos, run, "refilled buffer");
                self.available += read.min(run);
            }
        }

        Ok(self.available)
    }

    /// Check whether `pattern` appears `offset` characters past the read
    /// position, without consuming anything.
    ///
    /// An empty pattern never matches; empty delimiters mean "disabled".
    /// A pattern that cannot fit in the buffer never matches either.
    pub fn peek_matches(&mut self, offset: usize, pattern: &[char]) -> Result<bool> {
        if self.is_closed() {
            return Err(CsvError::StreamClosed);
        }
        if pattern.is_empty() {
            return Ok(false);
        }
        let needed = offset + pattern.len();
        if needed > self.capacity() {
            return Ok(false);
        }
        if self.available < needed && self.fill(needed)? < needed {
            return Ok(false);
        }

        let capacity = self.capacity();
        let start = self.read_pos + offset;
        Ok(pattern
            .iter()
            .enumerate()
            .all(|(i, &c)| self.storage[(start + i) % capacity] == c))
    }

    /// Consume exactly `n` characters, appending them to `out`.
    ///
    /// Returns `false` and consumes nothing if fewer than `n` characters
    /// remain before the end of the stream.
    pub fn take_next(&mut self, n: usize, out: &mut String) -> Result<bool> {
        self.take_with(n, Some(out))
    }

    /// Consume exactly `n` characters without keeping them.
    pub fn advance(&mut self, n: usize) -> Result<bool> {
        self.take_with(n, None)
    }

    fn take_with(&mut self, n: usize, out: Option<&mut String>) -> Result<bool> {
        if self.is_closed() {
            return Err(CsvError::StreamClosed);
        }
        let capacity = self.capacity();
        if n > capacity {
            return Err(CsvError::InvalidConfig(format!(
                "cannot take {n} characters from a buffer of {capacity}"
            )));
        }
        if n == 0 {
            return Ok(true);
        }
        if self.available < n && self.fill(n)? < n {
            return Ok(false);
        }

        if let Some(out) = out {
            // Tail then head when the run crosses the end of storage.
            let first = n.min(capacity - self.read_pos);
            out.extend(&self.storage[self.read_pos..self.read_pos + first]);
            out.extend(&self.storage[..n - first]);
        }
        self.read_pos = (self.read_pos + n) % capacity;
        self.available -= n;
        Ok(true)
    }

    /// Release the source and the storage. Closing twice is a no-op; every
    /// other operation on a closed buffer fails with
    /// [`CsvError::StreamClosed`].
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(discarded = self.available, "closing buffer");
        }
        self.storage = Box::default();
        self.read_pos = 0;
        self.available = 0;
        self.at_end = true;
    }
}
