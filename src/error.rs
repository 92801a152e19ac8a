use std::io;
use thiserror::Error;

/// Error type for reading and writing delimited streams.
#[derive(Error, Debug)]
pub enum CsvError {
    /// IO error from the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The reader or writer was already closed.
    #[error("Stream closed")]
    StreamClosed,

    /// The header row does not match the expected column names.
    #[error("Header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A quoted section was still open when the stream ended.
    #[error("Unterminated quoted field in row {row}")]
    MalformedRow { row: u64 },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field could not be mapped to or from its column.
    #[error("Mapping error in row {row}, column {column}: {message}")]
    Mapping {
        row: u64,
        column: usize,
        message: String,
    },
}

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, CsvError>;
