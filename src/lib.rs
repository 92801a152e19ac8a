//! delimited-stream: streaming reader and writer for delimited text
//!
//! Reads CSV-like data row by row through a fixed-size circular character
//! buffer, so files of any size are processed in constant memory. Every
//! delimiter (column, row, quote and comment) may be several characters long.
//!
//! # Quick Start
//!
//! ```no_run
//! use delimited_stream::{DelimiterSet, ReaderBuilder, WriterBuilder};
//!
//! // Read a semicolon separated file, dropping its header row
//! let mut builder = ReaderBuilder::new();
//! builder.skip_header(true);
//!
//! let mut reader = builder.from_path("data.csv").unwrap();
//! for record in reader.records() {
//!     println!("{:?}", record.unwrap());
//! }
//!
//! // Write with custom delimiters
//! let mut writer = WriterBuilder::new()
//!     .delimiters(DelimiterSet::new("||", "\r\n", "'", "--").unwrap())
//!     .header(["id", "name"])
//!     .from_path("out.txt")
//!     .unwrap();
//! writer.write_record(["1", "Ada"]).unwrap();
//! writer.close().unwrap();
//! ```
//!
//! # Rows, fields and quotes
//!
//! A row delimiter inside a quoted section is part of the row, and a column
//! delimiter inside a quoted section is part of the field. Fields are
//! returned with their quote wrappers; [`unembrace`] removes them. Lines that
//! start with the comment delimiter and blank lines are skipped.

mod buffer;
mod delimiters;
mod error;
mod mapping;
mod reader;
mod source;
mod split;
mod tokenizer;
mod writer;

pub use buffer::{CircularBuffer, DEFAULT_CAPACITY};
pub use delimiters::DelimiterSet;
pub use error::{CsvError, Result};
pub use mapping::{FieldMapping, RecordMapper};
pub use reader::{CsvReader, DeserializeIter, ReaderBuilder, RecordIter, RowIter};
pub use split::{embrace, split_columns, split_record, unembrace};
pub use tokenizer::{Row, RowTokenizer};
pub use writer::{CsvWriter, WriterBuilder};

// Re-export for advanced usage
pub use source::{
    CharSource, Charset, DecodingSource, StrSource, DETECT_SAMPLE_SIZE, detect_encoding,
    has_utf8_bom, is_utf8_prefix,
};
