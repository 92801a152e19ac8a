use std::fmt;

use crate::error::{CsvError, Result};

/// The four markers that shape a delimited stream.
///
/// Every marker is a string, not a single character, so `"||"` or `"\r\n"`
/// work as well as `";"`. The quote and comment markers may be empty, which
/// turns quoting or comment detection off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterSet {
    column: String,
    row: String,
    quote: String,
    comment: String,
}

impl Default for DelimiterSet {
    fn default() -> Self {
        Self {
            column: ";".to_string(),
            row: "\n".to_string(),
            quote: "\"".to_string(),
            comment: "#".to_string(),
        }
    }
}

impl DelimiterSet {
    /// Create a delimiter set.
    ///
    /// The column and row delimiters must be non-empty and distinct.
    pub fn new(
        column: impl Into<String>,
        row: impl Into<String>,
        quote: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self> {
        let set = Self {
            column: column.into(),
            row: row.into(),
            quote: quote.into(),
            comment: comment.into(),
        };
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        if self.column.is_empty() {
            return Err(CsvError::InvalidConfig(
                "column delimiter must not be empty".to_string(),
            ));
        }
        if self.row.is_empty() {
            return Err(CsvError::InvalidConfig(
                "row delimiter must not be empty".to_string(),
            ));
        }
        if self.column == self.row {
            return Err(CsvError::InvalidConfig(format!(
                "column and row delimiters must differ (both {:?})",
                self.column
            )));
        }
        if !self.quote.is_empty() && (self.quote == self.column || self.quote == self.row) {
            return Err(CsvError::InvalidConfig(format!(
                "quote delimiter {:?} collides with the column or row delimiter",
                self.quote
            )));
        }
        if !self.comment.is_empty()
            && [&self.column, &self.row, &self.quote].contains(&&self.comment)
        {
            return Err(CsvError::InvalidConfig(format!(
                "comment delimiter {:?} collides with the column, row or quote delimiter",
                self.comment
            )));
        }
        Ok(())
    }

    /// Column delimiter.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Row delimiter.
    pub fn row(&self) -> &str {
        &self.row
    }

    /// Quote (content) delimiter; empty when quoting is disabled.
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Comment delimiter; empty when comment detection is disabled.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns true if quoted fields are recognised.
    pub fn has_quote(&self) -> bool {
        !self.quote.is_empty()
    }

    /// Returns true if comment lines are recognised.
    pub fn has_comment(&self) -> bool {
        !self.comment.is_empty()
    }

    /// Length in characters of the longest delimiter.
    pub fn longest(&self) -> usize {
        [&self.column, &self.row, &self.quote, &self.comment]
            .iter()
            .map(|d| d.chars().count())
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for DelimiterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column={:?} row={:?} quote={:?} comment={:?}",
            self.column, self.row, self.quote, self.comment
        )
    }
}
