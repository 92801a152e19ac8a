//! Column splitting and quote embracing.

use crate::delimiters::DelimiterSet;

/// Split one row of raw text into its fields.
///
/// A quote delimiter toggles the "inside quoted field" state; while inside,
/// column delimiters are plain text. Fields keep their quote wrappers, use
/// [`unembrace`] to strip them. Blank columns are preserved, but a column
/// delimiter at the very end of the row does not start another column.
///
/// An empty `quote` disables quoting. This never fails: malformed quoting
/// simply yields whatever fields can be delimited.
pub fn split_columns(raw: &str, quote: &str, column: &str) -> Vec<String> {
    if column.is_empty() {
        return vec![raw.to_string()];
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut inside_quote = false;
    let mut ended_on_delimiter = false;
    let mut pos = 0;

    while pos < raw.len() {
        let rest = &raw[pos..];
        if !quote.is_empty() && rest.starts_with(quote) {
            current.push_str(quote);
            pos += quote.len();
            inside_quote = !inside_quote;
            ended_on_delimiter = false;
        } else if !inside_quote && rest.starts_with(column) {
            fields.push(std::mem::take(&mut current));
            pos += column.len();
            ended_on_delimiter = true;
        } else if let Some(ch) = rest.chars().next() {
            current.push(ch);
            pos += ch.len_utf8();
            ended_on_delimiter = false;
        } else {
            break;
        }
    }

    // A trailing column delimiter closes the last column, it does not open one.
    if !ended_on_delimiter {
        fields.push(current);
    }
    fields
}

/// [`split_columns`] with the quote and column delimiters of `delimiters`.
pub fn split_record(raw: &str, delimiters: &DelimiterSet) -> Vec<String> {
    split_columns(raw, delimiters.quote(), delimiters.column())
}

/// Wrap `value` in `quote`, doubling any quote already inside it.
pub fn embrace(quote: &str, value: &str) -> String {
    if quote.is_empty() {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2 * quote.len());
    out.push_str(quote);
    if value.contains(quote) {
        out.push_str(&value.replace(quote, &quote.repeat(2)));
    } else {
        out.push_str(value);
    }
    out.push_str(quote);
    out
}

/// Strip the quote wrapper from a field and undo quote doubling.
///
/// Surrounding whitespace is ignored when looking for the wrapper. A field
/// that is not fully embraced is returned unchanged.
pub fn unembrace(quote: &str, field: &str) -> String {
    if quote.is_empty() {
        return field.to_string();
    }
    let trimmed = field.trim();
    if trimmed.len() >= 2 * quote.len() && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
        let inner = &trimmed[quote.len()..trimmed.len() - quote.len()];
        inner.replace(&quote.repeat(2), quote)
    } else {
        field.to_string()
    }
}
