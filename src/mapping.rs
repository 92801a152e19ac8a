//! Explicit column-to-field mappings.
//!
//! A [`RecordMapper`] is an ordered list of [`FieldMapping`]s built up front;
//! each one knows its column index and how to encode and decode one field of
//! `T`.

use std::fmt;
use std::str::FromStr;

use crate::delimiters::DelimiterSet;
use crate::error::{CsvError, Result};
use crate::split::unembrace;

type EncodeFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type DecodeFn<T> = Box<dyn Fn(&mut T, &str) -> std::result::Result<(), String> + Send + Sync>;

/// Mapping between one column and one field of `T`.
pub struct FieldMapping<T> {
    name: String,
    column: usize,
    encode: EncodeFn<T>,
    decode: DecodeFn<T>,
}

impl<T> FieldMapping<T> {
    /// Create a mapping from explicit encode and decode functions.
    pub fn new<E, D>(name: impl Into<String>, column: usize, encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> String + Send + Sync + 'static,
        D: Fn(&mut T, &str) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            column,
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }

    /// Create a mapping for a field that round-trips through
    /// [`Display`](fmt::Display) and [`FromStr`].
    pub fn parsed<V, G, P>(name: impl Into<String>, column: usize, get: G, set: P) -> Self
    where
        V: FromStr + fmt::Display,
        V::Err: fmt::Display,
        G: Fn(&T) -> V + Send + Sync + 'static,
        P: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self::new(
            name,
            column,
            move |value| get(value).to_string(),
            move |target, text| {
                let parsed = text.parse::<V>().map_err(|e| e.to_string())?;
                set(target, parsed);
                Ok(())
            },
        )
    }

    /// Column name, as written in the header row.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based column index.
    pub fn column(&self) -> usize {
        self.column
    }
}

impl<T> fmt::Debug for FieldMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("name", &self.name)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Ordered set of field mappings for records of type `T`.
#[derive(Debug)]
pub struct RecordMapper<T> {
    fields: Vec<FieldMapping<T>>,
    width: usize,
}

impl<T> RecordMapper<T> {
    /// Build a mapper. Fields are ordered by column; the mapping must not be
    /// empty and no column may be mapped twice.
    pub fn new(mut fields: Vec<FieldMapping<T>>) -> Result<Self> {
        if fields.is_empty() {
            return Err(CsvError::InvalidConfig(
                "record mapping needs at least one field".to_string(),
            ));
        }
        fields.sort_by_key(FieldMapping::column);
        if let Some(pair) = fields.windows(2).find(|w| w[0].column == w[1].column) {
            return Err(CsvError::InvalidConfig(format!(
                "column {} is mapped by both {:?} and {:?}",
                pair[0].column, pair[0].name, pair[1].name
            )));
        }
        let width = fields.last().map_or(0, |f| f.column + 1);
        Ok(Self { fields, width })
    }

    /// Number of columns in a record, including unmapped gaps.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Header names by column; unmapped columns have empty names.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec![String::new(); self.width];
        for field in &self.fields {
            headers[field.column] = field.name.clone();
        }
        headers
    }

    /// Encode `value` into one record of plain (unembraced) values.
    pub fn to_record(&self, value: &T) -> Vec<String> {
        let mut record = vec![String::new(); self.width];
        for field in &self.fields {
            record[field.column] = (field.encode)(value);
        }
        record
    }

    /// Decode a split record into a fresh `T`. Fields are unembraced before
    /// decoding; `row` is only used in error reports.
    pub fn from_record(&self, record: &[String], delimiters: &DelimiterSet, row: u64) -> Result<T>
    where
        T: Default,
    {
        let mut value = T::default();
        for field in &self.fields {
            let raw = record.get(field.column).ok_or_else(|| CsvError::Mapping {
                row,
                column: field.column,
                message: format!("missing column {:?}", field.name),
            })?;
            let text = unembrace(delimiters.quote(), raw);
            (field.decode)(&mut value, &text).map_err(|message| CsvError::Mapping {
                row,
                column: field.column,
                message: format!("{}: {message}", field.name),
            })?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: u32,
        name: String,
        score: f64,
    }

    fn mapper() -> RecordMapper<Person> {
        RecordMapper::new(vec![
            FieldMapping::parsed("score", 3, |p: &Person| p.score, |p, v| p.score = v),
            FieldMapping::parsed("id", 0, |p: &Person| p.id, |p, v| p.id = v),
            FieldMapping::new(
                "name",
                1,
                |p: &Person| p.name.clone(),
                |p, s| {
                    p.name = s.to_string();
                    Ok(())
                },
            ),
        ])
        .unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_headers_ordered_with_gaps() {
        assert_eq!(mapper().headers(), vec!["id", "name", "", "score"]);
        assert_eq!(mapper().width(), 4);
    }

    #[test]
    fn test_to_record() {
        let person = Person {
            id: 7,
            name: "Ada".to_string(),
            score: 9.5,
        };
        assert_eq!(mapper().to_record(&person), vec!["7", "Ada", "", "9.5"]);
    }

    #[test]
    fn test_from_record_unembraces() {
        let record = strings(&["\"7\"", "\"Ada; Countess\"", "ignored", "9.5"]);
        let person = mapper()
            .from_record(&record, &DelimiterSet::default(), 1)
            .unwrap();
        assert_eq!(
            person,
            Person {
                id: 7,
                name: "Ada; Countess".to_string(),
                score: 9.5,
            }
        );
    }

    #[test]
    fn test_from_record_parse_error() {
        let record = strings(&["x", "Ada", "", "1"]);
        match mapper().from_record(&record, &DelimiterSet::default(), 4) {
            Err(CsvError::Mapping { row, column, message }) => {
                assert_eq!(row, 4);
                assert_eq!(column, 0);
                assert!(message.starts_with("id:"));
            }
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_record_missing_column() {
        let record = strings(&["1", "Ada"]);
        assert!(matches!(
            mapper().from_record(&record, &DelimiterSet::default(), 1),
            Err(CsvError::Mapping { column: 3, .. })
        ));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_columns() {
        assert!(RecordMapper::<Person>::new(Vec::new()).is_err());
        let duplicate = RecordMapper::new(vec![
            FieldMapping::parsed("a", 0, |p: &Person| p.id, |p, v| p.id = v),
            FieldMapping::parsed("b", 0, |p: &Person| p.score, |p, v| p.score = v),
        ]);
        assert!(matches!(duplicate, Err(CsvError::InvalidConfig(_))));
    }
}
