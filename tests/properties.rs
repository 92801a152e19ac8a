//! Property tests for delimited-stream

use delimited_stream::{DelimiterSet, ReaderBuilder, StrSource, WriterBuilder, unembrace};
use proptest::prelude::*;

fn write_all(delimiters: &DelimiterSet, records: &[Vec<String>]) -> Vec<u8> {
    let mut writer = WriterBuilder::new()
        .delimiters(delimiters.clone())
        .from_writer(Vec::new());
    writer.write_records(records).unwrap();
    writer.into_inner().unwrap()
}

fn read_all(delimiters: &DelimiterSet, bytes: &[u8], capacity: usize) -> Vec<Vec<String>> {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiters(delimiters.clone())
        .buffer_capacity(capacity);
    let mut reader = builder.from_reader(bytes).unwrap();
    reader
        .records()
        .map(|r| {
            r.unwrap()
                .iter()
                .map(|f| unembrace(delimiters.quote(), f))
                .collect::<Vec<String>>()
        })
        .collect()
}

fn read_rows(text: &str, capacity: usize) -> Vec<String> {
    let mut builder = ReaderBuilder::new();
    builder.buffer_capacity(capacity).strict_quotes(false);
    let mut reader = builder.from_source(StrSource::new(text)).unwrap();
    reader.rows().map(Result::unwrap).collect()
}

proptest! {
    /// Anything written is read back unchanged.
    #[test]
    fn round_trip_default_delimiters(
        records in prop::collection::vec(prop::collection::vec(any::<String>(), 1..5), 0..12),
        capacity in 2usize..64,
    ) {
        let delimiters = DelimiterSet::default();
        let bytes = write_all(&delimiters, &records);
        prop_assert_eq!(read_all(&delimiters, &bytes, capacity), records);
    }

    /// Round trip with multi-character delimiters and values built from their pieces.
    #[test]
    fn round_trip_multi_char_delimiters(
        records in prop::collection::vec(
            prop::collection::vec("[a-c<q>|\r\n -]{0,8}", 1..4),
            0..8,
        ),
        capacity in 3usize..32,
    ) {
        let delimiters = DelimiterSet::new("||", "\r\n", "<q>", "--").unwrap();
        let bytes = write_all(&delimiters, &records);
        prop_assert_eq!(read_all(&delimiters, &bytes, capacity), records);
    }

    /// The rows extracted do not depend on the buffer capacity.
    #[test]
    fn rows_independent_of_capacity(
        text in "[a;\"#\n]{0,80}",
        capacity in 1usize..12,
    ) {
        prop_assert_eq!(read_rows(&text, capacity), read_rows(&text, 8192));
    }
}
