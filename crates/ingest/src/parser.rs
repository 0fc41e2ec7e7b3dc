//! Streaming CSV row parser.
//!
//! Reads one record at a time from any `Read`, so large uploads are never
//! held in memory. A record is accepted only with exactly four fields and a
//! non-empty name and email; anything else is reported as malformed so it
//! never reaches the queue.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ErrorKind, ReaderBuilder, StringRecordsIntoIter, Trim};
use tracing::warn;

use intake_core::row::Row;

use crate::error::IngestError;

/// One item from the row stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRow {
    Row(Row),
    /// A record with the wrong number of fields, a blank name or email, or
    /// one the CSV reader could not decode (e.g. invalid UTF-8).
    Malformed { record: u64, field_count: usize },
}

/// CSV parser configuration.
#[derive(Debug, Clone)]
pub struct RowParser {
    delimiter: u8,
}

impl Default for RowParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl RowParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Open `path` for streaming. Fails with `SourceUnavailable` if the file
    /// cannot be opened.
    pub fn open(&self, path: &Path) -> Result<RowIter<File>, IngestError> {
        let file = File::open(path).map_err(|e| {
            IngestError::SourceUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(self.parse(file))
    }

    /// Parse rows lazily from `reader`. The sequence is forward-only.
    pub fn parse<R: Read>(&self, reader: R) -> RowIter<R> {
        let records = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true) // wrong-width rows are counted, not fatal
            .trim(Trim::All)
            .from_reader(reader)
            .into_records();
        RowIter {
            records,
            record: 0,
            done: false,
        }
    }
}

/// Lazy iterator over [`ParsedRow`]s.
///
/// An I/O failure while reading yields one `Err(SourceUnavailable)` and ends
/// the stream; rows already yielded stay valid.
pub struct RowIter<R> {
    records: StringRecordsIntoIter<R>,
    record: u64,
    done: bool,
}

impl<R: Read> Iterator for RowIter<R> {
    type Item = Result<ParsedRow, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.records.next()?;
        self.record += 1;

        match result {
            Ok(record) => {
                let fields: Vec<&str> = record.iter().collect();
                match Row::from_fields(&fields) {
                    Some(row) => Some(Ok(ParsedRow::Row(row))),
                    None => Some(Ok(ParsedRow::Malformed {
                        record: self.record,
                        field_count: fields.len(),
                    })),
                }
            }
            Err(e) => {
                if let ErrorKind::Io(io) = e.kind() {
                    // The reader cannot make progress past an I/O failure.
                    self.done = true;
                    return Some(Err(IngestError::SourceUnavailable(format!(
                        "read failed at record {}: {}",
                        self.record, io
                    ))));
                }
                warn!(record = self.record, error = %e, "undecodable CSV record");
                Some(Ok(ParsedRow::Malformed {
                    record: self.record,
                    field_count: 0,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(input: &str) -> Vec<ParsedRow> {
        RowParser::new()
            .parse(input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap()
    }

    /// Hands out `data`, then fails every later read.
    struct BrokenReader {
        data: std::io::Cursor<Vec<u8>>,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::new(std::io::ErrorKind::Other, "device gone")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_parses_and_trims_rows() {
        let parsed = rows("Alice , alice@x.com,1 Main St, 555-1111\nBob,bob@x.com,Addr,555\n");
        assert_eq!(
            parsed,
            vec![
                ParsedRow::Row(Row::new("Alice", "alice@x.com", "1 Main St", "555-1111")),
                ParsedRow::Row(Row::new("Bob", "bob@x.com", "Addr", "555")),
            ]
        );
    }

    #[test]
    fn test_wrong_width_rows_are_malformed() {
        let parsed = rows("a,b,c\na,b,c,d\na,b,c,d,e\n");
        assert_eq!(
            parsed[0],
            ParsedRow::Malformed {
                record: 1,
                field_count: 3
            }
        );
        assert!(matches!(parsed[1], ParsedRow::Row(_)));
        assert_eq!(
            parsed[2],
            ParsedRow::Malformed {
                record: 3,
                field_count: 5
            }
        );
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let parsed = rows("\"Doe, Jane\",jane@x.com,\"1 Main St, Apt 2\",555\n");
        match &parsed[0] {
            ParsedRow::Row(row) => {
                assert_eq!(row.name, "Doe, Jane");
                assert_eq!(row.address, "1 Main St, Apt 2");
            }
            other => panic!("expected row, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_delimiter() {
        let parsed: Vec<ParsedRow> = RowParser::new()
            .with_delimiter(b';')
            .parse("Ann;ann@x.com;Addr;555\n".as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(matches!(parsed[0], ParsedRow::Row(_)));
    }

    #[test]
    fn test_invalid_utf8_is_malformed_not_fatal() {
        let mut input = b"Ann,ann@x.com,Addr,555\n".to_vec();
        input.extend_from_slice(b"B\xffb,bob@x.com,Addr,555\n");
        input.extend_from_slice(b"Cal,cal@x.com,Addr,555\n");

        let parsed: Vec<ParsedRow> = RowParser::new()
            .parse(input.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(matches!(parsed[1], ParsedRow::Malformed { field_count: 0, .. }));
        assert!(matches!(parsed[2], ParsedRow::Row(_)));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let result = RowParser::new().open(&tmp.path().join("missing.csv"));
        assert!(matches!(result, Err(IngestError::SourceUnavailable(_))));
    }

    #[test]
    fn test_stream_is_lazy() {
        let mut iter = RowParser::new().parse("a,b,c,d\ne,f,g,h\n".as_bytes());
        assert!(matches!(iter.next(), Some(Ok(ParsedRow::Row(_)))));
        assert!(matches!(iter.next(), Some(Ok(ParsedRow::Row(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_read_error_is_yielded_then_stream_ends() {
        let reader = BrokenReader {
            data: std::io::Cursor::new(b"Ann,ann@x.com,Addr,555\n".to_vec()),
        };
        let mut iter = RowParser::new().parse(reader);
        assert!(matches!(iter.next(), Some(Ok(ParsedRow::Row(_)))));
        assert!(matches!(iter.next(), Some(Err(IngestError::SourceUnavailable(_)))));
        assert!(iter.next().is_none());
    }
}
