//! Turns one source file's bytes into a [`RawTable`].
//!
//! Delimited text is decoded by trying each configured encoding in order; the
//! first that decodes without error is used, with no content sniffing.
//! Workbooks carry their own encoding and only the first sheet is read.

use std::borrow::Cow;
use std::path::Path;

use calamine::{Xls, Xlsx};
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use tracing::debug;

use crate::combiner::error::FileError;
use crate::combiner::io::excel_read::read_first_sheet;
use crate::combiner::model::RawTable;
use crate::combiner::strategy::first_success;

/// Grammar used to split a file into rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Xlsx,
    Xls,
}

impl SourceFormat {
    /// Picks the grammar from the file extension. Anything that is not a
    /// known workbook extension is read as delimited text.
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => SourceFormat::Xlsx,
            "xls" => SourceFormat::Xls,
            _ => SourceFormat::Delimited,
        }
    }
}

/// Settings the loader needs from the run configuration.
#[derive(Debug, Clone)]
pub struct LoadOptions<'a> {
    pub encodings: &'a [&'static Encoding],
    pub delimiter: u8,
}

/// Reads one file into a table of trimmed string cells. Fully blank rows are
/// skipped.
pub fn load_table(
    name: &str,
    bytes: &[u8],
    options: &LoadOptions<'_>,
) -> Result<RawTable, FileError> {
    let table = match SourceFormat::from_name(name) {
        SourceFormat::Xlsx => read_first_sheet::<Xlsx<_>>(bytes)?,
        SourceFormat::Xls => read_first_sheet::<Xls<_>>(bytes)?,
        SourceFormat::Delimited => {
            let (encoding, text) = decode_first(bytes, options.encodings)?;
            debug!(file = name, encoding = encoding.name(), "decoded text");
            parse_delimited(&text, options.delimiter)?
        }
    };
    debug!(
        file = name,
        columns = table.columns.len(),
        rows = table.rows.len(),
        "loaded table"
    );
    Ok(table)
}

/// Decodes `bytes` with the first encoding in `encodings` that accepts them.
pub fn decode_first<'a>(
    bytes: &'a [u8],
    encodings: &[&'static Encoding],
) -> Result<(&'static Encoding, Cow<'a, str>), FileError> {
    first_success(encodings.iter().copied(), |encoding| {
        decode_strict(bytes, encoding)
            .map(|text| (encoding, text))
            .ok_or(encoding.name())
    })
    .map_err(|tried| FileError::DecodeFailure {
        tried: tried.into_iter().map(str::to_string).collect(),
    })
}

/// Decodes without replacement characters. A byte order mark is only
/// stripped when it names the encoding being tried.
fn decode_strict<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, length)) if bom_encoding == encoding => &bytes[length..],
        _ => bytes,
    };
    encoding.decode_without_bom_handling_and_without_replacement(body)
}

/// Splits delimited text into a header row and data rows. Rows may be shorter
/// than the header; a row carrying non-empty cells beyond the header width is
/// malformed.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<RawTable, FileError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record.map_err(parse_failure)?,
        None => {
            return Err(FileError::ParseFailure {
                reason: "file has no header row".into(),
            });
        }
    };
    let columns: Vec<String> = header.iter().map(|cell| cell.trim().to_string()).collect();
    if columns.iter().all(String::is_empty) {
        return Err(FileError::ParseFailure {
            reason: "header row is blank".into(),
        });
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(parse_failure)?;
        let mut cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();

        if cells.len() > columns.len() {
            if cells[columns.len()..].iter().any(|cell| !cell.is_empty()) {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                return Err(FileError::ParseFailure {
                    reason: format!(
                        "line {line} has {} fields but the header has {}",
                        cells.len(),
                        columns.len()
                    ),
                });
            }
            cells.truncate(columns.len());
        }

        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(cells);
    }

    Ok(RawTable::new(columns, rows))
}

fn parse_failure(error: csv::Error) -> FileError {
    FileError::ParseFailure {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    fn options<'a>(encodings: &'a [&'static Encoding]) -> LoadOptions<'a> {
        LoadOptions {
            encodings,
            delimiter: b',',
        }
    }

    #[test]
    fn utf8_wins_when_listed_first() {
        let bytes = "Timestamp,Zähler\n2024-01-01 00:00,1\n".as_bytes();
        let table = load_table("a.csv", bytes, &options(&[UTF_8, WINDOWS_1252]))
            .expect("table loaded");
        assert_eq!(table.columns, vec!["Timestamp", "Zähler"]);
        assert_eq!(table.rows, vec![vec!["2024-01-01 00:00", "1"]]);
    }

    #[test]
    fn falls_back_to_next_encoding() {
        // "Zähler" in windows-1252 is not valid UTF-8.
        let bytes = b"Timestamp,Z\xe4hler\n2024-01-01 00:00,1\n";
        let (encoding, text) =
            decode_first(bytes, &[UTF_8, WINDOWS_1252]).expect("decoded");
        assert_eq!(encoding, WINDOWS_1252);
        assert!(text.contains("Zähler"));
    }

    #[test]
    fn exhausted_encodings_fail_with_decode_failure() {
        let bytes = b"Timestamp,Z\xe4hler\n";
        let error = load_table("a.csv", bytes, &options(&[UTF_8])).expect_err("not UTF-8");
        assert_eq!(
            error,
            FileError::DecodeFailure {
                tried: vec!["UTF-8".to_string()]
            }
        );
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let bytes = b"\xef\xbb\xbfTimestamp,M1\n";
        let table = load_table("a.csv", bytes, &options(&[UTF_8])).expect("table loaded");
        assert_eq!(table.columns[0], "Timestamp");
    }

    #[test]
    fn overlong_rows_are_malformed() {
        let error = parse_delimited("Timestamp,M1\n2024-01-01 00:00,1,9\n", b',')
            .expect_err("extra field");
        assert!(matches!(error, FileError::ParseFailure { reason } if reason.contains("line 2")));
    }

    #[test]
    fn trailing_empty_fields_and_blank_rows_are_tolerated() {
        let table = parse_delimited("Timestamp,M1\n2024-01-01 00:00,1,\n,\n2024-01-01 01:00\n", b',')
            .expect("table parsed");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["2024-01-01 01:00"]);
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(
            parse_delimited("", b','),
            Err(FileError::ParseFailure { .. })
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(SourceFormat::from_name("dir/A.XLSX"), SourceFormat::Xlsx);
        assert_eq!(SourceFormat::from_name("b.xls"), SourceFormat::Xls);
        assert_eq!(SourceFormat::from_name("c.csv"), SourceFormat::Delimited);
    }

    #[test]
    fn broken_workbook_is_a_parse_failure() {
        let error = load_table("a.xlsx", b"not a workbook", &options(&[UTF_8]))
            .expect_err("invalid workbook");
        assert!(matches!(error, FileError::ParseFailure { .. }));
    }
}
