use std::fmt::Display;
use std::io::Cursor;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::combiner::error::{CombineError, FileError, Result};
use crate::combiner::model::{MergedRow, MergedTable, MeterValue, RawTable};

/// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

/// Reads the first worksheet of an in-memory workbook into a table of string
/// cells. Date cells are rendered as ISO date-times so the timestamp
/// normalizer can parse them like any other text.
pub fn read_first_sheet<W>(bytes: &[u8]) -> std::result::Result<RawTable, FileError>
where
    W: Reader<Cursor<Vec<u8>>>,
    W::Error: Display,
{
    let mut workbook = W::new(Cursor::new(bytes.to_vec())).map_err(parse_failure)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FileError::ParseFailure {
            reason: "workbook has no worksheets".into(),
        })?
        .map_err(parse_failure)?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell_to_string(Some(cell)).trim().to_string())
            .collect(),
        None => {
            return Err(FileError::ParseFailure {
                reason: "worksheet is empty".into(),
            });
        }
    };

    let rows = rows
        .map(|row| {
            row.iter()
                .map(|cell| cell_to_string(Some(cell)).trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(RawTable::new(columns, rows))
}

/// Reads back the primary sheet written by
/// [`excel_write`](crate::combiner::io::excel_write): a timestamp column
/// followed by one numeric column per meter.
pub fn read_combined_sheet(path: &Path, sheet: &str) -> Result<MergedTable> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = read_required_sheet(&mut workbook, sheet)?;

    let mut rows = range.rows();
    let meters: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .skip(1)
            .map(|cell| cell_to_string(Some(cell)))
            .collect(),
        None => return Ok(MergedTable::default()),
    };

    let mut table = MergedTable {
        meters,
        rows: Vec::new(),
    };
    for (row_idx, row) in rows.enumerate() {
        let instant = match row.first() {
            Some(DataType::DateTime(serial)) | Some(DataType::Float(serial)) => {
                excel_serial_to_datetime(*serial)
            }
            _ => None,
        }
        .ok_or_else(|| {
            CombineError::InvalidWorkbook(format!(
                "row {} of '{sheet}' has no date-time in its first column",
                row_idx + 2
            ))
        })?;

        let values = (0..table.meters.len())
            .map(|col_idx| cell_to_value(row.get(col_idx + 1)))
            .collect();
        table.rows.push(MergedRow { instant, values });
    }

    Ok(table)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| CombineError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(CombineError::from)?;
    Ok(range)
}

/// Converts an Excel serial date (days since 1899-12-30) into a date-time,
/// rounded to the millisecond.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    // Serials before 1900-03-01 are shifted by Excel's phantom 1900-02-29.
    let epoch_day = if serial < 60.0 { 31 } else { 30 };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, epoch_day)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

pub(crate) fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::DateTime(serial)) => excel_serial_to_datetime(*serial)
            .map(|instant| instant.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            .unwrap_or_else(|| serial.to_string()),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn cell_to_value(cell: Option<&DataType>) -> MeterValue {
    match cell {
        Some(DataType::Float(value)) => Some(*value),
        Some(DataType::Int(value)) => Some(*value as f64),
        Some(DataType::String(value)) => value.trim().parse().ok(),
        _ => None,
    }
}

fn parse_failure(error: impl Display) -> FileError {
    FileError::ParseFailure {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_dates_convert_to_instants() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|date| date.and_hms_opt(12, 30, 0))
            .expect("valid instant");
        // 2024-01-01 is serial 45292.
        assert_eq!(excel_serial_to_datetime(45292.0 + 12.5 / 24.0), Some(expected));
    }

    #[test]
    fn out_of_range_serials_are_rejected() {
        assert_eq!(excel_serial_to_datetime(-1.0), None);
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
        assert_eq!(excel_serial_to_datetime(3_000_000.0), None);
    }

    #[test]
    fn date_cells_render_as_iso_text() {
        let cell = DataType::DateTime(45292.25);
        assert_eq!(cell_to_string(Some(&cell)), "2024-01-01 06:00:00");
    }

    #[test]
    fn zero_cells_stay_zero() {
        assert_eq!(cell_to_value(Some(&DataType::Float(0.0))), Some(0.0));
        assert_eq!(cell_to_value(Some(&DataType::Empty)), None);
    }
}
