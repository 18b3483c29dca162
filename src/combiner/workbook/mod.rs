use chrono::NaiveDateTime;

use crate::combiner::model::MergedTable;
use crate::combiner::report::{SummaryReport, format_interval};

/// Sheet holding the merged table.
pub const COMBINED_SHEET: &str = "Combined_Data";
/// Sheet holding run-level figures.
pub const RUN_SUMMARY_SHEET: &str = "Run_Summary";
/// Sheet listing what each source file contributed.
pub const FILE_SUMMARY_SHEET: &str = "File_Summary";
/// Sheet listing completeness per meter.
pub const METER_SUMMARY_SHEET: &str = "Meter_Summary";

/// A typed cell of an output sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    /// A fraction rendered as a percentage.
    Percent(f64),
    DateTime(NaiveDateTime),
    Empty,
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<Option<NaiveDateTime>> for CellValue {
    fn from(value: Option<NaiveDateTime>) -> Self {
        value.map(CellValue::DateTime).unwrap_or(CellValue::Empty)
    }
}

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Represents all tables required to materialise the Excel workbook. The
/// first table is the primary sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub tables: Vec<SheetTable>,
}

/// Lays out the merged table as the primary sheet, followed by the summary
/// sheets when a report is given.
pub fn build_workbook(
    merged: &MergedTable,
    timestamp_column: &str,
    report: Option<&SummaryReport>,
) -> WorkbookData {
    let mut tables = vec![combined_table(merged, timestamp_column)];
    if let Some(report) = report {
        tables.push(run_summary_table(report));
        tables.push(file_summary_table(report));
        tables.push(meter_summary_table(report));
    }
    WorkbookData { tables }
}

fn combined_table(merged: &MergedTable, timestamp_column: &str) -> SheetTable {
    let mut columns = Vec::with_capacity(merged.meters.len() + 1);
    columns.push(timestamp_column.to_string());
    columns.extend(merged.meters.iter().cloned());

    let rows = merged
        .rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(columns.len());
            cells.push(CellValue::DateTime(row.instant));
            cells.extend(
                row.values
                    .iter()
                    .map(|value| value.map(CellValue::Number).unwrap_or(CellValue::Empty)),
            );
            cells
        })
        .collect();

    SheetTable {
        sheet_name: COMBINED_SHEET.to_string(),
        columns,
        rows,
    }
}

fn run_summary_table(report: &SummaryReport) -> SheetTable {
    let interval = report
        .typical_interval_secs
        .map(|secs| CellValue::Text(format_interval(secs)))
        .unwrap_or(CellValue::Empty);

    let rows: Vec<Vec<CellValue>> = vec![
        vec!["Start".into(), report.start.into()],
        vec!["End".into(), report.end.into()],
        vec!["Rows".into(), report.row_count.into()],
        vec!["Meters".into(), report.meter_count.into()],
        vec!["Typical interval".into(), interval],
        vec!["Files combined".into(), report.files.len().into()],
        vec!["Files skipped".into(), report.files_skipped.into()],
    ];

    SheetTable {
        sheet_name: RUN_SUMMARY_SHEET.to_string(),
        columns: vec!["Metric".to_string(), "Value".to_string()],
        rows,
    }
}

fn file_summary_table(report: &SummaryReport) -> SheetTable {
    let rows = report
        .files
        .iter()
        .map(|file| {
            vec![
                file.file_name.as_str().into(),
                CellValue::DateTime(file.first),
                CellValue::DateTime(file.last),
                file.rows.into(),
                file.meters.len().into(),
                CellValue::Text(file.meters.join(", ")),
                file.dropped_rows.into(),
                CellValue::Text(file.dropped_examples.join(" | ")),
                file.coerced_missing.into(),
            ]
        })
        .collect();

    SheetTable {
        sheet_name: FILE_SUMMARY_SHEET.to_string(),
        columns: [
            "File",
            "First",
            "Last",
            "Rows",
            "Meter count",
            "Meters",
            "Dropped rows",
            "Dropped examples",
            "Non-numeric cells",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect(),
        rows,
    }
}

fn meter_summary_table(report: &SummaryReport) -> SheetTable {
    let rows = report
        .meters
        .iter()
        .map(|meter| {
            vec![
                meter.meter.as_str().into(),
                meter.present.into(),
                CellValue::Percent(meter.completeness),
            ]
        })
        .collect();

    SheetTable {
        sheet_name: METER_SUMMARY_SHEET.to_string(),
        columns: vec![
            "Meter".to_string(),
            "Present".to_string(),
            "Completeness".to_string(),
        ],
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiner::model::MergedRow;
    use crate::combiner::report::build_report;
    use chrono::NaiveDate;

    fn merged() -> MergedTable {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid instant");
        MergedTable {
            meters: vec!["M1".into(), "M2".into()],
            rows: vec![MergedRow {
                instant,
                values: vec![Some(0.0), None],
            }],
        }
    }

    #[test]
    fn primary_sheet_puts_timestamp_first_then_meters() {
        let workbook = build_workbook(&merged(), "Timestamp", None);
        assert_eq!(workbook.tables.len(), 1);
        let sheet = &workbook.tables[0];
        assert_eq!(sheet.sheet_name, COMBINED_SHEET);
        assert_eq!(sheet.columns, vec!["Timestamp", "M1", "M2"]);
        assert!(matches!(sheet.rows[0][0], CellValue::DateTime(_)));
        assert_eq!(sheet.rows[0][1], CellValue::Number(0.0));
        assert_eq!(sheet.rows[0][2], CellValue::Empty);
    }

    #[test]
    fn summary_sheets_follow_the_primary_sheet() {
        let merged = merged();
        let report = build_report(&merged, &[], 0);
        let workbook = build_workbook(&merged, "Timestamp", Some(&report));
        let names: Vec<&str> = workbook
            .tables
            .iter()
            .map(|table| table.sheet_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                COMBINED_SHEET,
                RUN_SUMMARY_SHEET,
                FILE_SUMMARY_SHEET,
                METER_SUMMARY_SHEET
            ]
        );
        assert_eq!(workbook.tables[3].rows.len(), 2);
    }
}
