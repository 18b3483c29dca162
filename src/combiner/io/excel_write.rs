use std::path::Path;

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};

use crate::combiner::error::Result;
use crate::combiner::workbook::{CellValue, SheetTable, WorkbookData};

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm";
const PERCENT_FORMAT: &str = "0.0%";
const DATETIME_WIDTH: f64 = 18.0;

/// Writes the provided workbook data to the given path.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let formats = Formats::new();

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;
        write_table(worksheet, table, &formats)?;
    }

    workbook_writer.save(path)?;
    Ok(())
}

struct Formats {
    header: Format,
    datetime: Format,
    percent: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            datetime: Format::new().set_num_format(DATETIME_FORMAT),
            percent: Format::new().set_num_format(PERCENT_FORMAT),
        }
    }
}

fn write_table(worksheet: &mut Worksheet, table: &SheetTable, formats: &Formats) -> Result<()> {
    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_idx as u16, header, &formats.header)?;
    }

    let mut datetime_columns = vec![false; table.columns.len()];
    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let col_num = col_idx as u16;
            match cell {
                CellValue::Text(value) => {
                    worksheet.write_string(row_num, col_num, value)?;
                }
                CellValue::Number(value) => {
                    worksheet.write_number(row_num, col_num, *value)?;
                }
                CellValue::Percent(value) => {
                    worksheet.write_number_with_format(
                        row_num,
                        col_num,
                        *value,
                        &formats.percent,
                    )?;
                }
                CellValue::DateTime(value) => {
                    let datetime = to_excel_datetime(value)?;
                    worksheet.write_datetime_with_format(
                        row_num,
                        col_num,
                        &datetime,
                        &formats.datetime,
                    )?;
                    if let Some(flag) = datetime_columns.get_mut(col_idx) {
                        *flag = true;
                    }
                }
                CellValue::Empty => {}
            }
        }
    }

    for (col_idx, is_datetime) in datetime_columns.into_iter().enumerate() {
        if is_datetime {
            worksheet.set_column_width(col_idx as u16, DATETIME_WIDTH)?;
        }
    }

    if !table.columns.is_empty() {
        let col_end = (table.columns.len() as u16).saturating_sub(1);
        worksheet.autofilter(0, 0, table.rows.len() as u32, col_end)?;
        worksheet.set_freeze_panes(1, 0)?;
    }
    Ok(())
}

fn to_excel_datetime(value: &NaiveDateTime) -> Result<ExcelDateTime> {
    let millis = value.nanosecond() / 1_000_000;
    let seconds = f64::from(value.second()) + f64::from(millis) / 1000.0;
    let datetime =
        ExcelDateTime::from_ymd(value.year() as u16, value.month() as u8, value.day() as u8)?
            .and_hms(value.hour() as u16, value.minute() as u8, seconds)?;
    Ok(datetime)
}
