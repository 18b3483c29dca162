//! Timestamp parsing and numeric coercion for one reconciled table.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::combiner::config::CombinerConfig;
use crate::combiner::error::FileError;
use crate::combiner::model::{MeterId, MeterValue, NormalizedRow, NormalizedTable, RawTable};
use crate::combiner::strategy::first_success;

/// Parses `value` with the first format in `formats` that accepts it.
/// Surrounding whitespace is ignored and an empty value never parses.
pub fn parse_timestamp(value: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    first_success(formats, |format| parse_with_format(value, format)).ok()
}

/// A leading weekday name is skipped rather than checked against the date
/// that follows it.
fn parse_with_format(value: &str, format: &str) -> chrono::ParseResult<NaiveDateTime> {
    let date_format = format
        .strip_prefix("%A, ")
        .or_else(|| format.strip_prefix("%a, "));
    match (date_format, value.split_once(',')) {
        (Some(date_format), Some((weekday, rest)))
            if !weekday.is_empty() && weekday.chars().all(char::is_alphabetic) =>
        {
            NaiveDateTime::parse_from_str(rest.trim_start(), date_format)
        }
        _ => NaiveDateTime::parse_from_str(value, format),
    }
}

/// Parses a column of raw timestamps. The output is parallel to the input;
/// `None` marks a missing marker or a value no format accepts.
pub fn normalize_timestamps<'a>(
    values: impl IntoIterator<Item = &'a str>,
    config: &CombinerConfig,
) -> Vec<Option<NaiveDateTime>> {
    values
        .into_iter()
        .map(|value| {
            if config.is_missing_marker(value.trim()) {
                None
            } else {
                parse_timestamp(value, &config.timestamp_formats)
            }
        })
        .collect()
}

/// Coerces a meter cell to a number. Anything that is not a finite number
/// becomes missing; zero stays zero.
pub fn coerce_value(cell: &str, config: &CombinerConfig) -> MeterValue {
    let cell = cell.trim();
    if config.is_missing_marker(cell) {
        return None;
    }
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// A normalized table plus what was lost on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub table: NormalizedTable,
    /// Earliest and latest instant kept.
    pub range: (NaiveDateTime, NaiveDateTime),
    pub dropped_rows: usize,
    pub dropped_examples: Vec<String>,
    pub coerced_missing: usize,
}

/// Converts a reconciled table (timestamp in column 0) into typed rows.
///
/// Rows whose timestamp does not parse are dropped and counted, keeping up to
/// `dropped_example_limit` raw values. Columns with a blank header are
/// ignored. When two columns share a meter id the later column's present
/// values take precedence. A table left with no rows is an error.
pub fn normalize_table(
    source: &str,
    table: RawTable,
    config: &CombinerConfig,
) -> Result<Normalization, FileError> {
    let mut meters: Vec<MeterId> = Vec::new();
    let mut slots: Vec<(usize, usize)> = Vec::new();
    for (col_idx, header) in table.columns.iter().enumerate().skip(1) {
        if header.trim().is_empty() {
            debug!(file = source, column = col_idx, "ignoring column without a header");
            continue;
        }
        let slot = match meters.iter().position(|meter| meter == header) {
            Some(existing) => {
                warn!(file = source, meter = %header, "meter appears in more than one column");
                existing
            }
            None => {
                meters.push(header.clone());
                meters.len() - 1
            }
        };
        slots.push((col_idx, slot));
    }

    let instants = normalize_timestamps(table.column_values(0), config);

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut dropped_rows = 0;
    let mut dropped_examples = Vec::new();
    let mut coerced_missing = 0;

    for (row, instant) in table.rows.iter().zip(instants) {
        let Some(instant) = instant else {
            dropped_rows += 1;
            if dropped_examples.len() < config.dropped_example_limit {
                dropped_examples.push(row.first().cloned().unwrap_or_default());
            }
            continue;
        };

        let mut values: Vec<MeterValue> = vec![None; meters.len()];
        for &(col_idx, slot) in &slots {
            let cell = row.get(col_idx).map(String::as_str).unwrap_or_default();
            match coerce_value(cell, config) {
                Some(value) => values[slot] = Some(value),
                None if !config.is_missing_marker(cell.trim()) => coerced_missing += 1,
                None => {}
            }
        }
        rows.push(NormalizedRow { instant, values });
    }

    if dropped_rows > 0 {
        warn!(
            file = source,
            dropped = dropped_rows,
            examples = ?dropped_examples,
            "dropped {dropped_rows} row(s) with unparsable timestamps"
        );
    }

    let table = NormalizedTable {
        source: source.to_string(),
        meters,
        rows,
    };
    let Some(range) = table.time_range() else {
        return Err(FileError::EmptyAfterNormalization {
            dropped: dropped_rows,
            examples: dropped_examples,
        });
    };

    Ok(Normalization {
        table,
        range,
        dropped_rows,
        dropped_examples,
        coerced_missing,
    })
}
