use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical identifier of a measurement series. It is the source column
/// header with the known suffix removed and is compared by exact string
/// equality.
pub type MeterId = String;

/// A meter reading. `None` marks a missing or non-numeric cell; a real zero is
/// `Some(0.0)`.
pub type MeterValue = Option<f64>;

/// Table of string cells as read from one source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Column headers in file order. Duplicates are allowed.
    pub columns: Vec<String>,
    /// Rows aligned positionally to `columns`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Returns the cells of the given column, treating short rows as empty.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or_default())
    }
}

/// One row of a normalized table. `values` is aligned to the owning table's
/// meter list.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub instant: NaiveDateTime,
    pub values: Vec<MeterValue>,
}

/// The rows of one source file whose timestamps parsed, keyed by meter.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub source: String,
    /// Meters discovered in the file, in column order, without duplicates.
    pub meters: Vec<MeterId>,
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    /// Earliest and latest instant covered by the table.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        time_range(self.rows.iter().map(|row| row.instant))
    }
}

/// One row of the merged output. `values` is aligned to
/// [`MergedTable::meters`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub instant: NaiveDateTime,
    pub values: Vec<MeterValue>,
}

/// Wide table produced by a merge: one row per distinct instant, sorted
/// ascending, with the union of all meters as columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedTable {
    pub meters: Vec<MeterId>,
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn meter_index(&self, meter: &str) -> Option<usize> {
        self.meters.iter().position(|candidate| candidate == meter)
    }

    /// Value of `meter` in the row at `instant`. Returns `None` both when the
    /// row or meter does not exist and when the cell is missing.
    pub fn value(&self, instant: NaiveDateTime, meter: &str) -> MeterValue {
        let column = self.meter_index(meter)?;
        let row = self
            .rows
            .binary_search_by(|row| row.instant.cmp(&instant))
            .ok()?;
        self.rows[row].values.get(column).copied().flatten()
    }

    /// First `count` rows, used for previews.
    pub fn head(&self, count: usize) -> &[MergedRow] {
        &self.rows[..count.min(self.rows.len())]
    }

    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        time_range(self.rows.iter().map(|row| row.instant))
    }

    /// Number of cells marked missing across all rows and meters.
    pub fn missing_cells(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.values.iter().filter(|value| value.is_none()).count())
            .sum()
    }
}

/// What one source file contributed to the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_name: String,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub meters: Vec<MeterId>,
    pub rows: usize,
    /// Rows dropped because their timestamp did not parse.
    pub dropped_rows: usize,
    /// Up to a configured number of the raw values that were dropped.
    pub dropped_examples: Vec<String>,
    /// Meter cells that failed numeric coercion and became missing.
    pub coerced_missing: usize,
}

fn time_range(
    instants: impl Iterator<Item = NaiveDateTime>,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    instants.fold(None, |range, instant| match range {
        None => Some((instant, instant)),
        Some((first, last)) => Some((first.min(instant), last.max(instant))),
    })
}
