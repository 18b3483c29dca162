//! Combines per-file tables into one wide table.
//!
//! Tables must be supplied in processing order: it fixes the column order of
//! the meter union and decides which row survives a duplicate instant when
//! stacking.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combiner::error::{CombineError, Result};
use crate::combiner::model::{MergedRow, MergedTable, MeterId, MeterValue, NormalizedTable};

/// How per-file tables are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Outer join on the timestamp axis: files cover the same period with
    /// different meters.
    #[default]
    AlignOnTimestamp,
    /// Concatenate rows over time: files cover different periods of the same
    /// meters. A duplicate instant keeps the row from the later file.
    StackOverTime,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::AlignOnTimestamp => write!(f, "align"),
            MergeStrategy::StackOverTime => write!(f, "stack"),
        }
    }
}

/// Running union of meter ids in first-seen order. Ids are compared exactly.
#[derive(Debug, Default)]
struct MeterUnion {
    meters: Vec<MeterId>,
    index: HashMap<MeterId, usize>,
}

impl MeterUnion {
    fn insert(&mut self, meter: &str) -> usize {
        if let Some(&position) = self.index.get(meter) {
            return position;
        }
        let position = self.meters.len();
        self.meters.push(meter.to_string());
        self.index.insert(meter.to_string(), position);
        position
    }

    /// Maps each meter of `table` to its column in the union.
    fn columns_for(&mut self, table: &NormalizedTable) -> Vec<usize> {
        table.meters.iter().map(|meter| self.insert(meter)).collect()
    }
}

/// Merges normalized tables with the chosen strategy.
pub fn merge(tables: &[NormalizedTable], strategy: MergeStrategy) -> Result<MergedTable> {
    if tables.is_empty() {
        return Err(CombineError::NoValidInput {
            skipped: Vec::new(),
        });
    }

    let mut union = MeterUnion::default();
    let columns: Vec<Vec<usize>> = tables
        .iter()
        .map(|table| union.columns_for(table))
        .collect();
    let width = union.meters.len();

    let rows = match strategy {
        MergeStrategy::AlignOnTimestamp => align_on_timestamp(tables, &columns, width),
        MergeStrategy::StackOverTime => stack_over_time(tables, &columns, width),
    };

    debug!(
        %strategy,
        files = tables.len(),
        meters = width,
        rows = rows.len(),
        "merged tables"
    );

    Ok(MergedTable {
        meters: union.meters,
        rows,
    })
}

/// One output row per distinct instant. Each file fills the cells of its own
/// meters; where two files report the same meter at the same instant, the
/// later file's present value wins.
fn align_on_timestamp(
    tables: &[NormalizedTable],
    columns: &[Vec<usize>],
    width: usize,
) -> Vec<MergedRow> {
    let mut by_instant: BTreeMap<_, Vec<MeterValue>> = BTreeMap::new();
    for (table, table_columns) in tables.iter().zip(columns) {
        for row in &table.rows {
            let merged = by_instant
                .entry(row.instant)
                .or_insert_with(|| vec![None; width]);
            for (value, &column) in row.values.iter().zip(table_columns) {
                if value.is_some() {
                    merged[column] = *value;
                }
            }
        }
    }

    by_instant
        .into_iter()
        .map(|(instant, values)| MergedRow { instant, values })
        .collect()
}

/// All rows of all files, stably sorted by instant. For a repeated instant the
/// last row in processing order replaces the earlier ones entirely, including
/// cells it leaves missing.
fn stack_over_time(
    tables: &[NormalizedTable],
    columns: &[Vec<usize>],
    width: usize,
) -> Vec<MergedRow> {
    let mut stacked: Vec<MergedRow> = tables
        .iter()
        .zip(columns)
        .flat_map(|(table, table_columns)| {
            table.rows.iter().map(move |row| {
                let mut values = vec![None; width];
                for (value, &column) in row.values.iter().zip(table_columns) {
                    values[column] = *value;
                }
                MergedRow {
                    instant: row.instant,
                    values,
                }
            })
        })
        .collect();
    stacked.sort_by_key(|row| row.instant);

    let mut rows: Vec<MergedRow> = Vec::with_capacity(stacked.len());
    let mut replaced = 0usize;
    for row in stacked {
        match rows.last_mut() {
            Some(last) if last.instant == row.instant => {
                *last = row;
                replaced += 1;
            }
            _ => rows.push(row),
        }
    }
    if replaced > 0 {
        debug!(replaced, "kept the last row for duplicate instants");
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiner::model::NormalizedRow;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid instant")
    }

    fn table(source: &str, meters: &[&str], rows: &[(u32, &[MeterValue])]) -> NormalizedTable {
        NormalizedTable {
            source: source.to_string(),
            meters: meters.iter().map(|meter| meter.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(hour, values)| NormalizedRow {
                    instant: at(*hour),
                    values: values.to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn align_joins_disjoint_meters_on_shared_instants() {
        let a = table("A.csv", &["M1"], &[(0, &[Some(1.0)]), (1, &[Some(2.0)]), (2, &[Some(3.0)])]);
        let b = table("B.csv", &["M2"], &[(0, &[Some(4.0)]), (1, &[Some(5.0)]), (2, &[Some(6.0)])]);

        let merged = merge(&[a, b], MergeStrategy::AlignOnTimestamp).expect("merged");
        assert_eq!(merged.meters, vec!["M1", "M2"]);
        assert_eq!(merged.rows.len(), 3);
        assert_eq!(merged.missing_cells(), 0);
        assert_eq!(merged.value(at(1), "M2"), Some(5.0));
    }

    #[test]
    fn align_marks_cells_missing_outside_a_files_range() {
        let a = table("A.csv", &["M1"], &[(0, &[Some(1.0)])]);
        let b = table("B.csv", &["M2"], &[(1, &[Some(0.0)])]);

        let merged = merge(&[a, b], MergeStrategy::AlignOnTimestamp).expect("merged");
        assert_eq!(merged.rows.len(), 2);
        assert_eq!(merged.rows[0].values, vec![Some(1.0), None]);
        assert_eq!(merged.rows[1].values, vec![None, Some(0.0)]);
    }

    #[test]
    fn align_does_not_erase_values_with_missing_cells() {
        let a = table("A.csv", &["M1"], &[(0, &[Some(1.0)])]);
        let b = table("B.csv", &["M1"], &[(0, &[None])]);

        let merged = merge(&[a, b], MergeStrategy::AlignOnTimestamp).expect("merged");
        assert_eq!(merged.rows[0].values, vec![Some(1.0)]);
    }

    #[test]
    fn stack_keeps_the_later_row_for_a_shared_instant() {
        let a = table(
            "jan.csv",
            &["M1", "M2"],
            &[(0, &[Some(1.0), Some(10.0)]), (1, &[Some(2.0), Some(20.0)])],
        );
        let b = table("feb.csv", &["M1"], &[(1, &[Some(0.0)]), (2, &[Some(3.0)])]);

        let merged = merge(&[a, b], MergeStrategy::StackOverTime).expect("merged");
        assert_eq!(merged.rows.len(), 2 + 2 - 1);
        assert_eq!(merged.value(at(1), "M1"), Some(0.0));
        // Row granularity: the later row has no M2, so M2 is missing.
        assert_eq!(merged.value(at(1), "M2"), None);
        assert_eq!(merged.value(at(0), "M2"), Some(10.0));
    }

    #[test]
    fn stack_sorts_rows_from_out_of_order_files() {
        let late = table("b.csv", &["M1"], &[(5, &[Some(5.0)])]);
        let early = table("a.csv", &["M1"], &[(1, &[Some(1.0)])]);

        let merged = merge(&[late, early], MergeStrategy::StackOverTime).expect("merged");
        let instants: Vec<_> = merged.rows.iter().map(|row| row.instant).collect();
        assert_eq!(instants, vec![at(1), at(5)]);
    }

    #[test]
    fn meter_union_is_case_sensitive_and_first_seen() {
        let a = table("a.csv", &["m1", "M2"], &[(0, &[Some(1.0), Some(2.0)])]);
        let b = table("b.csv", &["M1", "M2"], &[(0, &[Some(3.0), Some(4.0)])]);

        let merged = merge(&[a, b], MergeStrategy::AlignOnTimestamp).expect("merged");
        assert_eq!(merged.meters, vec!["m1", "M2", "M1"]);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            merge(&[], MergeStrategy::StackOverTime),
            Err(CombineError::NoValidInput { .. })
        ));
    }
}
