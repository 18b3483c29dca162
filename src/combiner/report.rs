//! Summary statistics over a merged table.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::combiner::model::{FileSummary, MergedTable, MeterId};

/// Share of rows in which a meter has a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterCompleteness {
    pub meter: MeterId,
    pub present: usize,
    /// `present / rows`, or 0 for an empty table.
    pub completeness: f64,
}

/// Run-level overview of the merged output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub meter_count: usize,
    pub row_count: usize,
    /// Most common gap between consecutive rows, in seconds.
    pub typical_interval_secs: Option<i64>,
    pub meters: Vec<MeterCompleteness>,
    pub files: Vec<FileSummary>,
    pub files_skipped: usize,
}

/// Builds the overview for a merged table and the files that fed it.
pub fn build_report(
    merged: &MergedTable,
    files: &[FileSummary],
    files_skipped: usize,
) -> SummaryReport {
    let range = merged.time_range();
    let row_count = merged.rows.len();

    let meters = merged
        .meters
        .iter()
        .enumerate()
        .map(|(column, meter)| {
            let present = merged
                .rows
                .iter()
                .filter(|row| row.values.get(column).copied().flatten().is_some())
                .count();
            let completeness = if row_count == 0 {
                0.0
            } else {
                present as f64 / row_count as f64
            };
            MeterCompleteness {
                meter: meter.clone(),
                present,
                completeness,
            }
        })
        .collect();

    SummaryReport {
        start: range.map(|(start, _)| start),
        end: range.map(|(_, end)| end),
        meter_count: merged.meters.len(),
        row_count,
        typical_interval_secs: modal_interval_secs(merged.rows.iter().map(|row| row.instant)),
        meters,
        files: files.to_vec(),
        files_skipped,
    }
}

/// Mode of the differences between consecutive instants. Ties go to the
/// shortest gap. Fewer than two instants have no interval.
pub fn modal_interval_secs(instants: impl IntoIterator<Item = NaiveDateTime>) -> Option<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut previous: Option<NaiveDateTime> = None;
    for instant in instants {
        if let Some(prev) = previous {
            *counts.entry((instant - prev).num_seconds()).or_default() += 1;
        }
        previous = Some(instant);
    }
    counts
        .into_iter()
        .max_by(|(gap_a, count_a), (gap_b, count_b)| {
            count_a.cmp(count_b).then_with(|| gap_b.cmp(gap_a))
        })
        .map(|(gap, _)| gap)
}

/// Renders a gap in seconds as e.g. `1h 30m` or `15m`.
pub fn format_interval(secs: i64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();
    let parts: Vec<String> = [
        (secs / 86_400, "d"),
        (secs % 86_400 / 3_600, "h"),
        (secs % 3_600 / 60, "m"),
        (secs % 60, "s"),
    ]
    .into_iter()
    .filter(|(amount, _)| *amount > 0)
    .map(|(amount, unit)| format!("{amount}{unit}"))
    .collect();
    format!("{sign}{}", parts.join(" "))
}
