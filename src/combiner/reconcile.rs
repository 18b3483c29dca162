//! Column-name heuristics: locating the timestamp column and deriving
//! canonical meter identifiers from raw headers.

use crate::combiner::error::FileError;
use crate::combiner::model::{MeterId, RawTable};

/// Index of the first column whose name contains `marker`, ignoring case.
pub fn find_timestamp_column(columns: &[String], marker: &str) -> Option<usize> {
    let marker = marker.to_lowercase();
    if marker.is_empty() {
        return None;
    }
    columns
        .iter()
        .position(|column| column.to_lowercase().contains(&marker))
}

/// Strips `suffix` from the end of `header`. Headers without the full suffix
/// are returned unchanged, as is a header that consists of the suffix alone.
/// Whitespace left in front of a stripped suffix is dropped.
pub fn canonical_meter_id(header: &str, suffix: &str) -> MeterId {
    match header.strip_suffix(suffix) {
        Some(stripped) if !suffix.is_empty() && !stripped.trim().is_empty() => {
            stripped.trim_end().to_string()
        }
        _ => header.to_string(),
    }
}

/// Moves the timestamp column to position 0 under the canonical name and
/// renames every other column to its meter id. The relative order of the
/// remaining columns is preserved.
pub fn reconcile_columns(
    table: RawTable,
    marker: &str,
    timestamp_column: &str,
    suffix: &str,
) -> Result<RawTable, FileError> {
    let ts_idx = find_timestamp_column(&table.columns, marker).ok_or_else(|| {
        FileError::MissingTimestampColumn {
            marker: marker.to_string(),
        }
    })?;

    let order: Vec<usize> = std::iter::once(ts_idx)
        .chain((0..table.columns.len()).filter(|idx| *idx != ts_idx))
        .collect();

    let columns = order
        .iter()
        .map(|&idx| {
            if idx == ts_idx {
                timestamp_column.to_string()
            } else {
                canonical_meter_id(&table.columns[idx], suffix)
            }
        })
        .collect();

    let rows = table
        .rows
        .into_iter()
        .map(|mut row| {
            order
                .iter()
                .map(|&idx| row.get_mut(idx).map(std::mem::take).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RawTable::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiner::config::{DEFAULT_METER_SUFFIX, DEFAULT_TIMESTAMP_MARKER};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn first_timestamp_like_column_wins() {
        let columns = strings(&["Meter", "Local TIMESTAMP", "timestamp_utc"]);
        assert_eq!(find_timestamp_column(&columns, DEFAULT_TIMESTAMP_MARKER), Some(1));
        assert_eq!(find_timestamp_column(&strings(&["Time", "M1"]), "timestamp"), None);
        assert_eq!(find_timestamp_column(&[], "timestamp"), None);
    }

    #[test]
    fn suffix_is_only_stripped_when_fully_present() {
        assert_eq!(
            canonical_meter_id("M1 - Consumption Recorded (MWh)", DEFAULT_METER_SUFFIX),
            "M1"
        );
        assert_eq!(
            canonical_meter_id("M1 - Consumption Recorded", DEFAULT_METER_SUFFIX),
            "M1 - Consumption Recorded"
        );
        assert_eq!(canonical_meter_id("", DEFAULT_METER_SUFFIX), "");
        assert_eq!(
            canonical_meter_id(DEFAULT_METER_SUFFIX, DEFAULT_METER_SUFFIX),
            DEFAULT_METER_SUFFIX
        );
        assert_eq!(canonical_meter_id("M1", ""), "M1");
    }

    #[test]
    fn whitespace_left_before_the_suffix_is_trimmed() {
        assert_eq!(
            canonical_meter_id("M1  - Consumption Recorded (MWh)", DEFAULT_METER_SUFFIX),
            "M1"
        );
        assert_eq!(
            canonical_meter_id(" M 1 - Consumption Recorded (MWh)", DEFAULT_METER_SUFFIX),
            " M 1"
        );
    }

    #[test]
    fn timestamp_column_moves_first_keeping_the_rest_in_order() {
        let table = RawTable::new(
            strings(&[
                "A - Consumption Recorded (MWh)",
                "Reading Timestamp",
                "B - Consumption Recorded (MWh)",
            ]),
            vec![strings(&["1", "2024-01-01 00:00", "2"]), strings(&["3"])],
        );
        let reconciled =
            reconcile_columns(table, "timestamp", "Timestamp", DEFAULT_METER_SUFFIX)
                .expect("columns reconciled");
        assert_eq!(reconciled.columns, strings(&["Timestamp", "A", "B"]));
        assert_eq!(reconciled.rows[0], strings(&["2024-01-01 00:00", "1", "2"]));
        assert_eq!(reconciled.rows[1], strings(&["", "3", ""]));
    }

    #[test]
    fn already_first_column_is_renamed_only() {
        let table = RawTable::new(strings(&["timestamp", "M1"]), vec![strings(&["t", "1"])]);
        let reconciled =
            reconcile_columns(table, "timestamp", "Timestamp", DEFAULT_METER_SUFFIX)
                .expect("columns reconciled");
        assert_eq!(reconciled.columns, strings(&["Timestamp", "M1"]));
        assert_eq!(reconciled.rows[0], strings(&["t", "1"]));
    }

    #[test]
    fn missing_timestamp_column_is_reported() {
        let table = RawTable::new(strings(&["Date", "M1"]), Vec::new());
        let error = reconcile_columns(table, "timestamp", "Timestamp", DEFAULT_METER_SUFFIX)
            .expect_err("no timestamp column");
        assert_eq!(
            error,
            FileError::MissingTimestampColumn {
                marker: "timestamp".into()
            }
        );
    }
}
