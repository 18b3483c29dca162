//! Run parameters for the combine pipeline.
//!
//! Every heuristic the pipeline applies (which files count as data, which
//! encodings and timestamp patterns to try, which suffix to strip from meter
//! headers) is a value here rather than a branch in code. The defaults match
//! the meter exports the tool was written for.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::combiner::error::{CombineError, Result};
use crate::combiner::merge::MergeStrategy;

/// Suffix appended to every meter column in the source exports.
pub const DEFAULT_METER_SUFFIX: &str = " - Consumption Recorded (MWh)";
/// Name given to the timestamp column after reconciliation.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Timestamp";
/// Case-insensitive substring identifying the timestamp column.
pub const DEFAULT_TIMESTAMP_MARKER: &str = "timestamp";

/// Parameters controlling discovery, decoding, normalization and merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinerConfig {
    /// Accepted file extensions, compared case-insensitively, without the dot.
    pub extensions: Vec<String>,
    /// Path fragments marking platform metadata (matched case-insensitively).
    pub metadata_markers: Vec<String>,
    /// Base names starting with any of these characters are hidden files.
    pub hidden_prefixes: Vec<char>,
    /// Text encodings tried in order when decoding delimited files.
    pub encodings: Vec<String>,
    /// Field delimiter for delimited text.
    pub delimiter: u8,
    /// chrono format patterns tried in order for each timestamp value.
    pub timestamp_formats: Vec<String>,
    /// Cell contents that mean "no value" (compared case-insensitively).
    pub missing_markers: Vec<String>,
    pub timestamp_marker: String,
    pub timestamp_column: String,
    pub meter_suffix: String,
    pub strategy: MergeStrategy,
    /// Maximum number of unparsable raw timestamps kept per file.
    pub dropped_example_limit: usize,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            extensions: to_strings(&["xlsx", "xls", "csv"]),
            metadata_markers: to_strings(&["__macosx"]),
            hidden_prefixes: vec!['.', '~'],
            encodings: to_strings(&["utf-8", "windows-1252"]),
            delimiter: b',',
            timestamp_formats: to_strings(&[
                "%A, %B %d, %Y %H:%M",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%d %H:%M",
                "%Y-%m-%dT%H:%M",
                "%m/%d/%Y %H:%M",
                "%d/%m/%Y %H:%M",
            ]),
            missing_markers: to_strings(&["", "nan", "nat", "null", "none"]),
            timestamp_marker: DEFAULT_TIMESTAMP_MARKER.to_string(),
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            meter_suffix: DEFAULT_METER_SUFFIX.to_string(),
            strategy: MergeStrategy::default(),
            dropped_example_limit: 3,
        }
    }
}

impl CombinerConfig {
    /// Returns a copy using the given merge strategy.
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Checks that the configuration can drive a run and resolves the
    /// encoding labels, preserving their order.
    pub fn validate(&self) -> Result<Vec<&'static Encoding>> {
        if self.extensions.is_empty() {
            return Err(CombineError::InvalidConfig(
                "at least one file extension is required".into(),
            ));
        }
        if self.timestamp_formats.is_empty() {
            return Err(CombineError::InvalidConfig(
                "at least one timestamp format is required".into(),
            ));
        }
        if self.timestamp_marker.trim().is_empty() {
            return Err(CombineError::InvalidConfig(
                "timestamp marker must not be empty".into(),
            ));
        }
        self.resolve_encodings()
    }

    fn resolve_encodings(&self) -> Result<Vec<&'static Encoding>> {
        if self.encodings.is_empty() {
            return Err(CombineError::InvalidConfig(
                "at least one text encoding is required".into(),
            ));
        }
        self.encodings
            .iter()
            .map(|label| {
                Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                    CombineError::InvalidConfig(format!("unknown text encoding '{label}'"))
                })
            })
            .collect()
    }

    pub(crate) fn is_missing_marker(&self, value: &str) -> bool {
        self.missing_markers
            .iter()
            .any(|marker| marker.eq_ignore_ascii_case(value))
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_encodings_in_order() {
        let encodings = CombinerConfig::default().validate().expect("valid config");
        assert_eq!(encodings[0], encoding_rs::UTF_8);
        assert_eq!(encodings[1], encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let config = CombinerConfig {
            encodings: vec!["klingon".into()],
            ..CombinerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CombineError::InvalidConfig(message)) if message.contains("klingon")
        ));
    }

    #[test]
    fn empty_format_list_is_rejected() {
        let config = CombinerConfig {
            timestamp_formats: Vec::new(),
            ..CombinerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_markers_ignore_case() {
        let config = CombinerConfig::default();
        assert!(config.is_missing_marker("NaN"));
        assert!(config.is_missing_marker(""));
        assert!(!config.is_missing_marker("0"));
    }
}
