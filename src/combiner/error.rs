use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, CombineError>;

/// Error type covering the failures that abort a whole combine run.
#[derive(Debug, Error)]
pub enum CombineError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON serialization of a report fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors raised while listing or reading a zip container.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Raised when the input container cannot be opened or listed.
    #[error("cannot read container {}: {reason}", path.display())]
    ContainerUnreadable { path: PathBuf, reason: String },

    /// Raised when the container holds no candidate data files.
    #[error("no data files found in {}", container.display())]
    NoCandidateFiles { container: PathBuf },

    /// Raised when every candidate file was skipped.
    #[error("no valid files processed ({} skipped)", skipped.len())]
    NoValidInput { skipped: Vec<SkippedFile> },

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the configuration cannot drive a run.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Failure confined to a single source file. The file is skipped and the
/// batch carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FileError {
    #[error("could not read entry: {reason}")]
    Unreadable { reason: String },

    /// None of the configured encodings decoded the bytes.
    #[error("could not decode with any of [{}]", tried.join(", "))]
    DecodeFailure { tried: Vec<String> },

    #[error("malformed table: {reason}")]
    ParseFailure { reason: String },

    #[error("no column containing '{marker}'")]
    MissingTimestampColumn { marker: String },

    /// Every row was dropped because its timestamp did not parse.
    #[error("no parsable timestamps (dropped {dropped} rows, e.g. {examples:?})")]
    EmptyAfterNormalization {
        dropped: usize,
        examples: Vec<String>,
    },
}

/// A candidate file that did not contribute to the merge, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub file_name: String,
    pub error: FileError,
}

impl std::fmt::Display for SkippedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file_name, self.error)
    }
}
