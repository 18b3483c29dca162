//! Runs locate → load → reconcile → normalize for every candidate file, then
//! merges the survivors.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::combiner::config::CombinerConfig;
use crate::combiner::error::{CombineError, FileError, Result, SkippedFile};
use crate::combiner::io::excel_write::write_workbook;
use crate::combiner::io::source::{Container, locate};
use crate::combiner::io::table_read::{LoadOptions, load_table};
use crate::combiner::merge::merge;
use crate::combiner::model::{FileSummary, MergedTable, NormalizedTable};
use crate::combiner::reconcile::reconcile_columns;
use crate::combiner::report::{SummaryReport, build_report};
use crate::combiner::timestamp::normalize_table;
use crate::combiner::workbook::build_workbook;

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Combined {
        rows: usize,
        meters: usize,
        dropped_rows: usize,
    },
    Skipped(FileError),
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent<'a> {
    Started {
        total: usize,
    },
    FileStarted {
        index: usize,
        total: usize,
        file_name: &'a str,
    },
    FileFinished {
        index: usize,
        total: usize,
        file_name: &'a str,
        outcome: &'a FileOutcome,
    },
    Finished {
        combined: usize,
        skipped: usize,
    },
}

/// Receiver for progress events. The pipeline keeps no display state of its
/// own.
pub trait ProgressSink {
    fn on_event(&mut self, event: &ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent<'_>),
{
    fn on_event(&mut self, event: &ProgressEvent<'_>) {
        self(event)
    }
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_event(&mut self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Started { total } => info!(files = total, "combining files"),
            ProgressEvent::FileStarted {
                index,
                total,
                file_name,
            } => debug!(file = file_name, "[{}/{}] reading", index + 1, total),
            ProgressEvent::FileFinished {
                index,
                total,
                file_name,
                outcome,
            } => match outcome {
                FileOutcome::Combined {
                    rows,
                    meters,
                    dropped_rows,
                } => info!(
                    file = file_name,
                    rows,
                    meters,
                    dropped = dropped_rows,
                    "[{}/{}] processed",
                    index + 1,
                    total
                ),
                FileOutcome::Skipped(error) => {
                    info!(file = file_name, "[{}/{}] skipped: {error}", index + 1, total)
                }
            },
            ProgressEvent::Finished { combined, skipped } => {
                info!(combined, skipped, "finished combining")
            }
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct CombineOutcome {
    pub merged: MergedTable,
    /// One entry per file that contributed rows, in processing order.
    pub files: Vec<FileSummary>,
    pub skipped: Vec<SkippedFile>,
    pub report: SummaryReport,
}

/// Combines every data file found in the directory or zip archive at `input`.
pub fn combine(
    input: &Path,
    config: &CombinerConfig,
    sink: &mut dyn ProgressSink,
) -> Result<CombineOutcome> {
    let mut container = Container::open(input)?;
    combine_container(&mut container, config, sink)
}

/// Combines every data file in an already opened container.
pub fn combine_container(
    container: &mut Container,
    config: &CombinerConfig,
    sink: &mut dyn ProgressSink,
) -> Result<CombineOutcome> {
    combine_excluding(container, config, None, sink)
}

fn combine_excluding(
    container: &mut Container,
    config: &CombinerConfig,
    excluded: Option<&str>,
    sink: &mut dyn ProgressSink,
) -> Result<CombineOutcome> {
    let encodings = config.validate()?;
    let options = LoadOptions {
        encodings: &encodings,
        delimiter: config.delimiter,
    };

    let mut candidates = locate(container, config)?;
    if let Some(excluded) = excluded {
        candidates.retain(|name| {
            let keep = name != excluded;
            if !keep {
                debug!(file = name.as_str(), "ignoring the output workbook");
            }
            keep
        });
    }
    if candidates.is_empty() {
        return Err(CombineError::NoCandidateFiles {
            container: container.path().to_path_buf(),
        });
    }

    let total = candidates.len();
    sink.on_event(&ProgressEvent::Started { total });

    let mut tables: Vec<NormalizedTable> = Vec::new();
    let mut files: Vec<FileSummary> = Vec::new();
    let mut skipped: Vec<SkippedFile> = Vec::new();

    for (index, file_name) in candidates.iter().enumerate() {
        sink.on_event(&ProgressEvent::FileStarted {
            index,
            total,
            file_name: file_name.as_str(),
        });

        let outcome = match process_file(container, file_name, &options, config) {
            Ok((table, summary)) => {
                let outcome = FileOutcome::Combined {
                    rows: summary.rows,
                    meters: summary.meters.len(),
                    dropped_rows: summary.dropped_rows,
                };
                tables.push(table);
                files.push(summary);
                outcome
            }
            Err(error) => {
                warn!(file = %file_name, "skipping file: {error}");
                skipped.push(SkippedFile {
                    file_name: file_name.clone(),
                    error: error.clone(),
                });
                FileOutcome::Skipped(error)
            }
        };

        sink.on_event(&ProgressEvent::FileFinished {
            index,
            total,
            file_name: file_name.as_str(),
            outcome: &outcome,
        });
    }

    if tables.is_empty() {
        return Err(CombineError::NoValidInput { skipped });
    }

    let merged = merge(&tables, config.strategy)?;
    let report = build_report(&merged, &files, skipped.len());

    sink.on_event(&ProgressEvent::Finished {
        combined: files.len(),
        skipped: skipped.len(),
    });

    Ok(CombineOutcome {
        merged,
        files,
        skipped,
        report,
    })
}

/// Combines the files at `input` and writes the result to an xlsx workbook at
/// `output`. Nothing is written when the run fails. A previous output inside
/// the input directory is not read back in.
pub fn combine_to_excel(
    input: &Path,
    output: &Path,
    config: &CombinerConfig,
    include_summary: bool,
    sink: &mut dyn ProgressSink,
) -> Result<CombineOutcome> {
    let mut container = Container::open(input)?;
    let excluded = entry_name_within(input, output);
    let outcome = combine_excluding(&mut container, config, excluded.as_deref(), sink)?;
    let report = include_summary.then_some(&outcome.report);
    let workbook = build_workbook(&outcome.merged, &config.timestamp_column, report);
    write_workbook(output, &workbook)?;
    info!(
        output = %output.display(),
        rows = outcome.merged.rows.len(),
        meters = outcome.merged.meters.len(),
        "wrote combined workbook"
    );
    Ok(outcome)
}

/// Container entry name of `path` when it exists below the directory `root`.
fn entry_name_within(root: &Path, path: &Path) -> Option<String> {
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    let relative = path.strip_prefix(&root).ok()?;
    let name = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Some(name)
}

fn process_file(
    container: &mut Container,
    file_name: &str,
    options: &LoadOptions<'_>,
    config: &CombinerConfig,
) -> std::result::Result<(NormalizedTable, FileSummary), FileError> {
    let bytes = container.read(file_name)?;
    let raw = load_table(file_name, &bytes, options)?;
    let reconciled = reconcile_columns(
        raw,
        &config.timestamp_marker,
        &config.timestamp_column,
        &config.meter_suffix,
    )?;
    let normalization = normalize_table(file_name, reconciled, config)?;

    let (first, last) = normalization.range;

    let summary = FileSummary {
        file_name: file_name.to_string(),
        first,
        last,
        meters: normalization.table.meters.clone(),
        rows: normalization.table.rows.len(),
        dropped_rows: normalization.dropped_rows,
        dropped_examples: normalization.dropped_examples,
        coerced_missing: normalization.coerced_missing,
    };
    Ok((normalization.table, summary))
}
