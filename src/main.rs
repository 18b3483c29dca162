use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use meter_combiner::Result;
use meter_combiner::config::CombinerConfig;
use meter_combiner::logging;
use meter_combiner::merge::MergeStrategy;
use meter_combiner::pipeline::{self, TracingProgress};
use tracing::{info, warn};

const PREVIEW_ROWS: usize = 10;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::init()?;

    let config = CombinerConfig::default().with_strategy(cli.strategy.into());
    let mut progress = TracingProgress;
    let outcome = pipeline::combine_to_excel(
        &cli.input,
        &cli.output,
        &config,
        !cli.no_summary,
        &mut progress,
    )?;

    for skipped in &outcome.skipped {
        warn!("skipped {skipped}");
    }
    for row in outcome.merged.head(PREVIEW_ROWS) {
        let present = row.values.iter().filter(|value| value.is_some()).count();
        info!(
            timestamp = %row.instant,
            present,
            meters = row.values.len(),
            "preview"
        );
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge a batch of meter exports into one workbook."
)]
struct Cli {
    /// Directory or zip archive holding the source files.
    #[arg(long)]
    input: PathBuf,

    /// Path of the xlsx workbook to write.
    #[arg(long, default_value = "combined_data.xlsx")]
    output: PathBuf,

    /// How files are combined.
    #[arg(long, value_enum, default_value_t = StrategyKind::Align)]
    strategy: StrategyKind,

    /// Write only the combined sheet.
    #[arg(long)]
    no_summary: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyKind {
    /// Join files on shared timestamps (different meters, same period).
    Align,
    /// Stack files over time (same meters, different periods).
    Stack,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Align => write!(f, "align"),
            StrategyKind::Stack => write!(f, "stack"),
        }
    }
}

impl From<StrategyKind> for MergeStrategy {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Align => MergeStrategy::AlignOnTimestamp,
            StrategyKind::Stack => MergeStrategy::StackOverTime,
        }
    }
}
