//! Core library for the meter-combiner command line application.
//!
//! The library merges batches of meter exports (one timestamp column plus one
//! column per meter) into a single wide table. Sources are discovered and
//! decoded under [`combiner::io`], column names are reconciled in
//! [`combiner::reconcile`], timestamps parsed in [`combiner::timestamp`], the
//! per-file tables combined in [`combiner::merge`], and the whole run is
//! orchestrated by [`combiner::pipeline`].

pub mod combiner;

pub use combiner::{
    CombineError, FileError, Result, config, error, io, logging, merge, model, pipeline,
    reconcile, report, strategy, timestamp, workbook,
};
