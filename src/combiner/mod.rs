pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod strategy;
pub mod timestamp;
pub mod workbook;

pub use error::{CombineError, FileError, Result};
