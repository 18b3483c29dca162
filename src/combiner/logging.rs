use tracing_subscriber::{EnvFilter, fmt};

use crate::combiner::error::{CombineError, Result};

/// Installs the global tracing subscriber. The filter comes from `RUST_LOG`
/// and falls back to `info`.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| CombineError::Logging(error.to_string()))
}

/// Installs a verbose subscriber that writes through the test harness.
/// Repeated calls are ignored.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
