//! Log lines for table I/O and pipeline stages
//!
//! Input tables and output files are logged at `info` when they are opened
//! and again with a row count once they are done, so a run's log lists every
//! file it touched.

use std::path::Path;
use std::time::Duration;

/// Announce that a table file is about to be read or written
///
/// # Arguments
/// * `operation` - What is being done, e.g. "Reading table"
/// * `path` - The input table or output file
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Report the row count of a finished table read or write
///
/// # Arguments
/// * `operation` - Past-tense verb, e.g. "read" or "wrote"
/// * `path` - The input table or output file
/// * `rows` - Data rows read or written
/// * `elapsed` - Time spent, if measured
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    if let Some(duration) = elapsed {
        log::info!("{operation} {rows} rows ({}) in {duration:.2?}", path.display());
    } else {
        log::info!("{operation} {rows} rows ({})", path.display());
    }
}

/// Report the output size and duration of an in-memory pipeline stage
pub fn log_stage_complete(stage: &str, items: usize, elapsed: Duration) {
    log::info!("{stage} complete: {items} rows in {elapsed:.2?}");
}

/// Warn about input that was skipped or degraded without failing the run
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{}: {}", message, path.display());
    } else {
        log::warn!("{message}");
    }
}
