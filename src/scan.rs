// One complete scan: compile the format, position the reader, fold the window.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::format::LineMatcher;
use crate::reader::{ReadStats, RecordStream};
use crate::stats::{RequestStats, Summary};

/// Outcome of [`scan_file`], serialized as the `--stats-out` report
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub path: PathBuf,
    pub run_start: DateTime<Utc>,
    pub total_processing_time_ms: u64,
    /// True when the scan stopped on cancellation; `summary` then covers only
    /// the records folded before it
    pub cancelled: bool,
    pub summary: Summary,
    pub read_stats: ReadStats,
}

/// Scan `path` with `config` and aggregate every record inside its window.
///
/// `on_progress` receives the running record count every
/// `config.progress_every` records (never, when that is 0).
pub fn scan_file<P, F>(
    path: P,
    config: &ScanConfig,
    cancel: CancellationToken,
    on_progress: F,
) -> Result<ScanReport, ScanError>
where
    P: AsRef<Path>,
    F: FnMut(u64),
{
    let path = path.as_ref();
    let run_start = Utc::now();
    let started = Instant::now();

    let matcher = LineMatcher::new(&config.format)?;
    let missing = matcher.missing_fields();
    if !missing.is_empty() {
        warn!(?missing, "Log format does not capture every required field, no line will decode");
    }

    info!(path = %path.display(), order = %config.order, "Starting scan");
    let mut records = RecordStream::open(
        path,
        &matcher,
        config.window,
        config.order,
        &config.reader,
        cancel,
    )?;

    let (stats, cancelled) = fold_records(&mut records, config.progress_every, on_progress)?;

    let read_stats = records.stats().clone();
    drop(records);

    let summary = stats.finish();
    let total_processing_time_ms = started.elapsed().as_millis() as u64;
    info!(
        requests = summary.requests,
        lines_read = read_stats.lines_read,
        lines_discarded = read_stats.lines_discarded,
        cancelled,
        elapsed_ms = total_processing_time_ms,
        "Scan finished"
    );

    Ok(ScanReport {
        path: path.to_path_buf(),
        run_start,
        total_processing_time_ms,
        cancelled,
        summary,
        read_stats,
    })
}

/// Drain `records` into fresh stats. Cancellation ends the fold early and is
/// reported as `true`; any other stream error is returned as is.
fn fold_records<R, F>(
    records: &mut RecordStream<'_, R>,
    progress_every: u64,
    mut on_progress: F,
) -> Result<(RequestStats, bool), ScanError>
where
    R: Read,
    F: FnMut(u64),
{
    let mut stats = RequestStats::new();
    for record in records.by_ref() {
        match record {
            Ok(record) => stats.fold(&record),
            Err(ScanError::Cancelled) => return Ok((stats, true)),
            Err(e) => return Err(e),
        }
        if progress_every > 0 && stats.requests() % progress_every == 0 {
            on_progress(stats.requests());
        }
    }
    Ok((stats, false))
}
