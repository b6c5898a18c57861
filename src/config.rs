use serde::Serialize;

use crate::format::DEFAULT_LOG_FORMAT;
use crate::window::{Order, TimeWindow};

/// Configuration for buffered log reading
#[derive(Debug, Clone, Serialize)]
pub struct ReaderConfig {
    /// Buffer size for line reading (default: 8KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192, // WHY: 8KB holds dozens of access log lines per read syscall
        }
    }
}

/// Everything one scan of a log file needs besides the path
#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    /// Line template the file was written with
    pub format: String,
    /// Chronological direction of the file
    pub order: Order,
    /// Requested time window
    pub window: TimeWindow,
    pub reader: ReaderConfig,
    /// Progress callback cadence in folded records
    pub progress_every: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
            order: Order::default(),
            window: TimeWindow::unbounded(),
            reader: ReaderConfig::default(),
            progress_every: 1000,
        }
    }
}
