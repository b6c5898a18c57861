pub mod config;
pub mod error;
pub mod format;
pub mod reader;
pub mod record;
pub mod scan;
pub mod seek;
pub mod stats;
pub mod window;

// Re-export main types for convenient access
pub use config::{ReaderConfig, ScanConfig};
pub use error::{BoundError, DecodeError, FormatError, ScanError};
pub use format::{LineMatcher, LineTemplate, DEFAULT_LOG_FORMAT};
pub use reader::{ReadStats, RecordStream};
pub use record::{LogRecord, RawRecord, Timestamp};
pub use scan::{scan_file, ScanReport};
pub use seek::{seek_to, SeekLocator};
pub use stats::{RequestStats, Summary, WindowMarker};
pub use window::{parse_bound, Order, TimeWindow};
