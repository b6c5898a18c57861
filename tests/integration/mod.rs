// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use logspan::Timestamp;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Syslog decoration a log shipper puts in front of every gunicorn line
pub const SYSLOG_PREFIX: &str = "Dec 01 11:06:05 app3-test-vm1 gunicorn[53253]:";

/// A line that never matches any template
pub const HEADER: &str = "some kind of header that is not actual log";

/// Test fixture helper for creating temporary access log files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self { temp_dir, root_path }
    }

    /// Write `lines` (newline terminated) to `relative_path`
    pub fn create_log<P: AsRef<Path>>(&self, relative_path: P, lines: &[String]) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        let mut content = String::new();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(&file_path, content).expect("Failed to write test log");
        file_path
    }
}

/// Base instant of generated logs, 01/Dec/2019:10:00:00 UTC
pub fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2019, 12, 1, 10, 0, 0)
        .unwrap()
        .fixed_offset()
}

/// `base_time()` plus `seconds`, shown in +0100
pub fn at(seconds: i64) -> Timestamp {
    let offset = chrono::FixedOffset::east_opt(3600).unwrap();
    (base_time() + Duration::seconds(seconds)).with_timezone(&offset)
}

/// One access log line in the default format
pub fn access_line(time: Timestamp, status: i64, size: Option<i64>) -> String {
    let size = size.map_or_else(|| "-".to_string(), |size| size.to_string());
    format!(
        "{SYSLOG_PREFIX} 172.16.3.14 - - [{}] \"GET /agenda HTTP/1.1\" {status} {size} \"-\" \"python-requests/2.22.0\" 72680",
        time.format("%d/%b/%Y:%H:%M:%S %z")
    )
}

/// Lines for the given second offsets, all 200 with a 720 byte body
pub fn access_lines(seconds: impl IntoIterator<Item = i64>) -> Vec<String> {
    seconds
        .into_iter()
        .map(|second| access_line(at(second), 200, Some(720)))
        .collect()
}
