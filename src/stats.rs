// Single-pass aggregation of request statistics over a record stream.

use indicatif::HumanBytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::record::{LogRecord, Timestamp};

/// Time span covered by the records folded so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMarker {
    #[default]
    Empty,
    Active { first: Timestamp, last: Timestamp },
}

impl WindowMarker {
    fn observe(&mut self, time: Timestamp) {
        *self = match *self {
            Self::Empty => Self::Active { first: time, last: time },
            Self::Active { first, .. } => Self::Active { first, last: time },
        };
    }
}

/// Running request statistics. Memory use does not depend on the number of
/// folded records, only on the number of distinct status codes.
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    requests: u64,
    statuses: BTreeMap<i64, u64>,
    ok_responses: u64,
    avg_ok_size: f64,
    marker: WindowMarker,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one record, in traversal order
    pub fn fold(&mut self, record: &LogRecord) {
        self.marker.observe(record.time);
        self.requests += 1;
        *self.statuses.entry(record.status).or_insert(0) += 1;

        if record.is_success() {
            // an absent size counts as an empty body
            let size = record.size.unwrap_or(0) as f64;
            let n = self.ok_responses as f64;
            self.avg_ok_size = (self.avg_ok_size * n + size) / (n + 1.0);
            self.ok_responses += 1;
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn is_empty(&self) -> bool {
        self.requests == 0
    }

    pub fn marker(&self) -> WindowMarker {
        self.marker
    }

    /// Close the aggregation
    pub fn finish(self) -> Summary {
        let (requests_per_sec, first_seen, last_seen) = match self.marker {
            WindowMarker::Empty => (0.0, None, None),
            WindowMarker::Active { first, last } => {
                let span = (last - first).num_milliseconds().unsigned_abs() as f64 / 1000.0;
                (self.requests as f64 / (span + 1.0), Some(first), Some(last))
            }
        };

        Summary {
            requests: self.requests,
            requests_per_sec,
            statuses: self.statuses,
            ok_responses: self.ok_responses,
            avg_ok_response_size: self.avg_ok_size,
            first_seen,
            last_seen,
        }
    }
}

/// Final statistics of one scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub requests: u64,
    /// Requests divided by the covered span in seconds plus one
    pub requests_per_sec: f64,
    /// Request count per status code, ascending by code
    pub statuses: BTreeMap<i64, u64>,
    pub ok_responses: u64,
    /// Mean body size of 2xx responses in bytes
    pub avg_ok_response_size: f64,
    pub first_seen: Option<Timestamp>,
    pub last_seen: Option<Timestamp>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests: {}", self.requests)?;
        writeln!(f, "requests/sec: {:.2}", self.requests_per_sec)?;

        f.write_str("responses: {")?;
        for (index, (status, count)) in self.statuses.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{status}: {count}")?;
        }
        writeln!(f, "}}")?;

        write!(
            f,
            "avg size of 2xx responses: {}",
            HumanBytes(self.avg_ok_response_size.max(0.0).round() as u64)
        )
    }
}
