// Time window and file ordering, plus parsing of user-supplied bounds.

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::BoundError;
use crate::record::Timestamp;

/// Bound format with an explicit offset, e.g. `12/07/2021:22:40:13+0100`
pub const BOUND_FORMAT: &str = "%d/%m/%Y:%H:%M:%S%z";

/// Bound format without offset, interpreted as UTC
pub const BOUND_FORMAT_UTC: &str = "%d/%m/%Y:%H:%M:%S";

/// Chronological direction of a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Oldest entry first (appended log)
    Ascending,
    /// Newest entry first
    #[default]
    Descending,
}

impl Order {
    /// Whether a line logged at `time` lies at or beyond `bound` when the file
    /// is traversed in this order.
    ///
    /// Descending files move backwards in time, so a line is past the bound
    /// once it is earlier than it. Ascending files pass an (exclusive) bound as
    /// soon as a line is at or after it.
    pub fn is_past(self, time: Timestamp, bound: Timestamp) -> bool {
        match self {
            Self::Descending => time < bound,
            Self::Ascending => time >= bound,
        }
    }
}

impl FromStr for Order {
    type Err = BoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(Self::Ascending),
            "descending" => Ok(Self::Descending),
            other => Err(BoundError::InvalidOrder(other.to_string())),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        })
    }
}

/// Inclusive `from`, exclusive `to`; either may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeWindow {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl TimeWindow {
    pub fn new(from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bound the cursor is positioned at before streaming starts: the newest
    /// end for descending files, the oldest end for ascending ones
    pub fn seek_target(&self, order: Order) -> Option<Timestamp> {
        match order {
            Order::Descending => self.to,
            Order::Ascending => self.from,
        }
    }

    /// Bound at which streaming stops
    pub fn stop_target(&self, order: Order) -> Option<Timestamp> {
        match order {
            Order::Descending => self.from,
            Order::Ascending => self.to,
        }
    }

    /// True once a record at `time` means nothing further in the file is wanted
    pub fn is_exhausted(&self, order: Order, time: Timestamp) -> bool {
        self.stop_target(order).is_some_and(|bound| order.is_past(time, bound))
    }
}

/// Parse a `--from`/`--to` value. Without an offset the time is taken as UTC.
pub fn parse_bound(value: &str) -> Result<Timestamp, BoundError> {
    if let Ok(time) = DateTime::parse_from_str(value, BOUND_FORMAT) {
        return Ok(time);
    }
    NaiveDateTime::parse_from_str(value, BOUND_FORMAT_UTC)
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| BoundError::InvalidTimestamp(value.to_string()))
}
