// Binary search over an unindexed, line-delimited log for the first line that
// crosses a time boundary.

use std::io::{self, BufRead, Seek, SeekFrom};
use tracing::debug;

use crate::format::LineMatcher;
use crate::record::Timestamp;
use crate::window::Order;

/// Bytes read per step of the backward newline scan
const BACKSCAN_CHUNK: usize = 4096;

/// Outcome of probing one line during the search
enum Pivot {
    /// The pivot line (or the corrupt run starting at it) is past the boundary
    TooFar,
    /// A decodable line before the boundary, at the given offset
    NotFarEnough(u64),
}

/// Positions a log reader at the first line past a boundary timestamp.
///
/// "Past" follows [`Order::is_past`]: for descending files the first line
/// earlier than `since`, for ascending files the first line at or after it.
/// Lines that do not decode are never the answer and never abort the search.
pub struct SeekLocator<'a, R> {
    matcher: &'a LineMatcher,
    reader: &'a mut R,
    line: Vec<u8>,
    chunk: Vec<u8>,
    pivots: u32,
}

impl<'a, R: BufRead + Seek> SeekLocator<'a, R> {
    pub fn new(matcher: &'a LineMatcher, reader: &'a mut R) -> Self {
        Self {
            matcher,
            reader,
            line: Vec::new(),
            chunk: Vec::with_capacity(BACKSCAN_CHUNK),
            pivots: 0,
        }
    }

    /// Run the search and leave the reader at the returned offset.
    ///
    /// Returns 0 when no line decodes at all (including an empty file) and the
    /// end of the file when no decodable line is past the boundary.
    pub fn locate(&mut self, since: Timestamp, order: Order) -> io::Result<u64> {
        self.pivots = 0;
        self.reader.seek(SeekFrom::Start(0))?;

        let Some((first, time)) = self.next_decodable(u64::MAX)? else {
            debug!("No decodable line found, reading from the start");
            return self.settle(0);
        };
        if order.is_past(time, since) {
            debug!(offset = first, "First line already past the boundary");
            return self.settle(first);
        }

        let end = self.reader.seek(SeekFrom::End(0))?;
        // lo: decodable line before the boundary; hi: line start (or EOF) with
        // every decodable line from there on past the boundary
        let mut lo = first;
        let mut hi = end;

        loop {
            let mid = lo + (hi - lo) / 2;
            let mut pivot = self.line_start_at_or_before(mid)?;
            if pivot <= lo {
                pivot = self.line_end(lo)?;
                if pivot >= hi {
                    break;
                }
            }

            self.pivots += 1;
            match self.classify(pivot, hi, since, order)? {
                Pivot::TooFar => hi = pivot,
                Pivot::NotFarEnough(offset) => lo = offset,
            }
        }

        // hi may start a run of undecodable lines; the answer is the first
        // decodable line after them
        self.reader.seek(SeekFrom::Start(hi))?;
        let offset = match self.next_decodable(end)? {
            Some((offset, _)) => offset,
            None => end,
        };
        debug!(offset, pivots = self.pivots, "Seek converged");
        self.settle(offset)
    }

    /// Number of pivot lines read by the last `locate`
    pub fn pivots(&self) -> u32 {
        self.pivots
    }

    fn settle(&mut self, offset: u64) -> io::Result<u64> {
        self.reader.seek(SeekFrom::Start(offset))
    }

    fn classify(&mut self, pivot: u64, hi: u64, since: Timestamp, order: Order) -> io::Result<Pivot> {
        self.reader.seek(SeekFrom::Start(pivot))?;
        let read = self.read_line()?;
        if let Ok(record) = self.matcher.decode_bytes(&self.line) {
            return Ok(if order.is_past(record.time, since) {
                Pivot::TooFar
            } else {
                Pivot::NotFarEnough(pivot)
            });
        }

        // WHY: a corrupt pivot carries no timestamp, so retry at the next
        // decodable line; the corrupt run itself is harmless to stream
        if pivot + read as u64 >= hi {
            return Ok(Pivot::TooFar);
        }
        Ok(match self.next_decodable(hi)? {
            Some((offset, time)) if !order.is_past(time, since) => Pivot::NotFarEnough(offset),
            _ => Pivot::TooFar,
        })
    }

    /// Read forward from the current position to the first line that decodes,
    /// stopping at absolute offset `limit`
    fn next_decodable(&mut self, limit: u64) -> io::Result<Option<(u64, Timestamp)>> {
        let mut offset = self.reader.stream_position()?;

        while offset < limit {
            let read = self.read_line()?;
            if read == 0 {
                break;
            }
            if let Ok(record) = self.matcher.decode_bytes(&self.line) {
                return Ok(Some((offset, record.time)));
            }
            offset += read as u64;
        }
        Ok(None)
    }

    fn read_line(&mut self) -> io::Result<usize> {
        self.line.clear();
        self.reader.read_until(b'\n', &mut self.line)
    }

    /// Offset just past the line starting at `start`
    fn line_end(&mut self, start: u64) -> io::Result<u64> {
        self.reader.seek(SeekFrom::Start(start))?;
        let read = self.read_line()?;
        Ok(start + read as u64)
    }

    /// Start of the line containing byte `pos`: one past the last newline
    /// before it, or 0
    fn line_start_at_or_before(&mut self, pos: u64) -> io::Result<u64> {
        let mut end = pos;
        while end > 0 {
            let start = end.saturating_sub(BACKSCAN_CHUNK as u64);
            let len = (end - start) as usize;

            self.chunk.resize(len, 0);
            self.reader.seek(SeekFrom::Start(start))?;
            self.reader.read_exact(&mut self.chunk[..len])?;

            if let Some(newline) = self.chunk.iter().rposition(|&b| b == b'\n') {
                return Ok(start + newline as u64 + 1);
            }
            end = start;
        }
        Ok(0)
    }
}

/// Position `reader` at the first line past `since` for a file in `order`.
/// See [`SeekLocator`].
pub fn seek_to<R: BufRead + Seek>(
    reader: &mut R,
    matcher: &LineMatcher,
    since: Timestamp,
    order: Order,
) -> io::Result<u64> {
    SeekLocator::new(matcher, reader).locate(since, order)
}
