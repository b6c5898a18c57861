use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::ReaderConfig;
use crate::error::ScanError;
use crate::format::LineMatcher;
use crate::record::LogRecord;
use crate::seek;
use crate::window::{Order, TimeWindow};

/// Statistics for one pass over a log file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Offset streaming started at, after seeking
    pub start_offset: u64,
    pub lines_read: u64,
    /// Lines that did not decode and were skipped
    pub lines_discarded: u64,
    pub bytes_read: u64,
}

/// Lazy, forward-only sequence of decoded records inside a time window.
///
/// Lines that fail to decode are skipped silently. The sequence ends at the
/// first record past the window's stop bound, at end of file, on an I/O error
/// or on cancellation; the underlying file is released on every one of these
/// paths.
pub struct RecordStream<'m, R> {
    reader: Option<BufReader<R>>,
    matcher: &'m LineMatcher,
    window: TimeWindow,
    order: Order,
    cancel: CancellationToken,
    line: Vec<u8>,
    stats: ReadStats,
}

impl<'m> RecordStream<'m, File> {
    /// Open `path` and position it for `window`
    pub fn open<P: AsRef<Path>>(
        path: P,
        matcher: &'m LineMatcher,
        window: TimeWindow,
        order: Order,
        config: &ReaderConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ScanError> {
        let path = path.as_ref();
        debug!("Opening log file: {}", path.display());
        let file = File::open(path)?;
        Self::new(file, matcher, window, order, config, cancel)
    }
}

impl<'m, R: Read + Seek> RecordStream<'m, R> {
    /// Wrap an already open stream. Seeks to the window's seek target for
    /// `order`, or to the start when that bound is open.
    pub fn new(
        inner: R,
        matcher: &'m LineMatcher,
        window: TimeWindow,
        order: Order,
        config: &ReaderConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ScanError> {
        let mut reader = BufReader::with_capacity(config.buffer_size, inner);

        let start_offset = match window.seek_target(order) {
            Some(since) => {
                let offset = seek::seek_to(&mut reader, matcher, since, order)?;
                info!(offset, %since, %order, "Positioned log reader");
                offset
            }
            None => reader.seek(SeekFrom::Start(0))?,
        };

        Ok(Self {
            reader: Some(reader),
            matcher,
            window,
            order,
            cancel,
            line: Vec::new(),
            stats: ReadStats { start_offset, ..ReadStats::default() },
        })
    }
}

impl<'m, R> RecordStream<'m, R> {
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Whether the underlying stream has been released
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(
                lines_read = self.stats.lines_read,
                lines_discarded = self.stats.lines_discarded,
                bytes_read = self.stats.bytes_read,
                "Closed log reader"
            );
        }
    }
}

impl<'m, R: Read> Iterator for RecordStream<'m, R> {
    type Item = Result<LogRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.reader.is_none() {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.close();
                return Some(Err(ScanError::Cancelled));
            }

            self.line.clear();
            let read = match self.reader.as_mut()?.read_until(b'\n', &mut self.line) {
                Ok(read) => read,
                Err(e) => {
                    self.close();
                    return Some(Err(e.into()));
                }
            };
            if read == 0 {
                self.close();
                return None;
            }
            self.stats.lines_read += 1;
            self.stats.bytes_read += read as u64;

            match self.matcher.decode_bytes(&self.line) {
                Ok(record) if self.window.is_exhausted(self.order, record.time) => {
                    debug!(time = %record.time, "Reached end of time window");
                    self.close();
                    return None;
                }
                Ok(record) => return Some(Ok(record)),
                Err(e) => {
                    self.stats.lines_discarded += 1;
                    trace!(line = self.stats.lines_read, error = %e, "Discarding line");
                }
            }
        }
    }
}

impl<'m, R: Read> FusedIterator for RecordStream<'m, R> {}

impl<'m, R> Drop for RecordStream<'m, R> {
    fn drop(&mut self) {
        self.close();
    }
}
