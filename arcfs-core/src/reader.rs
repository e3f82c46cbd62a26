//! Streaming entry content with an optional byte window.

use std::io::{self, Read};

use crate::record::FileRecord;
use crate::{Error, Result};

/// Opens a fresh stream over `entry`, skipping `offset` bytes and yielding at
/// most `limit` bytes after that.
///
/// Skipping decodes and discards the leading bytes. If the entry ends before
/// `offset` bytes have been skipped the open fails with `ShortRead`.
pub fn open(entry: &FileRecord, offset: u64, limit: Option<u64>) -> Result<Box<dyn Read + Send>> {
    tracing::debug!(path = %entry.path, offset, ?limit, "open entry");

    let mut stream = entry.source.open_entry(entry.id)?;

    if offset > 0 {
        let skipped = io::copy(&mut stream.by_ref().take(offset), &mut io::sink())?;
        if skipped < offset {
            return Err(Error::ShortRead {
                path: entry.path.to_string(),
                expected: offset,
                actual: skipped,
            });
        }
    }

    match limit {
        Some(limit) => Ok(Box::new(stream.take(limit))),
        None => Ok(stream),
    }
}

/// A byte range requested against an entry of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    /// Everything from `offset` onward.
    From(u64),
    /// `start` through `end`, both inclusive.
    Bounded { start: u64, end: u64 },
    /// The last `n` bytes.
    Suffix(u64),
}

impl Range {
    /// Decodes into an `(offset, limit)` pair for `open`, clamped to `size`.
    pub fn decode(self, size: u64) -> (u64, Option<u64>) {
        match self {
            Range::From(offset) => (offset.min(size), None),
            Range::Bounded { start, end } => {
                let start = start.min(size);
                let end = end.saturating_add(1).min(size);
                (start, Some(end.saturating_sub(start)))
            }
            Range::Suffix(n) => (size.saturating_sub(n), None),
        }
    }
}

/// Opens `entry` restricted to `range`.
pub fn open_range(entry: &FileRecord, range: Range) -> Result<Box<dyn Read + Send>> {
    let (offset, limit) = range.decode(entry.size);
    open(entry, offset, limit)
}
