pub mod merge;

pub use merge::MergeIterator;

use crate::error::Result;
use crate::types::{Cell, Record};

/// A sorted cell source (memtable, sorted run, merged view) as a boxed
/// iterator of fallible cells in (key ASC, timestamp DESC) order.
/// `MergeIterator` takes a `Vec<CellIterator>` and merges them.
pub type CellIterator = Box<dyn Iterator<Item = Result<Cell>> + Send>;

/// Drops tombstones from a merged, collapsed cell stream.
///
/// What remains is the newest live version of every key, still carrying
/// its timestamp. Compaction writes this stream to disk as-is.
pub struct LiveCells {
    inner: MergeIterator,
}

impl LiveCells {
    pub fn new(inner: MergeIterator) -> Self {
        LiveCells { inner }
    }
}

impl Iterator for LiveCells {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(cell) if cell.value().is_tombstone() => continue,
                other => return Some(other),
            }
        }
    }
}

/// Iterator returned by range scans: live `(key, value)` pairs in
/// ascending key order.
pub struct RangeIter {
    inner: LiveCells,
}

impl RangeIter {
    pub fn new(merged: MergeIterator) -> Self {
        RangeIter {
            inner: LiveCells::new(merged),
        }
    }
}

impl Iterator for RangeIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = match self.inner.next()? {
            Ok(cell) => cell,
            Err(e) => return Some(Err(e)),
        };
        let (key, value) = cell.into_parts();
        // LiveCells never yields a tombstone.
        value.into_data().map(|data| Ok((key, data)))
    }
}
