use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::iterator::CellIterator;
use crate::table::Table;
use crate::types::{Cell, Key};

/// Current head of one source, ordered for the heap.
struct HeapEntry {
    cell: Cell,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Key ASC, timestamp DESC. On equal timestamps the lower source
        // index wins: sources are passed newest first.
        let (a, b) = (self.cell.value(), other.cell.value());
        self.cell
            .key()
            .cmp(other.cell.key())
            .then_with(|| b.timestamp().cmp(&a.timestamp()))
            .then(self.source.cmp(&other.source))
    }
}

/// Merges multiple sorted cell sources into one stream with a single cell
/// per key.
///
/// Used for:
/// - Range scans across the memtable + all sorted runs
/// - Compaction (merging every run into one)
///
/// Sources are ordered by priority: index 0 = newest (memtable), higher
/// indices = older runs. For each key only the first cell popped is
/// yielded, which is the newest version. Tombstones are passed through;
/// filtering them is the caller's job.
///
/// This is the same algorithm as external merge sort: a min-heap holding
/// the current head of every source.
pub struct MergeIterator {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    sources: Vec<CellIterator>,
    /// Key of the last cell yielded, to collapse older versions.
    last_key: Option<Key>,
    /// Set once a source fails; nothing is yielded after the error.
    finished: bool,
}

impl MergeIterator {
    /// Build the initial heap from the first cell of every source.
    pub fn new(mut sources: Vec<CellIterator>) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, iter) in sources.iter_mut().enumerate() {
            if let Some(cell) = iter.next() {
                heap.push(Reverse(HeapEntry { cell: cell?, source }));
            }
        }
        Ok(MergeIterator {
            heap,
            sources,
            last_key: None,
            finished: false,
        })
    }

    /// Merge `tables`, given newest first, from key `from` onward.
    pub fn from_tables(tables: &[Table], from: &[u8]) -> Result<Self> {
        let mut sources = Vec::with_capacity(tables.len());
        for table in tables {
            tracing::debug!(entries = table.len(), "Adding merge source");
            sources.push(table.range_from(from)?);
        }
        Self::new(sources)
    }

    /// Pull the next cell of `source` into the heap.
    fn refill(&mut self, source: usize) -> Result<()> {
        if let Some(cell) = self.sources[source].next() {
            self.heap.push(Reverse(HeapEntry { cell: cell?, source }));
        }
        Ok(())
    }
}

impl Iterator for MergeIterator {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while let Some(Reverse(HeapEntry { cell, source })) = self.heap.pop() {
            if let Err(e) = self.refill(source) {
                self.finished = true;
                return Some(Err(e));
            }

            if self.last_key.as_deref() == Some(cell.key()) {
                // Older version of a key already yielded.
                continue;
            }
            self.last_key = Some(cell.key().to_vec());
            return Some(Ok(cell));
        }

        self.finished = true;
        None
    }
}
