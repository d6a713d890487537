use std::sync::Arc;

use crate::error::Result;
use crate::iterator::CellIterator;
use crate::memtable::MemTable;
use crate::sstable::SSTable;

/// A read-only view over one cell source of the engine.
///
/// Both the memtable and sorted runs can be scanned from a key and sized,
/// which is all merge iteration needs. Writes only exist on `MemTable`
/// itself, so a sorted run can never be handed a mutation.
#[derive(Debug, Clone)]
pub enum Table {
    /// The mutable buffer, as of the moment the view was taken.
    Mem(Arc<MemTable>),
    /// An immutable sorted run.
    Run(Arc<SSTable>),
}

impl Table {
    /// Cells with key >= `from`, in (key ASC, timestamp DESC) order.
    pub fn range_from(&self, from: &[u8]) -> Result<CellIterator> {
        match self {
            Table::Mem(mem) => Ok(Box::new(mem.range_from(from).map(Ok))),
            Table::Run(run) => Ok(Box::new(run.range_from(from)?)),
        }
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        match self {
            Table::Mem(mem) => mem.len(),
            Table::Run(run) => run.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Memtable byte estimate, or the run's file length.
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            Table::Mem(mem) => mem.size_in_bytes() as u64,
            Table::Run(run) => run.file_size(),
        }
    }
}
