//! Full compaction: every run plus the memtable rewritten as one run.
//!
//! ```text
//!   memtable ─┐
//!   gen N   ──┤                                     ┌─► compact.temp ─rename─► 1.dat
//!   gen N-1 ──┼─► merge ─► newest per key ─► drop ──┘
//!   ...     ──┤                              tombstones
//!   gen 1   ──┘
//! ```
//!
//! Afterwards `1.dat` is the only run and numbering resumes at 2. Run
//! files that recovery could not open are deleted along with the rest. The new
//! file is renamed into place before the old ones are deleted. A crash
//! in between leaves stale runs next to the compacted one. Their versions
//! are never newer than what `1.dat` holds, though a key whose tombstone
//! was purged can reappear from them.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::db::{discard_temp, State};
use crate::error::Result;
use crate::iterator::{LiveCells, MergeIterator};
use crate::manifest::{run_path, COMPACTED_GENERATION, COMPACTION_TEMP};
use crate::memtable::MemTable;
use crate::sstable::{self, SSTable};

/// Rewrite everything in `state` into a single run under `dir`.
///
/// The caller holds the engine's write lock for the whole call.
pub(crate) fn compact(dir: &Path, state: &mut State) -> Result<()> {
    let tables = state.tables();
    let merged = MergeIterator::from_tables(&tables, b"")?;

    let tmp = dir.join(COMPACTION_TEMP);
    let summary =
        sstable::serialize(&tmp, LiveCells::new(merged)).inspect_err(|_| discard_temp(&tmp))?;
    drop(tables);

    let dst = run_path(dir, COMPACTED_GENERATION);
    fs::rename(&tmp, &dst)?;

    let run = Arc::new(SSTable::open(&dst)?);
    let replaced = state.manifest.replace_all(run);
    state.memtable = Arc::new(MemTable::new());

    for &generation in &replaced {
        // 1.dat was overwritten by the rename.
        if generation == COMPACTED_GENERATION {
            continue;
        }
        match fs::remove_file(run_path(dir, generation)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
    }

    tracing::info!(
        runs_replaced = replaced.len(),
        entries = summary.entry_count,
        bytes = summary.file_size,
        "Compacted all runs"
    );
    Ok(())
}
