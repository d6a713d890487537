use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::compaction;
use crate::error::{Error, Result};
use crate::iterator::{MergeIterator, RangeIter};
use crate::manifest::{run_path, temp_path, Manifest};
use crate::memtable::MemTable;
use crate::sstable::{self, record, SSTable};
use crate::table::Table;

/// Default memtable flush threshold: 4 MiB.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 4 * 1024 * 1024;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Memtable byte size above which a write triggers a flush.
    pub flush_threshold: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl Options {
    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(Error::InvalidArgument(
                "flush_threshold must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time counters describing the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Generation the next flush will be written under.
    pub next_generation: u64,
    /// Number of sorted runs.
    pub run_count: usize,
    /// Records across all runs, tombstones and shadowed versions included.
    pub run_entries: usize,
    /// Bytes on disk across all runs.
    pub run_bytes: u64,
    /// Entries in the memtable.
    pub memtable_entries: usize,
    /// Memtable byte estimate.
    pub memtable_bytes: usize,
}

/// Everything the engine mutates, guarded by one lock.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) memtable: Arc<MemTable>,
    pub(crate) manifest: Manifest,
}

impl State {
    /// Every cell source, newest first: the memtable, then runs by
    /// descending generation.
    pub(crate) fn tables(&self) -> Vec<Table> {
        let mut tables = Vec::with_capacity(self.manifest.len() + 1);
        tables.push(Table::Mem(Arc::clone(&self.memtable)));
        tables.extend(
            self.manifest
                .newest_first()
                .map(|(_, run)| Table::Run(Arc::clone(run))),
        );
        tables
    }
}

/// An LSM key-value store rooted in one directory.
///
/// Writes land in the memtable and are flushed to a new sorted run once it
/// grows past `Options::flush_threshold`. Reads merge the memtable with
/// every run, newest first.
///
/// Concurrency: all state sits behind one `RwLock`. Writes, flushes and
/// compaction hold the write lock; a range scan holds the read lock only
/// while it snapshots the memtable and run list, then iterates without it.
/// A write that finds the memtable still referenced by a live scan clones
/// it first, so scans never see writes made after they started.
pub struct DB {
    dir: PathBuf,
    options: Options,
    state: RwLock<State>,
}

impl DB {
    /// Open the engine over an existing directory, recovering every run
    /// file in it.
    pub fn open(dir: impl AsRef<Path>, options: Options) -> Result<Self> {
        options.validate()?;
        let dir = dir.as_ref().to_path_buf();
        let manifest = Manifest::recover(&dir)?;

        tracing::info!(
            dir = %dir.display(),
            runs = manifest.len(),
            next_generation = manifest.next_generation(),
            "Opened storage engine"
        );

        Ok(DB {
            dir,
            options,
            state: RwLock::new(State {
                memtable: Arc::new(MemTable::new()),
                manifest,
            }),
        })
    }

    /// Storage directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Insert or overwrite `key`.
    ///
    /// Keys and values longer than `i32::MAX` bytes cannot be stored in a
    /// run and are rejected before the memtable is touched.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        record::check_len(key.len(), "key")?;
        record::check_len(value.len(), "value")?;
        self.write(|memtable| memtable.upsert(key.to_vec(), value.to_vec()))
    }

    /// Delete `key` by writing a tombstone.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        record::check_len(key.len(), "key")?;
        self.write(|memtable| memtable.delete(key.to_vec()))
    }

    /// Live records with key >= `from`, in ascending key order.
    ///
    /// The iterator reads from a snapshot taken now; later writes, flushes
    /// and compactions do not affect it.
    pub fn range(&self, from: &[u8]) -> Result<RangeIter> {
        let tables = self.state.read().tables();
        Ok(RangeIter::new(MergeIterator::from_tables(&tables, from)?))
    }

    /// Current value of `key`, if live.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.range(key)?.next() {
            Some(Ok((found, value))) if found == key => Ok(Some(value)),
            Some(Err(e)) => Err(e),
            _ => Ok(None),
        }
    }

    /// Write the memtable to a new sorted run now. No-op when it is empty.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.memtable.is_empty() {
            return Ok(());
        }
        flush_memtable(&self.dir, &mut state)
    }

    /// Merge the memtable and every run into a single run at generation 1,
    /// dropping tombstones and shadowed versions.
    ///
    /// Holds the write lock for the whole rewrite.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.write();
        compaction::compact(&self.dir, &mut state)
    }

    pub fn stats(&self) -> Stats {
        let state = self.state.read();
        let mut stats = Stats {
            next_generation: state.manifest.next_generation(),
            ..Stats::default()
        };
        for table in state.tables() {
            match table {
                Table::Mem(_) => {
                    stats.memtable_entries = table.len();
                    stats.memtable_bytes = table.size_in_bytes() as usize;
                }
                Table::Run(_) => {
                    stats.run_count += 1;
                    stats.run_entries += table.len();
                    stats.run_bytes += table.size_in_bytes();
                }
            }
        }
        stats
    }

    /// Flush pending writes and release every run file handle.
    pub fn close(self) -> Result<()> {
        self.flush()
        // Dropping `self` releases the handles; the memtable is now empty so
        // `Drop` has nothing left to flush.
    }

    /// Apply a memtable mutation, flushing if it pushed the memtable over
    /// the threshold. A failed flush leaves the mutation in the memtable;
    /// the next write or `flush` retries it.
    fn write(&self, apply: impl FnOnce(&mut MemTable)) -> Result<()> {
        let mut state = self.state.write();
        apply(Arc::make_mut(&mut state.memtable));
        if state.memtable.size_in_bytes() > self.options.flush_threshold {
            flush_memtable(&self.dir, &mut state)?;
        }
        Ok(())
    }
}

impl Drop for DB {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.memtable.is_empty() {
            return;
        }
        if let Err(e) = flush_memtable(&self.dir, state) {
            tracing::error!(error = %e, "Failed to flush memtable on drop");
        }
    }
}

/// Serialize the memtable to `<generation>.temp`, rename it to
/// `<generation>.dat`, register the run and start a fresh memtable.
fn flush_memtable(dir: &Path, state: &mut State) -> Result<()> {
    let generation = state.manifest.next_generation();
    let tmp = temp_path(dir, generation);
    let dst = run_path(dir, generation);

    let summary = sstable::serialize(&tmp, state.memtable.iter_from(b"").map(Ok))
        .inspect_err(|_| discard_temp(&tmp))?;
    fs::rename(&tmp, &dst)?;

    let run = Arc::new(SSTable::open(&dst)?);
    state.manifest.push(run);
    state.memtable = Arc::new(MemTable::new());

    tracing::info!(
        generation,
        entries = summary.entry_count,
        bytes = summary.file_size,
        "Flushed memtable"
    );
    Ok(())
}

/// Best-effort removal of a temporary file after a failed write.
pub(crate) fn discard_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(file = %path.display(), error = %e, "Failed to remove temporary file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn zero_threshold_rejected() {
        let dir = tempdir().unwrap();
        let result = DB::open(dir.path(), Options::default().flush_threshold(0));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn write_over_threshold_flushes() {
        let dir = tempdir().unwrap();
        let db = DB::open(dir.path(), Options::default().flush_threshold(16)).unwrap();

        db.put(b"a", b"1").unwrap();
        assert_eq!(db.stats().run_count, 0);

        // 1 + 8 + 1 = 10 bytes so far; this pushes the memtable past 16.
        db.put(b"b", b"2").unwrap();
        let stats = db.stats();
        assert_eq!(stats.run_count, 1);
        assert_eq!(stats.memtable_entries, 0);
        assert_eq!(stats.next_generation, 2);
        assert!(run_path(dir.path(), 1).exists());
        assert!(!temp_path(dir.path(), 1).exists());
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let dir = tempdir().unwrap();
        let db = DB::open(dir.path(), Options::default().flush_threshold(10)).unwrap();

        // Exactly 10 bytes: 1 (key) + 8 (timestamp) + 1 (value).
        db.put(b"a", b"1").unwrap();
        assert_eq!(db.stats().run_count, 0);
        assert_eq!(db.stats().memtable_bytes, 10);
    }

    #[test]
    fn stats_split_memtable_and_runs() {
        let dir = tempdir().unwrap();
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.put(b"a", b"1").unwrap();
        db.put(b"b", b"2").unwrap();
        db.flush().unwrap();
        db.put(b"c", b"33").unwrap();

        let stats = db.stats();
        assert_eq!(stats.run_count, 1);
        assert_eq!(stats.run_entries, 2);
        assert_eq!(stats.run_bytes, fs::metadata(run_path(dir.path(), 1)).unwrap().len());
        assert_eq!(stats.memtable_entries, 1);
        assert_eq!(stats.memtable_bytes, 1 + 8 + 2);
    }

    #[test]
    fn flush_of_empty_memtable_is_noop() {
        let dir = tempdir().unwrap();
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.flush().unwrap();
        assert_eq!(db.stats().run_count, 0);
        assert_eq!(db.stats().next_generation, 1);
    }

    #[test]
    fn drop_flushes_pending_writes() {
        let dir = tempdir().unwrap();
        {
            let db = DB::open(dir.path(), Options::default()).unwrap();
            db.put(b"k", b"v").unwrap();
        }
        let db = DB::open(dir.path(), Options::default()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn range_snapshot_ignores_later_writes() {
        let dir = tempdir().unwrap();
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.put(b"a", b"1").unwrap();

        let iter = db.range(b"").unwrap();
        db.put(b"b", b"2").unwrap();
        db.delete(b"a").unwrap();

        let records: Vec<_> = iter.map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![(b"a".to_vec(), b"1".to_vec())]);
    }

    #[test]
    fn range_survives_concurrent_flush() {
        let dir = tempdir().unwrap();
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.put(b"a", b"1").unwrap();
        db.put(b"b", b"2").unwrap();

        let mut iter = db.range(b"").unwrap();
        assert_eq!(iter.next().unwrap().unwrap().0, b"a".to_vec());
        db.flush().unwrap();
        assert_eq!(iter.next().unwrap().unwrap().0, b"b".to_vec());
        assert!(iter.next().is_none());
    }
}
