//! The generation table: which sorted runs exist and which generation the
//! next flush gets.
//!
//! Nothing is persisted besides the run files themselves. A run's
//! generation is its file name (`<generation>.dat`), so recovery is a
//! directory scan.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sstable::SSTable;

/// Extension of installed run files.
pub const RUN_SUFFIX: &str = ".dat";

/// Extension of files still being written.
pub const TEMP_SUFFIX: &str = ".temp";

/// Temporary file compaction writes before renaming it to `1.dat`.
pub const COMPACTION_TEMP: &str = "compact.temp";

/// Generation every compaction result is installed under.
pub const COMPACTED_GENERATION: u64 = 1;

/// Final path of the run with `generation`.
pub fn run_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{generation}{RUN_SUFFIX}"))
}

/// Path a flush writes to before the rename.
pub fn temp_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{generation}{TEMP_SUFFIX}"))
}

/// Generation encoded in a run file name, if it is one.
pub fn parse_generation(file_name: &str) -> Option<u64> {
    file_name.strip_suffix(RUN_SUFFIX)?.parse().ok()
}

/// Whether `file_name` is a temporary this engine writes: `compact.temp`
/// or `<generation>.temp`.
pub fn is_engine_temp(file_name: &str) -> bool {
    file_name == COMPACTION_TEMP
        || file_name
            .strip_suffix(TEMP_SUFFIX)
            .is_some_and(|stem| stem.parse::<u64>().is_ok())
}

/// Runs keyed by generation, plus the next unused generation.
#[derive(Debug, Clone)]
pub struct Manifest {
    runs: BTreeMap<u64, Arc<SSTable>>,
    /// Run files found on disk that failed to open. Compaction deletes them.
    unreadable: BTreeSet<u64>,
    next_generation: u64,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            runs: BTreeMap::new(),
            unreadable: BTreeSet::new(),
            next_generation: 1,
        }
    }
}

impl Manifest {
    /// Rebuild the table from the run files in `dir`.
    ///
    /// Only a failure to list the directory is fatal. Misnamed or
    /// unreadable run files are skipped with a warning, and leftover
    /// temporary files from an interrupted flush or compaction are removed.
    pub fn recover(dir: &Path) -> Result<Self> {
        let scan_error = |source: std::io::Error| Error::DirectoryScan {
            path: dir.to_path_buf(),
            source,
        };

        let mut manifest = Manifest::default();
        let mut max_generation = 0;

        for entry in fs::read_dir(dir).map_err(scan_error)? {
            let path = entry.map_err(scan_error)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::debug!(path = %path.display(), "Skipping non UTF-8 file name");
                continue;
            };

            if is_engine_temp(name) {
                tracing::warn!(file = name, "Removing stale temporary file");
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(file = name, error = %e, "Failed to remove stale temporary file");
                }
                continue;
            }

            if !name.ends_with(RUN_SUFFIX) {
                tracing::debug!(file = name, "Ignoring unrelated file");
                continue;
            }

            let Some(generation) = parse_generation(name) else {
                tracing::warn!(file = name, "Skipping run file with unparseable generation");
                continue;
            };

            // Counted even if unreadable, so the next flush does not overwrite it.
            max_generation = max_generation.max(generation);
            match SSTable::open(&path) {
                Ok(run) => {
                    manifest.runs.insert(generation, Arc::new(run));
                }
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "Skipping unreadable run file");
                    manifest.unreadable.insert(generation);
                }
            }
        }

        manifest.next_generation = max_generation + 1;
        Ok(manifest)
    }

    /// Generation the next flush is written under.
    pub fn next_generation(&self) -> u64 {
        self.next_generation
    }

    /// Install a freshly flushed run under the next generation.
    pub fn push(&mut self, run: Arc<SSTable>) -> u64 {
        let generation = self.next_generation;
        self.runs.insert(generation, run);
        self.next_generation += 1;
        generation
    }

    /// Make `run` the only run, at generation 1, and return the
    /// generations it replaced: every registered run (a previous
    /// generation 1 included) and every run file that failed to open.
    pub fn replace_all(&mut self, run: Arc<SSTable>) -> Vec<u64> {
        let mut replaced: BTreeSet<u64> = std::mem::take(&mut self.unreadable);
        replaced.extend(std::mem::take(&mut self.runs).into_keys());
        self.runs.insert(COMPACTED_GENERATION, run);
        self.next_generation = COMPACTED_GENERATION + 1;
        replaced.into_iter().collect()
    }

    /// Runs from the newest generation to the oldest.
    pub fn newest_first(&self) -> impl Iterator<Item = (u64, &Arc<SSTable>)> + '_ {
        self.runs.iter().rev().map(|(generation, run)| (*generation, run))
    }

    /// Generations of run files that recovery could not open.
    pub fn unreadable(&self) -> impl Iterator<Item = u64> + '_ {
        self.unreadable.iter().copied()
    }

    /// Number of registered runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstable::serialize;
    use tempfile::tempdir;

    fn empty_run(dir: &Path, generation: u64) {
        serialize(&run_path(dir, generation), std::iter::empty()).unwrap();
    }

    #[test]
    fn parses_generation_names() {
        assert_eq!(parse_generation("12.dat"), Some(12));
        assert_eq!(parse_generation("x.dat"), None);
        assert_eq!(parse_generation("12.temp"), None);
        assert_eq!(parse_generation(".dat"), None);
    }

    #[test]
    fn empty_directory_starts_at_generation_one() {
        let dir = tempdir().unwrap();
        let manifest = Manifest::recover(dir.path()).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.next_generation(), 1);
    }

    #[test]
    fn next_generation_follows_the_maximum() {
        let dir = tempdir().unwrap();
        empty_run(dir.path(), 2);
        empty_run(dir.path(), 7);

        let manifest = Manifest::recover(dir.path()).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.next_generation(), 8);

        let order: Vec<_> = manifest.newest_first().map(|(g, _)| g).collect();
        assert_eq!(order, vec![7, 2]);
    }

    #[test]
    fn stray_and_corrupt_files_are_skipped() {
        let dir = tempdir().unwrap();
        empty_run(dir.path(), 3);
        fs::write(dir.path().join("junk.dat"), b"whatever").unwrap();
        fs::write(dir.path().join("9.dat"), [1u8]).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let manifest = Manifest::recover(dir.path()).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.next_generation(), 10);
        assert_eq!(manifest.unreadable().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn only_engine_temp_names_are_recognized() {
        assert!(is_engine_temp("compact.temp"));
        assert!(is_engine_temp("12.temp"));
        assert!(!is_engine_temp("notes.temp"));
        assert!(!is_engine_temp("-1.temp"));
        assert!(!is_engine_temp(".temp"));
        assert!(!is_engine_temp("12.dat"));
    }

    #[test]
    fn foreign_temp_files_are_kept() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.temp"), b"mine").unwrap();

        Manifest::recover(dir.path()).unwrap();
        assert!(dir.path().join("notes.temp").exists());
    }

    #[test]
    fn stale_temp_files_are_removed() {
        let dir = tempdir().unwrap();
        fs::write(temp_path(dir.path(), 4), b"partial").unwrap();
        fs::write(dir.path().join(COMPACTION_TEMP), b"partial").unwrap();

        Manifest::recover(dir.path()).unwrap();
        assert!(!temp_path(dir.path(), 4).exists());
        assert!(!dir.path().join(COMPACTION_TEMP).exists());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Manifest::recover(&missing),
            Err(Error::DirectoryScan { .. })
        ));
    }

    #[test]
    fn replace_all_resets_generations() {
        let dir = tempdir().unwrap();
        empty_run(dir.path(), 1);
        empty_run(dir.path(), 2);
        let mut manifest = Manifest::recover(dir.path()).unwrap();

        let run = Arc::new(SSTable::open(&run_path(dir.path(), 2)).unwrap());
        let replaced = manifest.replace_all(run);

        assert_eq!(replaced, vec![1, 2]);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.next_generation(), 2);
        let again = Arc::new(SSTable::open(&run_path(dir.path(), 1)).unwrap());
        assert_eq!(manifest.push(again), 2);
        assert_eq!(manifest.next_generation(), 3);
    }

    #[test]
    fn replace_all_reports_unreadable_generations() {
        let dir = tempdir().unwrap();
        empty_run(dir.path(), 2);
        fs::write(run_path(dir.path(), 5), [0u8]).unwrap();
        let mut manifest = Manifest::recover(dir.path()).unwrap();

        let run = Arc::new(SSTable::open(&run_path(dir.path(), 2)).unwrap());
        assert_eq!(manifest.replace_all(run), vec![2, 5]);
        assert_eq!(manifest.unreadable().count(), 0);
    }
}
