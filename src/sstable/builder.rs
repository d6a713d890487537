use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::sstable::footer::Footer;
use crate::sstable::record;
use crate::types::{Cell, Key};

/// Summary of a finished run file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Records written (tombstones included).
    pub entry_count: usize,
    /// Final file length in bytes.
    pub file_size: u64,
}

/// Builds a run file from a sorted, deduplicated stream of cells.
///
/// Used during:
/// - Memtable flush (sorted memtable → run)
/// - Compaction (merged iterators → one run)
///
/// Build process:
/// 1. Add cells one by one (keys strictly ascending)
/// 2. Each record is appended to the data region; the start offset of
///    every record after the first is remembered
/// 3. finish() writes the offsets, then the count, then fsyncs
///
/// The builder writes wherever it is told. Callers write to a temporary
/// path and rename into place once `finish` returns.
pub struct SSTableBuilder {
    /// Buffered file writer.
    writer: BufWriter<File>,
    /// Start offsets of rows 1..N.
    offsets: Vec<u64>,
    /// Tracks current write position in the file.
    data_offset: u64,
    /// Total entries added.
    entry_count: usize,
    /// Last key added, to reject out-of-order input.
    last_key: Option<Key>,
    /// Reused record encoding buffer.
    scratch: Vec<u8>,
}

impl SSTableBuilder {
    /// Create a new builder that writes to the given path, truncating any
    /// existing file there.
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(SSTableBuilder {
            writer: BufWriter::new(file),
            offsets: Vec::new(),
            data_offset: 0,
            entry_count: 0,
            last_key: None,
            scratch: Vec::new(),
        })
    }

    /// Append a cell. Keys MUST be strictly ascending.
    pub fn add(&mut self, cell: &Cell) -> Result<()> {
        if let Some(last) = &self.last_key {
            if last.as_slice() >= cell.key() {
                return Err(Error::InvalidArgument(
                    "cells must be added in strictly ascending key order".into(),
                ));
            }
        }

        if self.entry_count > 0 {
            self.offsets.push(self.data_offset);
        }

        self.scratch.clear();
        self.scratch.reserve(record::encoded_len(cell));
        record::encode(cell, &mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;

        self.data_offset += self.scratch.len() as u64;
        self.entry_count += 1;
        self.last_key = Some(cell.key().to_vec());
        Ok(())
    }

    /// Number of cells added so far.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Finalize the run: write the footer, flush and fsync.
    pub fn finish(mut self) -> Result<BuildSummary> {
        let footer = Footer::encode(&self.offsets, self.entry_count)?;
        self.writer.write_all(&footer)?;

        // Flush buffer + fsync to guarantee durability before the rename
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        Ok(BuildSummary {
            entry_count: self.entry_count,
            file_size: self.data_offset + footer.len() as u64,
        })
    }
}

/// Write every cell from `cells` into a new run file at `path`.
///
/// Stops at the first error from the producer or the file.
pub fn serialize<I>(path: &Path, cells: I) -> Result<BuildSummary>
where
    I: IntoIterator<Item = Result<Cell>>,
{
    let mut builder = SSTableBuilder::new(path)?;
    for cell in cells {
        builder.add(&cell?)?;
    }
    builder.finish()
}
