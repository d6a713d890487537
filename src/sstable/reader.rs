use std::cmp::Ordering;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::sstable::footer::{Footer, COUNT_SIZE, OFFSET_SIZE};
use crate::sstable::record::{decode_timestamp, LEN_SIZE};
use crate::types::{Cell, Key, Value, TIMESTAMP_SIZE};

/// An opened run file. Supports point lookups and forward range scans.
///
/// On open only the trailing count is read; row offsets, keys and values
/// are read on demand with positional reads.
pub struct SSTable {
    /// Path to the run file (for debugging/error messages).
    path: PathBuf,
    /// Open file handle, locked for each seek + read pair.
    file: Mutex<File>,
    /// Cached entry count and file size.
    footer: Footer,
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("entry_count", &self.footer.entry_count)
            .field("file_size", &self.footer.file_size)
            .finish()
    }
}

impl SSTable {
    /// Open a run file read-only and validate its footer.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;

        let file_size = file.metadata()?.len();
        if file_size < COUNT_SIZE {
            return Err(Error::Corruption(format!(
                "{}: file too short to contain a footer",
                path.display()
            )));
        }

        file.seek(SeekFrom::Start(file_size - COUNT_SIZE))?;
        let mut count = [0u8; COUNT_SIZE as usize];
        file.read_exact(&mut count)?;
        let footer = Footer::decode(count, file_size)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            footer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.footer.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.footer.entry_count == 0
    }

    /// File length in bytes.
    pub fn file_size(&self) -> u64 {
        self.footer.file_size
    }

    /// Byte offset of `row` within the data region.
    pub fn offset_for_row(&self, row: usize) -> Result<u64> {
        if row == 0 {
            return Ok(0);
        }
        if row >= self.footer.entry_count {
            return Err(Error::InvalidArgument(format!(
                "row {row} out of range for {} entries",
                self.footer.entry_count
            )));
        }
        let mut buf = [0u8; OFFSET_SIZE as usize];
        self.read_at(self.footer.offset_position(row), &mut buf)?;
        let offset = i64::from_be_bytes(buf);
        if offset < 0 || offset as u64 >= self.footer.data_end() {
            return Err(self.corruption(format!("row {row} has invalid offset {offset}")));
        }
        Ok(offset as u64)
    }

    /// Key of the record starting at `offset`.
    pub fn key_at(&self, offset: u64) -> Result<Key> {
        let len = self.read_len(offset)?;
        let mut key = vec![0u8; len];
        self.read_at(offset + LEN_SIZE as u64, &mut key)?;
        Ok(key)
    }

    /// Full cell of the record starting at `offset`.
    pub fn cell_at(&self, offset: u64) -> Result<Cell> {
        let key = self.key_at(offset)?;
        let mut offset = offset + (LEN_SIZE + key.len()) as u64;

        let mut ts = [0u8; TIMESTAMP_SIZE];
        self.read_at(offset, &mut ts)?;
        let (timestamp, tombstone) = decode_timestamp(i64::from_be_bytes(ts))?;
        if tombstone {
            return Ok(Cell::new(key, Value::tombstone(timestamp)));
        }
        offset += TIMESTAMP_SIZE as u64;

        let len = self.read_len(offset)?;
        let mut value = vec![0u8; len];
        self.read_at(offset + LEN_SIZE as u64, &mut value)?;
        Ok(Cell::new(key, Value::new(value, timestamp)))
    }

    /// Row of `target`, or the first row with a larger key if absent.
    /// Returns `len()` when every key is smaller.
    pub fn binary_search(&self, target: &[u8]) -> Result<usize> {
        let mut left = 0usize;
        let mut right = self.footer.entry_count;

        while left < right {
            let mid = left + (right - left) / 2;
            let key = self.key_at(self.offset_for_row(mid)?)?;
            match key.as_slice().cmp(target) {
                Ordering::Less => left = mid + 1,
                Ordering::Greater => right = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Ok(left)
    }

    /// Point lookup: the stored version of `key`, tombstones included.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        let row = self.binary_search(key)?;
        if row >= self.footer.entry_count {
            return Ok(None);
        }
        let cell = self.cell_at(self.offset_for_row(row)?)?;
        if cell.key() != key {
            return Ok(None);
        }
        Ok(Some(cell.into_parts().1))
    }

    /// Forward iterator over cells with key >= `from`.
    ///
    /// The starting row is found eagerly; each cell is read on demand.
    pub fn range_from(self: &Arc<Self>, from: &[u8]) -> Result<SSTableIterator> {
        let row = self.binary_search(from)?;
        Ok(SSTableIterator {
            table: Arc::clone(self),
            row,
        })
    }

    /// Iterator over every cell in the run.
    pub fn iter(self: &Arc<Self>) -> SSTableIterator {
        SSTableIterator {
            table: Arc::clone(self),
            row: 0,
        }
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Read a length prefix and check the bytes it announces fit in the
    /// data region.
    fn read_len(&self, offset: u64) -> Result<usize> {
        let mut buf = [0u8; LEN_SIZE];
        self.read_at(offset, &mut buf)?;
        let len = i32::from_be_bytes(buf);
        let end = offset + LEN_SIZE as u64 + len.max(0) as u64;
        if len < 0 || end > self.footer.data_end() {
            return Err(self.corruption(format!("bad length {len} at offset {offset}")));
        }
        Ok(len as usize)
    }

    fn corruption(&self, msg: String) -> Error {
        Error::Corruption(format!("{}: {msg}", self.path.display()))
    }
}

/// Sequential cursor over rows `start..N` of a run.
///
/// Yields an error at most once, then stops.
pub struct SSTableIterator {
    table: Arc<SSTable>,
    row: usize,
}

impl Iterator for SSTableIterator {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.table.len() {
            return None;
        }
        let row = self.row;
        self.row += 1;

        let cell = self
            .table
            .offset_for_row(row)
            .and_then(|offset| self.table.cell_at(offset));
        if cell.is_err() {
            self.row = self.table.len();
        }
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.len().saturating_sub(self.row);
        (0, Some(remaining))
    }
}
