pub mod skiplist;

use std::sync::Arc;

use skiplist::SkipList;

use crate::types::{next_timestamp, Cell, Key, Value};

/// In-memory sorted buffer for writes. Wraps a SkipList.
///
/// Every write goes here first. When its byte size exceeds the engine's
/// flush threshold, it is serialized to a new sorted run and replaced
/// with an empty one.
///
/// Deletes are handled via tombstones: a value with no payload that means
/// "this key is deleted." You can't just remove the key because older
/// versions may exist in sorted runs on disk.
///
/// `Clone` lets the engine copy-on-write a memtable that a live range
/// iterator still holds.
#[derive(Debug, Clone, Default)]
pub struct MemTable {
    data: SkipList<Value>,
    size_in_bytes: usize,
}

impl MemTable {
    /// Create a new empty memtable.
    pub fn new() -> Self {
        MemTable::default()
    }

    /// Insert or overwrite `key` with `value` stamped at the current time.
    pub fn upsert(&mut self, key: Key, value: Vec<u8>) {
        self.insert(key, Value::new(value, next_timestamp()));
    }

    /// Mark a key as deleted by writing a tombstone at the current time.
    pub fn delete(&mut self, key: Key) {
        self.insert(key, Value::tombstone(next_timestamp()));
    }

    /// Store an already-stamped value, replacing any previous version.
    ///
    /// Size accounting: a new key adds its length plus the value size; an
    /// overwrite adds the difference between new and old value sizes.
    pub fn insert(&mut self, key: Key, value: Value) {
        let key_len = key.len();
        let new_size = value.size_in_bytes();
        match self.data.insert(key, value) {
            Some(old) => {
                self.size_in_bytes = self.size_in_bytes - old.size_in_bytes() + new_size;
            }
            None => self.size_in_bytes += key_len + new_size,
        }
    }

    /// Latest version of `key`, tombstones included.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.data.get(key)
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cumulative byte estimate used to trigger a flush.
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// Borrowing iterator over cells with key >= `from`.
    pub fn iter_from<'a>(&'a self, from: &[u8]) -> impl Iterator<Item = Cell> + 'a {
        self.data
            .range_from(from)
            .map(|(key, value)| Cell::new(key.to_vec(), value.clone()))
    }

    /// Owning iterator over cells with key >= `from`.
    ///
    /// Holds its own reference to the memtable, so it stays valid after the
    /// engine swaps in a fresh memtable.
    pub fn range_from(self: &Arc<Self>, from: &[u8]) -> MemTableIter {
        MemTableIter {
            next: self.data.seek(from),
            table: Arc::clone(self),
        }
    }
}

/// Sorted cursor over an `Arc<MemTable>`. Each step copies one cell out.
pub struct MemTableIter {
    table: Arc<MemTable>,
    next: Option<usize>,
}

impl Iterator for MemTableIter {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        let node = self.next?;
        self.next = self.table.data.successor(node);
        let (key, value) = self.table.data.entry(node);
        Some(Cell::new(key.to_vec(), value.clone()))
    }
}
