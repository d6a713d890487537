use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// A live key/value pair as yielded by range scans.
pub type Record = (Key, Vec<u8>);

/// Size of the timestamp field, counted in every value's size estimate.
pub const TIMESTAMP_SIZE: usize = 8;

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Returns a write timestamp: microseconds since the Unix epoch, bumped so
/// every call in this process returns a value strictly greater than the last.
///
/// Always > 0, so the on-disk sign trick for tombstones is unambiguous.
pub fn next_timestamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    let mut last = LAST_TIMESTAMP.load(AtomicOrdering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(
            last,
            next,
            AtomicOrdering::AcqRel,
            AtomicOrdering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// A value payload tagged with the timestamp of the write that produced it.
///
/// A missing payload is a tombstone. The key isn't removed, it's marked as
/// deleted so that older versions in sorted runs stay shadowed.
///
/// Ordering: timestamp DESC (newest first). Payload bytes only break ties
/// so that `Ord` stays consistent with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    data: Option<Vec<u8>>,
    timestamp: u64,
}

impl Value {
    /// A live value written at `timestamp`.
    pub fn new(data: Vec<u8>, timestamp: u64) -> Self {
        debug_assert!(timestamp > 0, "timestamp must be positive");
        Value {
            data: Some(data),
            timestamp,
        }
    }

    /// A deletion marker written at `timestamp`.
    pub fn tombstone(timestamp: u64) -> Self {
        debug_assert!(timestamp > 0, "timestamp must be positive");
        Value {
            data: None,
            timestamp,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.data.is_none()
    }

    /// Payload bytes, `None` for a tombstone.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn into_data(self) -> Option<Vec<u8>> {
        self.data
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Estimated footprint: timestamp plus payload length.
    pub fn size_in_bytes(&self) -> usize {
        TIMESTAMP_SIZE + self.data.as_ref().map_or(0, Vec::len)
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| self.data.cmp(&other.data))
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A key paired with one version of its value. The unit of storage and
/// of merge ordering.
///
/// Ordering: (key ASC, timestamp DESC).
/// This ensures the newest version of a key always comes first during merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    key: Key,
    value: Value,
}

impl Cell {
    pub fn new(key: Key, value: Value) -> Self {
        Cell { key, value }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_parts(self) -> (Key, Value) {
        (self.key, self.value)
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
