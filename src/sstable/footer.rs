use crate::error::{Error, Result};

/// Size of the trailing record count.
pub const COUNT_SIZE: u64 = 4;

/// Size of one stored row offset.
pub const OFFSET_SIZE: u64 = 8;

/// The footer sits at the end of a run file and lets a reader jump to any
/// row without scanning the data region.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Offset of row 1 (i64 BE)             │
/// │ ...                                  │
/// │ Offset of row N-1 (i64 BE)           │
/// │ Row count N (i32 BE)                 │
/// └──────────────────────────────────────┘
/// ```
///
/// Row 0 always starts at offset 0 and is not stored. An empty run is a
/// footer with only the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Number of records in the run.
    pub entry_count: usize,
    /// Total file length, footer included.
    pub file_size: u64,
}

impl Footer {
    /// Footer length for a run of `entry_count` records.
    pub fn size_for(entry_count: usize) -> u64 {
        OFFSET_SIZE * entry_count.saturating_sub(1) as u64 + COUNT_SIZE
    }

    /// Encode the footer for a run whose rows 1..N start at `offsets`.
    pub fn encode(offsets: &[u64], entry_count: usize) -> Result<Vec<u8>> {
        debug_assert_eq!(offsets.len(), entry_count.saturating_sub(1));
        let count = i32::try_from(entry_count)
            .map_err(|_| Error::InvalidArgument(format!("{entry_count} entries exceed run capacity")))?;

        let mut buf = Vec::with_capacity(Self::size_for(entry_count) as usize);
        for offset in offsets {
            buf.extend_from_slice(&(*offset as i64).to_be_bytes());
        }
        buf.extend_from_slice(&count.to_be_bytes());
        Ok(buf)
    }

    /// Validate the trailing count read from a file of `file_size` bytes.
    pub fn decode(count_bytes: [u8; COUNT_SIZE as usize], file_size: u64) -> Result<Self> {
        let count = i32::from_be_bytes(count_bytes);
        if count < 0 {
            return Err(Error::Corruption(format!("negative entry count {count}")));
        }
        let entry_count = count as usize;
        if Self::size_for(entry_count) > file_size {
            return Err(Error::Corruption(format!(
                "footer for {entry_count} entries does not fit in {file_size} bytes"
            )));
        }
        Ok(Footer {
            entry_count,
            file_size,
        })
    }

    /// End of the data region (start of the footer).
    pub fn data_end(&self) -> u64 {
        self.file_size - Self::size_for(self.entry_count)
    }

    /// File position of the stored offset for `row` (1..N).
    pub fn offset_position(&self, row: usize) -> u64 {
        debug_assert!(row > 0 && row < self.entry_count);
        self.file_size - COUNT_SIZE - OFFSET_SIZE * (self.entry_count - row) as u64
    }
}
