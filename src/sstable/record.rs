use crate::error::{Error, Result};
use crate::types::{Cell, TIMESTAMP_SIZE};

/// Size of the key/value length prefixes.
pub const LEN_SIZE: usize = 4;

/// Encodes one cell as a data-region record.
///
/// ```text
/// ┌─────────────────┬───────────┬────────────────┬───────────────────┬─────────────┐
/// │ key_len (i32 BE)│ key bytes │ timestamp (i64)│ value_len (i32 BE)│ value bytes │
/// └─────────────────┴───────────┴────────────────┴───────────────────┴─────────────┘
/// ```
///
/// A tombstone stores its timestamp negated and has no value_len/value.
pub fn encode(cell: &Cell, buf: &mut Vec<u8>) -> Result<()> {
    let key = cell.key();
    buf.extend_from_slice(&encode_len(key.len(), "key")?);
    buf.extend_from_slice(key);

    let value = cell.value();
    buf.extend_from_slice(&encode_timestamp(value.timestamp(), value.is_tombstone()).to_be_bytes());

    if let Some(data) = value.data() {
        buf.extend_from_slice(&encode_len(data.len(), "value")?);
        buf.extend_from_slice(data);
    }
    Ok(())
}

/// Number of bytes `encode` produces for `cell`.
pub fn encoded_len(cell: &Cell) -> usize {
    LEN_SIZE
        + cell.key().len()
        + TIMESTAMP_SIZE
        + cell.value().data().map_or(0, |d| LEN_SIZE + d.len())
}

/// Timestamp as stored on disk: negative marks a tombstone.
pub fn encode_timestamp(timestamp: u64, tombstone: bool) -> i64 {
    let ts = timestamp as i64;
    if tombstone { -ts } else { ts }
}

/// Inverse of `encode_timestamp`: (timestamp, is_tombstone).
pub fn decode_timestamp(stored: i64) -> Result<(u64, bool)> {
    match stored {
        0 | i64::MIN => Err(Error::Corruption(format!("invalid timestamp {stored}"))),
        ts if ts < 0 => Ok((ts.unsigned_abs(), true)),
        ts => Ok((ts as u64, false)),
    }
}

/// Reject a key or value too long for its i32 length prefix.
pub fn check_len(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| Error::InvalidArgument(format!("{what} of {len} bytes is too large")))
}

fn encode_len(len: usize, what: &str) -> Result<[u8; LEN_SIZE]> {
    Ok(check_len(len, what)?.to_be_bytes())
}
