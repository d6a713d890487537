//! # LSM-Tree Storage Engine
//!
//! An embeddable key-value storage engine using the Log-Structured
//! Merge-Tree design.
//!
//! ## Core idea
//! Instead of updating data in place (B-Tree), buffer writes in memory,
//! flush them as immutable sorted files, and merge those files on read.
//! This turns random writes into sequential writes.
//!
//! ## Layout on disk
//! One directory, one `<generation>.dat` file per sorted run. Higher
//! generations are newer. Nothing else is persisted (no manifest file, no
//! WAL): opening the engine scans the directory, and writes still in the
//! memtable are lost if the process dies before a flush.
//!
//! ```no_run
//! use lsm_engine::{DB, Options};
//!
//! # fn main() -> lsm_engine::Result<()> {
//! let db = DB::open("/tmp/lsm", Options::default().flush_threshold(1024))?;
//! db.put(b"a", b"1")?;
//! db.put(b"b", b"2")?;
//! db.delete(b"a")?;
//!
//! for record in db.range(b"")? {
//!     let (key, value) = record?;
//!     println!("{key:?} => {value:?}");
//! }
//! db.close()
//! # }
//! ```

pub mod compaction;
pub mod db;
pub mod error;
pub mod iterator;
pub mod manifest;
pub mod memtable;
pub mod sstable;
pub mod table;
pub mod types;

// Public re-exports for the top-level API
pub use db::{DB, Options, Stats};
pub use error::{Error, Result};
pub use iterator::RangeIter;
