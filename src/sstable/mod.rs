//! Sorted runs: immutable, binary-searchable files of cells in key order.
//!
//! Each run is one `<generation>.dat` file: a data region of back-to-back
//! records followed by a footer of row offsets and the row count. See
//! [`record`] and [`footer`] for the exact layout.

pub mod builder;
pub mod footer;
pub mod reader;
pub mod record;

pub use builder::{serialize, BuildSummary, SSTableBuilder};
pub use reader::{SSTable, SSTableIterator};
