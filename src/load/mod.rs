// src/load/mod.rs
//! Persisting the final table.

use arrow::record_batch::RecordBatch;

pub mod snapshot;
pub mod sqlite;

pub use snapshot::{stage_snapshot, write_snapshot, StagedSnapshot};
pub use sqlite::SqliteSink;

/// Name of the published table.
pub const TABLE_NAME: &str = "wages_and_employment_ratio_by_education";

/// A destination that can hold named tables.
pub trait Sink {
    /// Replace `name` entirely with `batch`. Either the whole table is
    /// written or the previous contents stay.
    fn replace_table(&mut self, name: &str, batch: &RecordBatch) -> anyhow::Result<()>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn replace_table(&mut self, name: &str, batch: &RecordBatch) -> anyhow::Result<()> {
        (**self).replace_table(name, batch)
    }
}
