// src/transform/mod.rs
//! Per-dataset reshaping, then the merge into one final table.

use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

pub mod employment;
pub mod impute;
pub mod merge;
pub mod schema;
pub mod wages;

pub use employment::transform_employment;
pub use impute::{impute, impute_all_excluding, ImputeStrategy};
pub use merge::{finalize, merge};
pub use schema::{normalize, ColumnSelector, RenameMap, TOTAL_POPULATION, YEAR};
pub use wages::transform_wages;

/// A stage can only work on a table that exists and has rows.
pub fn require_rows<'a>(
    batch: Option<&'a RecordBatch>,
    stage: &'static str,
) -> Result<&'a RecordBatch> {
    match batch {
        Some(b) if b.num_rows() > 0 => Ok(b),
        _ => Err(PipelineError::EmptyInput { stage }),
    }
}
