// src/transform/employment.rs

use arrow::record_batch::RecordBatch;
use tracing::{info, instrument};

use super::{
    impute::{impute_all_excluding, ImputeStrategy},
    require_rows,
    schema::{normalize, ColumnSelector, EMPLOYMENT_RENAMES, TOTAL_POPULATION, YEAR},
};
use crate::{
    error::{PipelineError, Result},
    table,
};

const STAGE: &str = "employment";

/// Raw employment-ratio table → canonical employment table.
#[instrument(level = "info", skip_all)]
pub fn transform_employment(
    raw: Option<&RecordBatch>,
    strategy: Option<ImputeStrategy>,
) -> Result<RecordBatch> {
    let raw = require_rows(raw, STAGE)?;

    let renamed = normalize(raw, &ColumnSelector::employment(), EMPLOYMENT_RENAMES)?;
    if table::column_index(&renamed, YEAR).is_none() {
        return Err(PipelineError::MissingColumn {
            stage: STAGE,
            column: YEAR,
        });
    }
    if table::column_index(&renamed, TOTAL_POPULATION).is_none() {
        return Err(PipelineError::MissingColumn {
            stage: STAGE,
            column: TOTAL_POPULATION,
        });
    }

    let deduped = table::drop_duplicate_rows(&renamed)?;
    let out = match strategy {
        Some(s) => impute_all_excluding(&deduped, &[YEAR, TOTAL_POPULATION], s)?,
        None => deduped,
    };

    info!(
        rows_in = raw.num_rows(),
        rows = out.num_rows(),
        columns = out.num_columns(),
        "employment transformed"
    );
    Ok(out)
}
