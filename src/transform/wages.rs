// src/transform/wages.rs

use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    impute::{impute_all_excluding, ImputeStrategy},
    require_rows,
    schema::{apply_renames, select_columns, ColumnSelector, WAGES_RENAMES, YEAR},
};
use crate::{
    error::{PipelineError, Result},
    table::{
        self,
        utils::{mean_of, round_to},
    },
};

const STAGE: &str = "wages";

/// Survey years with known data-quality problems.
pub const EXCLUDED_YEARS: [i64; 6] = [1973, 1974, 1975, 1976, 1977, 1978];

pub const WHITE_AVERAGE: &str = "White_People_Average_Hourly_Wage";
pub const BLACK_AVERAGE: &str = "Black_People_Average_Hourly_Wage";

/// The five education levels averaged into each group's derived column.
pub const WHITE_EDUCATION_WAGES: [&str; 5] = [
    "White_Less_HS_Hourly_Wage",
    "White_HS_Hourly_Wage",
    "White_Some_College_Hourly_Wage",
    "White_Bachelors_Hourly_Wage",
    "White_Advanced_Hourly_Wage",
];

pub const BLACK_EDUCATION_WAGES: [&str; 5] = [
    "Black_Less_HS_Hourly_Wage",
    "Black_HS_Hourly_Wage",
    "Black_Some_College_Hourly_Wage",
    "Black_Bachelors_Hourly_Wage",
    "Black_Advanced_Hourly_Wage",
];

/// Raw wages table → canonical wages table.
///
/// `strategy: None` skips imputation (unknown strategy at the config boundary).
#[instrument(level = "info", skip_all)]
pub fn transform_wages(raw: Option<&RecordBatch>, strategy: Option<ImputeStrategy>) -> Result<RecordBatch> {
    let raw = require_rows(raw, STAGE)?;

    let selected = select_columns(raw, &ColumnSelector::wages())?;
    let filtered = drop_excluded_years(&selected)?;
    let renamed = apply_renames(&filtered, WAGES_RENAMES)?;
    let deduped = table::drop_duplicate_rows(&renamed)?;

    let imputed = match strategy {
        Some(s) => impute_all_excluding(&deduped, &[YEAR], s)?,
        None => deduped,
    };

    let with_white = add_group_average(&imputed, WHITE_AVERAGE, &WHITE_EDUCATION_WAGES)?;
    let out = add_group_average(&with_white, BLACK_AVERAGE, &BLACK_EDUCATION_WAGES)?;

    info!(
        rows_in = raw.num_rows(),
        rows = out.num_rows(),
        columns = out.num_columns(),
        "wages transformed"
    );
    Ok(out)
}

fn drop_excluded_years(batch: &RecordBatch) -> Result<RecordBatch> {
    let Some(year) = batch.column_by_name(YEAR) else {
        return Err(PipelineError::MissingColumn {
            stage: STAGE,
            column: YEAR,
        });
    };
    let year = cast(year, &DataType::Int64)?;
    let Some(year) = year.as_any().downcast_ref::<Int64Array>() else {
        return Err(PipelineError::MissingColumn {
            stage: STAGE,
            column: YEAR,
        });
    };
    let keep: BooleanArray = year
        .iter()
        .map(|y| Some(!y.is_some_and(|y| EXCLUDED_YEARS.contains(&y))))
        .collect();
    Ok(table::filter_rows(batch, &keep)?)
}

/// Append `name` = per-row mean of `sources`, rounded to 2 decimals.
/// Missing cells are skipped; a row with no values gets null.
fn add_group_average(batch: &RecordBatch, name: &str, sources: &[&str]) -> Result<RecordBatch> {
    let mut columns: Vec<Float64Array> = Vec::with_capacity(sources.len());
    let mut absent = Vec::new();
    for src in sources {
        match batch.column_by_name(src) {
            Some(col) => columns.push(table::to_f64(col)?),
            None => absent.push(*src),
        }
    }
    if !absent.is_empty() {
        warn!(column = name, missing = ?absent, "average computed without some inputs");
    }
    if columns.is_empty() {
        warn!(column = name, "no input columns, derived column not added");
        return Ok(batch.clone());
    }

    let averages: Float64Array = (0..batch.num_rows())
        .map(|row| {
            let present = columns
                .iter()
                .filter(|c| c.is_valid(row))
                .map(|c| c.value(row));
            mean_of(present).map(|m| round_to(m, 2))
        })
        .collect();
    Ok(table::append_column(batch, name, Arc::new(averages) as ArrayRef)?)
}
