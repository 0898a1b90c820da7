// src/transform/merge.rs

use arrow::{
    array::{Array, ArrayRef, Int16Array},
    compute::{cast, cast_with_options, CastOptions},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
    row::{Row, RowConverter, SortField},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument, warn};

use super::schema::{TOTAL_POPULATION, YEAR};
use crate::{
    error::{PipelineError, Result},
    table,
};

/// Inner natural join: rows pair up when every column name the two tables
/// share holds equal, non-null values. Output is the left columns followed by
/// the right table's other columns, in left-then-right row order.
#[instrument(level = "info", skip_all)]
pub fn merge(left: &RecordBatch, right: &RecordBatch) -> Result<RecordBatch> {
    if left.num_rows() == 0 || right.num_rows() == 0 {
        return Err(PipelineError::EmptyInput { stage: "merge" });
    }
    if table::column_index(left, YEAR).is_none() {
        return Err(PipelineError::MissingJoinKey { side: "left" });
    }
    if table::column_index(right, YEAR).is_none() {
        return Err(PipelineError::MissingJoinKey { side: "right" });
    }

    let left_names = table::column_names(left);
    let right_names = table::column_names(right);
    let keys: Vec<&String> = left_names
        .iter()
        .filter(|n| right_names.contains(n))
        .collect();
    if keys.len() > 1 {
        warn!(keys = ?keys, "tables share columns besides `year`; joining on all of them");
    }

    let mut left_keys: Vec<ArrayRef> = Vec::with_capacity(keys.len());
    let mut right_keys: Vec<ArrayRef> = Vec::with_capacity(keys.len());
    for key in &keys {
        let (Some(l), Some(r)) = (left.column_by_name(key), right.column_by_name(key)) else {
            continue;
        };
        let common = key_type(l.data_type(), r.data_type());
        left_keys.push(cast(l, &common)?);
        right_keys.push(cast(r, &common)?);
    }

    let converter = RowConverter::new(
        left_keys
            .iter()
            .map(|a| SortField::new(a.data_type().clone()))
            .collect(),
    )?;
    let left_rows = converter.convert_columns(&left_keys)?;
    let right_rows = converter.convert_columns(&right_keys)?;

    let has_null = |cols: &[ArrayRef], i: usize| cols.iter().any(|c| c.is_null(i));

    let mut by_key: HashMap<Row<'_>, Vec<u32>> = HashMap::new();
    for i in 0..right.num_rows() {
        if !has_null(&right_keys[..], i) {
            by_key.entry(right_rows.row(i)).or_default().push(i as u32);
        }
    }

    let mut left_idx = Vec::new();
    let mut right_idx = Vec::new();
    for i in 0..left.num_rows() {
        if has_null(&left_keys[..], i) {
            continue;
        }
        if let Some(matches) = by_key.get(&left_rows.row(i)) {
            for &j in matches {
                left_idx.push(i as u32);
                right_idx.push(j);
            }
        }
    }
    if left_idx.is_empty() {
        return Err(PipelineError::EmptyMerge);
    }

    let right_extra: Vec<usize> = right_names
        .iter()
        .enumerate()
        .filter(|(_, n)| !keys.contains(n))
        .map(|(i, _)| i)
        .collect();
    let left_part = table::take_rows(left, &left_idx)?;
    let right_part = table::take_rows(&table::select_columns(right, &right_extra)?, &right_idx)?;

    let fields: Vec<Field> = left_part
        .schema()
        .fields()
        .iter()
        .chain(right_part.schema().fields().iter())
        .map(|f| Field::clone(f))
        .collect();
    let columns: Vec<ArrayRef> = left_part
        .columns()
        .iter()
        .chain(right_part.columns().iter())
        .cloned()
        .collect();
    let merged = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;

    info!(
        rows = merged.num_rows(),
        columns = merged.num_columns(),
        "tables merged"
    );
    Ok(merged)
}

/// Type both sides of a key are compared in. Mixed numeric keys meet in
/// `Float64` so a fractional value can never truncate into a match.
fn key_type(left: &DataType, right: &DataType) -> DataType {
    if left != right && table::is_numeric(left) && table::is_numeric(right) {
        DataType::Float64
    } else {
        left.clone()
    }
}

/// `year` → Int16, `total_population` (if any) to position 1, rows by
/// `year` descending. The sort is stable and puts null years last.
#[instrument(level = "info", skip_all)]
pub fn finalize(merged: &RecordBatch) -> Result<RecordBatch> {
    let Some(idx) = table::column_index(merged, YEAR) else {
        return Err(PipelineError::MissingColumn {
            stage: "finalize",
            column: YEAR,
        });
    };
    let year = cast_with_options(
        merged.column(idx),
        &DataType::Int16,
        &CastOptions {
            safe: false,
            ..Default::default()
        },
    )?;
    let typed = table::replace_column(merged, idx, year)?;
    let reordered = table::move_column(&typed, TOTAL_POPULATION, 1)?;

    let year_idx = table::column_index(&reordered, YEAR).unwrap_or(0);
    let years = reordered
        .column(year_idx)
        .as_any()
        .downcast_ref::<Int16Array>()
        .ok_or(PipelineError::MissingColumn {
            stage: "finalize",
            column: YEAR,
        })?;
    let key = |i: u32| years.is_valid(i as usize).then(|| years.value(i as usize));
    let mut order: Vec<u32> = (0..reordered.num_rows() as u32).collect();
    order.sort_by(|&a, &b| key(b).cmp(&key(a)));

    Ok(table::take_rows(&reordered, &order)?)
}
