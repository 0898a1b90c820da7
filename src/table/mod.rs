// src/table/mod.rs
//! Column-level helpers over Arrow `RecordBatch`es. Every function returns a
//! fresh batch; inputs are never mutated.

use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, UInt32Array},
    compute::{cast, filter_record_batch, take_record_batch},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
    row::{RowConverter, SortField},
};
use std::{collections::HashSet, sync::Arc};

pub mod utils;

type ArrowResult<T> = Result<T, ArrowError>;

/// Column names in table order.
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

pub fn column_index(batch: &RecordBatch, name: &str) -> Option<usize> {
    batch.schema().index_of(name).ok()
}

/// Keep only the columns at `indices`, in that order.
pub fn select_columns(batch: &RecordBatch, indices: &[usize]) -> ArrowResult<RecordBatch> {
    batch.project(indices)
}

/// Rebuild the schema with new names; `rename` returns `None` to keep a name.
pub fn rename_fields<F>(batch: &RecordBatch, mut rename: F) -> ArrowResult<RecordBatch>
where
    F: FnMut(&str) -> Option<String>,
{
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| match rename(f.name()) {
            Some(new_name) => Field::clone(f).with_name(new_name),
            None => Field::clone(f),
        })
        .collect();
    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    RecordBatch::try_new(Arc::new(schema), batch.columns().to_vec())
}

/// Swap the column at `idx` for `array`, adjusting the field's type to match.
pub fn replace_column(batch: &RecordBatch, idx: usize, array: ArrayRef) -> ArrowResult<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| Field::clone(f)).collect();
    fields[idx] = fields[idx]
        .clone()
        .with_data_type(array.data_type().clone())
        .with_nullable(array.null_count() > 0 || fields[idx].is_nullable());
    let mut columns = batch.columns().to_vec();
    columns[idx] = array;
    RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )
}

/// Add `array` as the last column.
pub fn append_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> ArrowResult<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| Field::clone(f)).collect();
    fields.push(Field::new(name, array.data_type().clone(), true));
    let mut columns = batch.columns().to_vec();
    columns.push(array);
    RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )
}

/// Move the column `name` to position `to`, leaving the others in order.
/// Returns the batch unchanged if the column is absent.
pub fn move_column(batch: &RecordBatch, name: &str, to: usize) -> ArrowResult<RecordBatch> {
    let Some(from) = column_index(batch, name) else {
        return Ok(batch.clone());
    };
    let mut order: Vec<usize> = (0..batch.num_columns()).filter(|&i| i != from).collect();
    order.insert(to.min(order.len()), from);
    batch.project(&order)
}

/// Keep rows where `mask` is true.
pub fn filter_rows(batch: &RecordBatch, mask: &BooleanArray) -> ArrowResult<RecordBatch> {
    filter_record_batch(batch, mask)
}

/// Gather rows by index.
pub fn take_rows(batch: &RecordBatch, indices: &[u32]) -> ArrowResult<RecordBatch> {
    take_record_batch(batch, &UInt32Array::from(indices.to_vec()))
}

/// Drop rows that equal an earlier row in every column. Nulls compare equal.
pub fn drop_duplicate_rows(batch: &RecordBatch) -> ArrowResult<RecordBatch> {
    if batch.num_rows() == 0 || batch.num_columns() == 0 {
        return Ok(batch.clone());
    }
    let converter = RowConverter::new(
        batch
            .schema()
            .fields()
            .iter()
            .map(|f| SortField::new(f.data_type().clone()))
            .collect(),
    )?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let keep: BooleanArray = rows.iter().map(|row| Some(seen.insert(row))).collect();
    if keep.true_count() == batch.num_rows() {
        return Ok(batch.clone());
    }
    filter_record_batch(batch, &keep)
}

/// Whether `dt` is an integer or floating point type.
pub fn is_numeric(dt: &DataType) -> bool {
    dt.is_integer() || dt.is_floating()
}

/// View any numeric column as `Float64Array`.
pub fn to_f64(array: &ArrayRef) -> ArrowResult<Float64Array> {
    let casted = cast(array, &DataType::Float64)?;
    casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| ArrowError::CastError("expected Float64 after cast".into()))
}
