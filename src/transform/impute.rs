// src/transform/impute.rs
//! Fill missing cells from each column's own observed values.
//!
//! Numeric columns with gaps are widened to `Float64` before filling. A column
//! with no observed values at all is filled with `0.0` (numeric) or `""`
//! (text) so no undefined value reaches the final table.

use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    datatypes::DataType,
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::{debug, warn};

use crate::table::{self, utils::mean_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImputeStrategy {
    #[default]
    Mean,
    Median,
    /// Most frequent value; ties go to the lowest value.
    Mode,
}

impl ImputeStrategy {
    /// Parse a strategy name coming from outside the program (config).
    /// Unknown names are reported and yield `None`; callers then leave the
    /// table as it is.
    pub fn from_setting(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mean" => Some(Self::Mean),
            "median" => Some(Self::Median),
            "mode" => Some(Self::Mode),
            other => {
                warn!(strategy = other, "Unknown imputation strategy, leaving data unchanged");
                None
            }
        }
    }

    fn numeric_fill(self, mut present: Vec<f64>) -> Option<f64> {
        match self {
            Self::Mean => mean_of(present),
            Self::Median => {
                if present.is_empty() {
                    return None;
                }
                present.sort_by(f64::total_cmp);
                let mid = present.len() / 2;
                Some(if present.len() % 2 == 0 {
                    (present[mid - 1] + present[mid]) / 2.0
                } else {
                    present[mid]
                })
            }
            Self::Mode => {
                present.sort_by(f64::total_cmp);
                let mut best: Option<(f64, usize)> = None;
                let mut i = 0;
                while i < present.len() {
                    let v = present[i];
                    let run = present[i..].iter().take_while(|x| **x == v).count().max(1);
                    if best.map_or(true, |(_, n)| run > n) {
                        best = Some((v, run));
                    }
                    i += run;
                }
                best.map(|(v, _)| v)
            }
        }
    }
}

impl fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
        })
    }
}

/// Impute the listed columns; names not in the table are ignored.
pub fn impute(
    batch: &RecordBatch,
    targets: &[&str],
    strategy: ImputeStrategy,
) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let indices: Vec<usize> = targets
        .iter()
        .filter_map(|name| schema.index_of(name).ok())
        .collect();
    impute_indices(batch, &indices, strategy)
}

/// Impute every column except the listed ones.
pub fn impute_all_excluding(
    batch: &RecordBatch,
    excluded: &[&str],
    strategy: ImputeStrategy,
) -> Result<RecordBatch, ArrowError> {
    let indices: Vec<usize> = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !excluded.contains(&f.name().as_str()))
        .map(|(i, _)| i)
        .collect();
    impute_indices(batch, &indices, strategy)
}

fn impute_indices(
    batch: &RecordBatch,
    indices: &[usize],
    strategy: ImputeStrategy,
) -> Result<RecordBatch, ArrowError> {
    let mut out = batch.clone();
    let mut filled = 0usize;
    for &idx in indices {
        let name = batch.schema().field(idx).name().clone();
        if let Some(array) = impute_column(&name, batch.column(idx), strategy)? {
            out = table::replace_column(&out, idx, array)?;
            filled += 1;
        }
    }
    debug!(%strategy, columns = filled, "imputed missing values");
    Ok(out)
}

/// `None` when the column needs no change.
fn impute_column(
    name: &str,
    array: &ArrayRef,
    strategy: ImputeStrategy,
) -> Result<Option<ArrayRef>, ArrowError> {
    if array.logical_null_count() == 0 {
        return Ok(None);
    }

    match array.data_type() {
        DataType::Null => {
            warn!(column = name, "no observed values, filling with 0");
            let filled = Float64Array::from(vec![0.0; array.len()]);
            Ok(Some(Arc::new(filled)))
        }
        dt if table::is_numeric(dt) => {
            let values = table::to_f64(array)?;
            let present: Vec<f64> = values.iter().flatten().collect();
            let fill = strategy.numeric_fill(present).unwrap_or_else(|| {
                warn!(column = name, "no observed values, filling with 0");
                0.0
            });
            let filled: Float64Array = values.iter().map(|v| Some(v.unwrap_or(fill))).collect();
            Ok(Some(Arc::new(filled)))
        }
        DataType::Utf8 => {
            if strategy != ImputeStrategy::Mode {
                warn!(column = name, %strategy, "strategy needs numbers, text column left as is");
                return Ok(None);
            }
            let Some(strings) = array.as_any().downcast_ref::<StringArray>() else {
                return Ok(None);
            };
            let fill = string_mode(strings).unwrap_or_else(|| {
                warn!(column = name, "no observed values, filling with empty string");
                String::new()
            });
            let filled: StringArray = strings
                .iter()
                .map(|v| Some(v.unwrap_or(fill.as_str())))
                .collect();
            Ok(Some(Arc::new(filled)))
        }
        other => {
            warn!(column = name, data_type = %other, "cannot impute this column type");
            Ok(None)
        }
    }
}

fn string_mode(strings: &StringArray) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in strings.iter().flatten() {
        *counts.entry(s).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (s, n) in counts {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((s, n));
        }
    }
    best.map(|(s, _)| s.to_string())
}
