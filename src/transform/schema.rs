// src/transform/schema.rs
//! Column selection and canonical renaming for the two dataset kinds.

use arrow::{error::ArrowError, record_batch::RecordBatch};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::table;

pub const YEAR: &str = "year";
pub const TOTAL_POPULATION: &str = "total_population";

/// Which raw columns survive normalization.
///
/// `pinned` columns are kept first, in the given order, when present. Every
/// other column is kept when its name contains one of `substrings`
/// (case-sensitive).
#[derive(Debug, Clone)]
pub struct ColumnSelector {
    pub pinned: Vec<&'static str>,
    pub substrings: Vec<&'static str>,
}

impl ColumnSelector {
    /// `year` + every white/black column.
    pub fn wages() -> Self {
        Self {
            pinned: vec![YEAR],
            substrings: vec!["white", "black"],
        }
    }

    /// `year`, `total_population` + every white/black column.
    pub fn employment() -> Self {
        Self {
            pinned: vec![YEAR, TOTAL_POPULATION],
            substrings: vec!["white", "black"],
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pinned.contains(&name) || self.substrings.iter().any(|s| name.contains(s))
    }

    /// Indices of the selected columns: pinned first, then matches in table order.
    pub fn select(&self, names: &[String]) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .pinned
            .iter()
            .filter_map(|p| names.iter().position(|n| n == *p))
            .collect();
        out.extend(
            names
                .iter()
                .enumerate()
                .filter(|(_, n)| !self.pinned.contains(&n.as_str()))
                .filter(|(_, n)| self.substrings.iter().any(|s| n.contains(s)))
                .map(|(i, _)| i),
        );
        out
    }
}

/// Ordered `(raw name, canonical name)` pairs.
pub type RenameMap = &'static [(&'static str, &'static str)];

pub const WAGES_RENAMES: RenameMap = &[
    ("white_less_than_hs", "White_Less_HS_Hourly_Wage"),
    ("white_high_school", "White_HS_Hourly_Wage"),
    ("white_some_college", "White_Some_College_Hourly_Wage"),
    ("white_bachelors_degree", "White_Bachelors_Hourly_Wage"),
    ("white_advanced_degree", "White_Advanced_Hourly_Wage"),
    ("white_men_less_than_hs", "White_Men_Less_HS_Hourly_Wage"),
    ("white_men_high_school", "White_Men_HS_Hourly_Wage"),
    ("white_men_some_college", "White_Men_Some_College_Hourly_Wage"),
    ("white_men_bachelors_degree", "White_Men_Bachelors_Hourly_Wage"),
    ("white_men_advanced_degree", "White_Men_Advanced_Hourly_Wage"),
    ("white_women_less_than_hs", "White_Women_Less_HS_Hourly_Wage"),
    ("white_women_high_school", "White_Women_HS_Hourly_Wage"),
    ("white_women_some_college", "White_Women_Some_College_Hourly_Wage"),
    ("white_women_bachelors_degree", "White_Women_Bachelors_Hourly_Wage"),
    ("white_women_advanced_degree", "White_Women_Advanced_Hourly_Wage"),
    ("black_less_than_hs", "Black_Less_HS_Hourly_Wage"),
    ("black_high_school", "Black_HS_Hourly_Wage"),
    ("black_some_college", "Black_Some_College_Hourly_Wage"),
    ("black_bachelors_degree", "Black_Bachelors_Hourly_Wage"),
    ("black_advanced_degree", "Black_Advanced_Hourly_Wage"),
    ("black_men_less_than_hs", "Black_Men_Less_HS_Hourly_Wage"),
    ("black_men_high_school", "Black_Men_HS_Hourly_Wage"),
    ("black_men_some_college", "Black_Men_Some_College_Hourly_Wage"),
    ("black_men_bachelors_degree", "Black_Men_Bachelors_Hourly_Wage"),
    ("black_men_advanced_degree", "Black_Men_Advanced_Hourly_Wage"),
    ("black_women_less_than_hs", "Black_Women_Less_HS_Hourly_Wage"),
    ("black_women_high_school", "Black_Women_HS_Hourly_Wage"),
    ("black_women_some_college", "Black_Women_Some_College_Hourly_Wage"),
    ("black_women_bachelors_degree", "Black_Women_Bachelors_Degree_Hourly_Wage"),
    ("black_women_advanced_degree", "Black_Women_Advanced_Degree_Hourly_Wage"),
];

pub const EMPLOYMENT_RENAMES: RenameMap = &[
    ("black", "Black_Employment_Ratio_All_Ages"),
    ("black_16-24", "Black_Employment_Ratio_Age_16_24"),
    ("black_25-54", "Black_Employment_Ratio_Age_25_54"),
    ("black_55-64", "Black_Employment_Ratio_Age_55_64"),
    ("black_65+", "Black_Employment_Ratio_Age_65_Plus"),
    ("black_less_than_hs", "Black_Employment_Ratio_Less_Than_High_School"),
    ("black_high_school", "Black_Employment_Ratio_High_School"),
    ("black_some_college", "Black_Employment_Ratio_Some_College"),
    ("black_bachelors_degree", "Black_Employment_Ratio_Bachelors_Degree"),
    ("black_advanced_degree", "Black_Employment_Ratio_Advanced_Degree"),
    ("black_women", "Black_Women_Employment_Ratio_All_Ages"),
    ("black_women_16-24", "Black_Women_Employment_Ratio_Age_16_24"),
    ("black_women_25-54", "Black_Women_Employment_Ratio_Age_25_54"),
    ("black_women_55-64", "Black_Women_Employment_Ratio_Age_55_64"),
    ("black_women_65+", "Black_Women_Employment_Ratio_Age_65_Plus"),
    ("black_women_less_than_hs", "Black_Women_Employment_Ratio_Less_Than_High_School"),
    ("black_women_high_school", "Black_Women_Employment_Ratio_High_School"),
    ("black_women_some_college", "Black_Women_Employment_Ratio_Some_College"),
    ("black_women_bachelors_degree", "Black_Women_Employment_Ratio_Bachelors_Degree"),
    ("black_women_advanced_degree", "Black_Women_Employment_Ratio_Advanced_Degree"),
    ("black_men", "Black_Men_Employment_Ratio_All_Ages"),
    ("black_men_16-24", "Black_Men_Employment_Ratio_Age_16_24"),
    ("black_men_25-54", "Black_Men_Employment_Ratio_Age_25_54"),
    ("black_men_55-64", "Black_Men_Employment_Ratio_Age_55_64"),
    ("black_men_65+", "Black_Men_Employment_Ratio_Age_65_Plus"),
    ("black_men_less_than_hs", "Black_Men_Employment_Ratio_Less_Than_High_School"),
    ("black_men_high_school", "Black_Men_Employment_Ratio_High_School"),
    ("black_men_some_college", "Black_Men_Employment_Ratio_Some_College"),
    ("black_men_bachelors_degree", "Black_Men_Employment_Ratio_Bachelors_Degree"),
    ("black_men_advanced_degree", "Black_Men_Employment_Ratio_Advanced_Degree"),
    ("white", "White_Employment_Ratio_All_Ages"),
    ("white_16-24", "White_Employment_Ratio_Age_16_24"),
    ("white_25-54", "White_Employment_Ratio_Age_25_54"),
    ("white_55-64", "White_Employment_Ratio_Age_55_64"),
    ("white_65+", "White_Employment_Ratio_Age_65_Plus"),
    ("white_less_than_hs", "White_Employment_Ratio_Less_Than_High_School"),
    ("white_high_school", "White_Employment_Ratio_High_School"),
    ("white_some_college", "White_Employment_Ratio_Some_College"),
    ("white_bachelors_degree", "White_Employment_Ratio_Bachelors_Degree"),
    ("white_advanced_degree", "White_Employment_Ratio_Advanced_Degree"),
    ("white_women", "White_Women_Employment_Ratio_All_Ages"),
    ("white_women_16-24", "White_Women_Employment_Ratio_Age_16_24"),
    ("white_women_25-54", "White_Women_Employment_Ratio_Age_25_54"),
    ("white_women_55-64", "White_Women_Employment_Ratio_Age_55_64"),
    ("white_women_65+", "White_Women_Employment_Ratio_Age_65_Plus"),
    ("white_women_less_than_hs", "White_Women_Employment_Ratio_Less_Than_High_School"),
    ("white_women_high_school", "White_Women_Employment_Ratio_High_School"),
    ("white_women_some_college", "White_Women_Employment_Ratio_Some_College"),
    ("white_women_bachelors_degree", "White_Women_Employment_Ratio_Bachelors_Degree"),
    ("white_women_advanced_degree", "White_Women_Employment_Ratio_Advanced_Degree"),
    ("white_men", "White_Men_Employment_Ratio_All_Ages"),
    ("white_men_16-24", "White_Men_Employment_Ratio_Age_16_24"),
    ("white_men_25-54", "White_Men_Employment_Ratio_Age_25_54"),
    ("white_men_55-64", "White_Men_Employment_Ratio_Age_55_64"),
    ("white_men_65+", "White_Men_Employment_Ratio_Age_65_Plus"),
    ("white_men_less_than_hs", "White_Men_Employment_Ratio_Less_Than_High_School"),
    ("white_men_high_school", "White_Men_Employment_Ratio_High_School"),
    ("white_men_some_college", "White_Men_Employment_Ratio_Some_College"),
    ("white_men_bachelors_degree", "White_Men_Employment_Ratio_Bachelors_Degree"),
    ("white_men_advanced_degree", "White_Men_Employment_Ratio_Advanced_Degree"),
];

/// Keep only the columns `selector` accepts.
pub fn select_columns(batch: &RecordBatch, selector: &ColumnSelector) -> Result<RecordBatch, ArrowError> {
    let names = table::column_names(batch);
    let keep = selector.select(&names);
    debug!(kept = keep.len(), dropped = names.len() - keep.len(), "selected columns");
    table::select_columns(batch, &keep)
}

/// Apply every pair whose raw name exists in `batch`. Returns the renamed
/// batch and the raw names that were absent; absence is not an error.
pub fn rename_columns(
    batch: &RecordBatch,
    renames: RenameMap,
) -> Result<(RecordBatch, Vec<String>), ArrowError> {
    let names = table::column_names(batch);
    let lookup: HashMap<&str, &str> = renames.iter().copied().collect();
    let skipped: Vec<String> = renames
        .iter()
        .filter(|(old, _)| !names.iter().any(|n| n == *old))
        .map(|(old, _)| old.to_string())
        .collect();

    let renamed = table::rename_fields(batch, |name| lookup.get(name).map(|s| s.to_string()))?;
    Ok((renamed, skipped))
}

/// Rename, reporting the absent keys with one warning.
pub fn apply_renames(batch: &RecordBatch, renames: RenameMap) -> Result<RecordBatch, ArrowError> {
    let (renamed, skipped) = rename_columns(batch, renames)?;
    if !skipped.is_empty() {
        warn!(
            count = skipped.len(),
            columns = ?skipped,
            "rename keys not present in source, skipped"
        );
    }
    Ok(renamed)
}

/// Select, then rename.
pub fn normalize(
    batch: &RecordBatch,
    selector: &ColumnSelector,
    renames: RenameMap,
) -> Result<RecordBatch, ArrowError> {
    let selected = select_columns(batch, selector)?;
    apply_renames(&selected, renames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::sync::Arc;

    fn raw(names: &[&str]) -> RecordBatch {
        RecordBatch::try_from_iter(names.iter().map(|n| {
            let col: ArrayRef = if *n == YEAR {
                Arc::new(Int64Array::from(vec![1990]))
            } else {
                Arc::new(Float64Array::from(vec![1.0]))
            };
            (n.to_string(), col)
        }))
        .unwrap()
    }

    #[test]
    fn selector_is_case_sensitive() {
        let s = ColumnSelector::wages();
        assert!(s.matches("year"));
        assert!(s.matches("white_men_high_school"));
        assert!(s.matches("black"));
        assert!(!s.matches("White_Total"));
        assert!(!s.matches("hispanic_high_school"));
        assert!(!s.matches("total_population"));
        assert!(ColumnSelector::employment().matches("total_population"));
    }

    #[test]
    fn pinned_columns_come_first() {
        let batch = raw(&["black_65+", "men", "total_population", "year", "white"]);
        let out = select_columns(&batch, &ColumnSelector::employment()).unwrap();
        assert_eq!(
            table::column_names(&out),
            vec!["year", "total_population", "black_65+", "white"]
        );
    }

    #[test]
    fn rename_tolerates_missing_keys() {
        let batch = raw(&["year", "white_high_school", "black_high_school", "other"]);
        let (out, skipped) = rename_columns(&batch, WAGES_RENAMES).unwrap();
        assert_eq!(
            table::column_names(&out),
            vec!["year", "White_HS_Hourly_Wage", "Black_HS_Hourly_Wage", "other"]
        );
        assert_eq!(skipped.len(), WAGES_RENAMES.len() - 2);
        assert!(skipped.contains(&"white_less_than_hs".to_string()));
    }

    #[test]
    fn normalize_employment() {
        let batch = raw(&["year", "total_population", "hispanic", "white_65+", "black_women"]);
        let out = normalize(&batch, &ColumnSelector::employment(), EMPLOYMENT_RENAMES).unwrap();
        assert_eq!(
            table::column_names(&out),
            vec![
                "year",
                "total_population",
                "White_Employment_Ratio_Age_65_Plus",
                "Black_Women_Employment_Ratio_All_Ages"
            ]
        );
    }

    #[test]
    fn maps_cover_their_sources() {
        assert_eq!(WAGES_RENAMES.len(), 30);
        assert_eq!(EMPLOYMENT_RENAMES.len(), 60);
        let s = ColumnSelector::employment();
        assert!(EMPLOYMENT_RENAMES.iter().all(|(raw, _)| s.matches(raw)));
    }
}
