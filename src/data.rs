//! Survey loading and cleaning using Polars

use crate::error::AnalysisError;
use crate::items::{ITEMS, MAX_SCORE, MIN_SCORE, N_ITEMS};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Tokens read as missing in addition to empty cells
const NULL_TOKENS: [&str; 1] = ["NA"];

/// Cleaned K10 responses: one row per participant, one column per item in scale order
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatrix {
    records: Array2<f64>,
    source_rows: usize,
}

impl ResponseMatrix {
    /// Build a matrix from already-clean scores (n_records, 10)
    ///
    /// Applies the same invariants as [`load_responses`]: exactly ten columns, at least one row
    /// and every score a whole number between 1 and 5.
    pub fn from_records(records: Array2<f64>) -> crate::Result<Self> {
        if records.ncols() != N_ITEMS {
            anyhow::bail!(
                "Response matrix must have exactly {} item columns, got {}",
                N_ITEMS,
                records.ncols()
            );
        }
        validate_scores(&records)?;
        let source_rows = records.nrows();
        Ok(Self {
            records,
            source_rows,
        })
    }

    /// Scores as an (n_records, 10) array
    pub fn records(&self) -> &Array2<f64> {
        &self.records
    }

    /// Number of complete responses
    pub fn len(&self) -> usize {
        self.records.nrows()
    }

    /// Always false for a loaded matrix; empty data is rejected at load time
    pub fn is_empty(&self) -> bool {
        self.records.nrows() == 0
    }

    /// Rows present in the source file before cleaning
    pub fn source_rows(&self) -> usize {
        self.source_rows
    }

    /// Rows discarded because at least one item was missing
    pub fn dropped_rows(&self) -> usize {
        self.source_rows - self.len()
    }

    /// Mean score of every item, in scale order
    pub fn item_means(&self) -> Array1<f64> {
        self.records
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(N_ITEMS))
    }

    /// Total K10 score (10-50) of every record
    pub fn total_scores(&self) -> Array1<f64> {
        self.records.sum_axis(Axis(1))
    }
}

/// Load the survey CSV, keep the ten K10 items and drop incomplete rows
///
/// # Arguments
/// * `path` - Delimited file with a header row; extra columns are ignored
///
/// # Returns
/// * `ResponseMatrix` with no missing values, rows in file order
pub fn load_responses(path: impl AsRef<Path>) -> crate::Result<ResponseMatrix> {
    let path = path.as_ref();
    let unreadable = |reason: String| AnalysisError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };

    // Every column is read as text so a stray token past the inference window cannot fail the
    // parse; the Float64 cast below turns it into a null instead
    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let mut df = CsvReader::new(file)
        .has_header(true)
        .infer_schema(Some(0))
        .with_null_values(Some(NullValues::AllColumns(
            NULL_TOKENS.iter().map(|token| token.to_string()).collect(),
        )))
        .finish()
        .map_err(|e| unreadable(e.to_string()))?;

    let source_rows = df.height();
    let raw_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let names = clean_names(&raw_names);
    debug!(?raw_names, ?names, "normalized column names");
    df.set_column_names(names.as_slice())?;

    let missing: Vec<String> = ITEMS
        .iter()
        .filter(|item| !names.iter().any(|name| name == item.id))
        .map(|item| item.id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingColumns { missing }.into());
    }

    // Non-numeric cells become null under the cast and are dropped with the rest
    let item_columns: Vec<Expr> = ITEMS
        .iter()
        .map(|item| col(item.id).cast(DataType::Float64))
        .collect();
    let cleaned = df.lazy().select(item_columns).drop_nulls(None).collect()?;

    if cleaned.height() == 0 {
        return Err(AnalysisError::EmptyData {
            path: path.to_path_buf(),
        }
        .into());
    }

    let records = cleaned.to_ndarray::<Float64Type>(IndexOrder::C)?;
    validate_scores(&records)?;

    info!(
        path = %path.display(),
        source_rows,
        kept = records.nrows(),
        dropped = source_rows - records.nrows(),
        "loaded survey responses"
    );

    Ok(ResponseMatrix {
        records,
        source_rows,
    })
}

/// Normalize one column name to snake case
///
/// Splits camelCase boundaries, lower-cases, collapses every run of other characters to a single
/// `_` and trims underscores at the ends. Names starting with a digit get an `x` prefix.
pub fn clean_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;

    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            let boundary = ch.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
        prev = Some(ch);
    }

    let trimmed = out.trim_end_matches('_');
    match trimmed.chars().next() {
        None => "x".to_string(),
        Some(first) if first.is_ascii_digit() => format!("x{}", trimmed),
        Some(_) => trimmed.to_string(),
    }
}

/// Normalize a header row, suffixing repeats with `_2`, `_3`, ... so names stay unique
pub fn clean_names(raw: &[String]) -> Vec<String> {
    let mut used = HashSet::with_capacity(raw.len());
    raw.iter()
        .map(|name| {
            let base = clean_name(name);
            let mut candidate = base.clone();
            let mut n = 1;
            while !used.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{}_{}", base, n);
            }
            candidate
        })
        .collect()
}

/// Every score must be a whole number on the 1-5 scale
fn validate_scores(records: &Array2<f64>) -> crate::Result<()> {
    if records.nrows() == 0 {
        anyhow::bail!("Response matrix has no rows");
    }

    for ((row, column), &value) in records.indexed_iter() {
        let in_range = value >= f64::from(MIN_SCORE) && value <= f64::from(MAX_SCORE);
        if !in_range || value.fract() != 0.0 {
            return Err(AnalysisError::InvalidScore {
                column: ITEMS[column].id.to_string(),
                row,
                value,
            }
            .into());
        }
    }

    Ok(())
}
