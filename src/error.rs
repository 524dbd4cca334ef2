//! Typed failures raised by the analysis pipeline
//!
//! Functions return the crate-wide `anyhow` based [`crate::Result`]; the variants below are what
//! callers can recover with `downcast_ref::<AnalysisError>()` when they need to tell failures apart.

use std::path::PathBuf;
use thiserror::Error;

/// Conditions under which the pipeline refuses to continue
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The survey file could not be opened or parsed as CSV
    #[error("Cannot read survey file {}: {reason}", path.display())]
    Unreadable {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O or parse message
        reason: String,
    },

    /// One or more K10 item columns are absent after name normalization
    #[error("Survey file is missing expected columns: {}", missing.join(", "))]
    MissingColumns {
        /// Normalized identifiers that were not found
        missing: Vec<String>,
    },

    /// No complete responses survived cleaning
    #[error("No complete responses found in {} after dropping rows with missing items", path.display())]
    EmptyData {
        /// Source path
        path: PathBuf,
    },

    /// A score falls outside the 1-5 ordinal range or is not a whole number
    #[error("Invalid score {value} in column {column} at cleaned row {row} (expected a whole number 1-5)")]
    InvalidScore {
        /// Item identifier
        column: String,
        /// Zero-based row index in the cleaned matrix
        row: usize,
        /// The value that was read
        value: f64,
    },

    /// Fewer distinct responses than requested clusters
    #[error("Insufficient distinct points for {k} clusters: only {distinct} distinct responses")]
    InsufficientDistinctPoints {
        /// Requested cluster count
        k: usize,
        /// Number of distinct response vectors
        distinct: usize,
    },

    /// A cluster count of zero
    #[error("Number of clusters must be at least 1, got {k}")]
    InvalidClusterCount {
        /// Requested cluster count
        k: usize,
    },

    /// The selected k was not among the fitted candidates
    #[error("No fitted model for k = {k}")]
    UnknownCandidate {
        /// Requested cluster count
        k: usize,
    },
}
