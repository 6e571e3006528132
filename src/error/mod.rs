//! Error handling for the case-crossover pipeline.
//!
//! Every fatal condition aborts the batch and names the entity that caused
//! it (case id, stratum, table row). Missing covariates are not errors; see
//! [`crate::algorithm::covariate::MissingCovariateReport`].

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use chrono::NaiveDate;
use parquet::errors::ParquetError;

use crate::algorithm::referent::ReferentClass;

/// Errors that can occur while building a case-crossover dataset
#[derive(Debug, thiserror::Error)]
pub enum CrossoverError {
    /// A case's referent window holds fewer candidate dates than controls requested
    #[error(
        "Insufficient control candidates for case {case_id} ({infection_date}, {class}): \
         {available} candidate dates available, {required} required"
    )]
    InsufficientCandidates {
        case_id: i64,
        infection_date: NaiveDate,
        class: ReferentClass,
        available: usize,
        required: usize,
    },

    /// The assembled set breaks the one-case-plus-N-controls stratum shape
    #[error(
        "Stratum {stratum_id} violates the crossover invariant: observed {observed} rows \
         with {case_rows} case rows, expected {expected} rows with exactly 1 case row"
    )]
    InvariantViolation {
        stratum_id: i64,
        observed: usize,
        case_rows: usize,
        expected: usize,
    },

    /// A row of an input table breaks the record invariants
    #[error("Malformed input in {table}: {message}")]
    MalformedInput { table: String, message: String },

    /// A required column is absent from an input table
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem error with the path that caused it
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error converting records to Arrow
    #[error("Arrow serialization error: {0}")]
    SerdeArrow(#[from] serde_arrow::Error),
}

impl CrossoverError {
    /// Attach a path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a malformed input error for a table
    pub fn malformed(table: &str, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Build a malformed input error for a 1-based data row of a table
    pub fn malformed_row(table: &str, row: usize, message: impl std::fmt::Display) -> Self {
        Self::malformed(table, format!("row {row}: {message}"))
    }

    /// Whether the error stems from bad input rather than a logic defect
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput { .. } | Self::MissingColumn { .. } | Self::InsufficientCandidates { .. }
        )
    }
}

/// Result type for case-crossover operations
pub type Result<T> = std::result::Result<T, CrossoverError>;
