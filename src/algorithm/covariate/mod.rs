//! Attaching climate covariates to case and control dates

pub mod join;

pub use join::{JoinedRow, JoinedTable, MissingCovariateReport, left_join};
