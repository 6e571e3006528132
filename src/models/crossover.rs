//! Rows of the case-crossover design

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A sampled control (referent) date for a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlDate {
    /// Identifier of the case this control belongs to
    pub case_id: i64,
    pub date: NaiveDate,
}

/// One row of the stratified case-crossover set
///
/// Each stratum holds exactly one case row and N control rows sharing
/// `stratum_id` (the case id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossoverRow {
    pub stratum_id: i64,
    pub date: NaiveDate,
    pub is_case: bool,
    pub spatial_unit: String,
    /// Lab result, present on case rows only
    pub lab_result: Option<String>,
}
