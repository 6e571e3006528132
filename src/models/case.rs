//! Confirmed case records supplied by the upstream case table

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A confirmed case with its estimated infection date and spatial unit
///
/// Records are validated at the ingestion boundary: `infection_date` is
/// never missing and `spatial_unit` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Unique case identifier
    pub id: i64,
    /// Estimated date of infection
    pub infection_date: NaiveDate,
    /// Spatial unit (e.g. municipality code) the case is attributed to
    pub spatial_unit: String,
    /// Laboratory result category
    pub lab_result: Option<String>,
}

impl CaseRecord {
    /// Create a new case record
    #[must_use]
    pub fn new(
        id: i64,
        infection_date: NaiveDate,
        spatial_unit: impl Into<String>,
        lab_result: Option<String>,
    ) -> Self {
        Self {
            id,
            infection_date,
            spatial_unit: spatial_unit.into(),
            lab_result,
        }
    }
}
