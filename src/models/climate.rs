//! Daily climate observations per spatial unit

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of raw climate covariates for a spatial unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateObservation {
    pub spatial_unit: String,
    pub date: NaiveDate,
    /// Daily maximum temperature
    pub temperature_max: Option<f64>,
    /// Daily minimum temperature
    pub temperature_min: Option<f64>,
    /// Daily mean temperature
    pub temperature_mean: Option<f64>,
    /// Daily precipitation total
    pub precipitation_sum: Option<f64>,
}

impl ClimateObservation {
    /// Create an observation with all covariates missing
    #[must_use]
    pub fn empty(spatial_unit: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            spatial_unit: spatial_unit.into(),
            date,
            temperature_max: None,
            temperature_min: None,
            temperature_mean: None,
            precipitation_sum: None,
        }
    }

    /// Diurnal temperature range (max - min), missing if either input is
    #[must_use]
    pub fn diurnal_range(&self) -> Option<f64> {
        Some(self.temperature_max? - self.temperature_min?)
    }
}
