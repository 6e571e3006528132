//! Climate covariate window specifications

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ClimateObservation;

/// A per-day climate signal, raw or derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Covariate {
    #[serde(rename = "tmax")]
    TemperatureMax,
    #[serde(rename = "tmin")]
    TemperatureMin,
    #[serde(rename = "tmean")]
    TemperatureMean,
    #[serde(rename = "precip")]
    Precipitation,
    /// Diurnal temperature range, max - min of the same day
    #[serde(rename = "diurnal")]
    DiurnalRange,
}

impl Covariate {
    /// Short key used in column names and spec strings
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::TemperatureMax => "tmax",
            Self::TemperatureMin => "tmin",
            Self::TemperatureMean => "tmean",
            Self::Precipitation => "precip",
            Self::DiurnalRange => "diurnal",
        }
    }

    /// Daily value for an observation; NaN counts as missing
    #[must_use]
    pub fn value(&self, obs: &ClimateObservation) -> Option<f64> {
        let value = match self {
            Self::TemperatureMax => obs.temperature_max,
            Self::TemperatureMin => obs.temperature_min,
            Self::TemperatureMean => obs.temperature_mean,
            Self::Precipitation => obs.precipitation_sum,
            Self::DiurnalRange => obs.diurnal_range(),
        };
        value.filter(|v| !v.is_nan())
    }
}

impl fmt::Display for Covariate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Covariate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tmax" | "temperature_max" => Ok(Self::TemperatureMax),
            "tmin" | "temperature_min" => Ok(Self::TemperatureMin),
            "tmean" | "temperature_mean" => Ok(Self::TemperatureMean),
            "precip" | "precipitation" | "precipitation_sum" => Ok(Self::Precipitation),
            "diurnal" | "dtr" | "diurnal_range" => Ok(Self::DiurnalRange),
            other => Err(format!("Unknown covariate: {other}")),
        }
    }
}

/// Aggregate function applied over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Min,
    Max,
}

impl Aggregation {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Apply to a complete, non-empty window
    #[must_use]
    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Self::Sum => values.iter().sum(),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "mean" | "avg" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(format!("Unknown aggregation: {other}")),
        }
    }
}

/// One requested trailing aggregate
///
/// With lag `L` and window `W` the value at date `D` summarises
/// `[D - L - W + 1, D - L]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSpec {
    pub covariate: Covariate,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub lag_days: u32,
}

impl WindowSpec {
    #[must_use]
    pub const fn new(covariate: Covariate, aggregation: Aggregation) -> Self {
        Self {
            covariate,
            aggregation,
            lag_days: 0,
        }
    }

    #[must_use]
    pub const fn with_lag(mut self, lag_days: u32) -> Self {
        self.lag_days = lag_days;
        self
    }

    /// Output column name for a window of `window_days`
    #[must_use]
    pub fn column_name(&self, window_days: usize) -> String {
        let base = format!("{}_{}_{window_days}d", self.covariate, self.aggregation);
        if self.lag_days > 0 {
            format!("{base}_lag{}", self.lag_days)
        } else {
            base
        }
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.covariate, self.aggregation)?;
        if self.lag_days > 0 {
            write!(f, ":{}", self.lag_days)?;
        }
        Ok(())
    }
}

impl FromStr for WindowSpec {
    type Err = String;

    /// Parse `covariate:aggregation[:lag]`, e.g. `precip:sum` or `tmax:mean:2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [covariate, aggregation] => Ok(Self::new(covariate.parse()?, aggregation.parse()?)),
            [covariate, aggregation, lag] => {
                let lag = lag
                    .trim()
                    .trim_start_matches("lag")
                    .parse::<u32>()
                    .map_err(|e| format!("Invalid lag in '{s}': {e}"))?;
                Ok(Self::new(covariate.parse()?, aggregation.parse()?).with_lag(lag))
            }
            _ => Err(format!(
                "Invalid covariate spec '{s}' (expected covariate:aggregation[:lag])"
            )),
        }
    }
}

/// Sum for precipitation, mean for temperature-like signals
#[must_use]
pub fn default_specs() -> Vec<WindowSpec> {
    vec![
        WindowSpec::new(Covariate::Precipitation, Aggregation::Sum),
        WindowSpec::new(Covariate::TemperatureMax, Aggregation::Mean),
        WindowSpec::new(Covariate::TemperatureMin, Aggregation::Mean),
        WindowSpec::new(Covariate::TemperatureMean, Aggregation::Mean),
        WindowSpec::new(Covariate::DiurnalRange, Aggregation::Mean),
    ]
}
