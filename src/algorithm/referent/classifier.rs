//! Referent window classification
//!
//! Classifies a case by the position of its infection date within the
//! calendar month: near the start, near the end, or in the middle.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ReferentScheme;
use crate::utils::days_in_month_of;

/// Position class of a case date within its month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferentClass {
    /// Day of month within the leading boundary; controls are drawn forward
    Start,
    /// Neither boundary applies; controls are drawn both ways
    Mid,
    /// Days remaining within the trailing boundary; controls are drawn backward
    End,
}

impl fmt::Display for ReferentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Mid => write!(f, "MID"),
            Self::End => write!(f, "END"),
        }
    }
}

impl FromStr for ReferentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "mid" => Ok(Self::Mid),
            "end" => Ok(Self::End),
            other => Err(format!("Unknown referent class: {other}")),
        }
    }
}

/// Calendar position of a date, computed once per case
///
/// Holds the class together with the day and month length it was derived
/// from, so candidate generation never recomputes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferentPosition {
    pub date: NaiveDate,
    /// Day of month (1-based)
    pub day: u32,
    pub days_in_month: u32,
    pub class: ReferentClass,
}

impl ReferentPosition {
    /// Classify a date under the given scheme
    #[must_use]
    pub fn of(date: NaiveDate, scheme: &ReferentScheme) -> Self {
        let day = date.day();
        let days_in_month = days_in_month_of(date);
        let days_remaining = days_in_month - day;

        let class = if day <= scheme.boundary_days {
            ReferentClass::Start
        } else if days_remaining <= scheme.boundary_days {
            ReferentClass::End
        } else {
            ReferentClass::Mid
        };

        Self {
            date,
            day,
            days_in_month,
            class,
        }
    }

    /// Days left in the month after the date
    #[must_use]
    pub const fn days_remaining(&self) -> u32 {
        self.days_in_month - self.day
    }
}

/// Classify a date under the default scheme
#[must_use]
pub fn classify(date: NaiveDate) -> ReferentClass {
    ReferentPosition::of(date, &ReferentScheme::default()).class
}
