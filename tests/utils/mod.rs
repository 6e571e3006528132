use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use case_crossover::{CaseRecord, ClimateObservation, StudyConfig, StudyConfigBuilder};
use chrono::{Duration, NaiveDate};

/// Shorthand for a calendar date
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// A case record with a confirmed lab result
#[must_use]
pub fn case(id: i64, infection_date: NaiveDate, unit: &str) -> CaseRecord {
    CaseRecord::new(id, infection_date, unit, Some("confirmed".to_string()))
}

/// `count` synthetic cases spread over 2015, cycling through `units`
#[must_use]
pub fn synthetic_cases(count: usize, units: &[&str]) -> Vec<CaseRecord> {
    (0..count)
        .map(|i| {
            let offset = i64::try_from(i % 365).expect("small offset");
            case(
                i64::try_from(i).expect("small id") + 1,
                date(2015, 1, 1) + Duration::days(offset),
                units[i % units.len()],
            )
        })
        .collect()
}

/// A complete daily series for one unit with simple deterministic values
#[must_use]
pub fn daily_series(unit: &str, start: NaiveDate, days: i64) -> Vec<ClimateObservation> {
    (0..days)
        .map(|i| {
            let value = (i % 10) as f64;
            ClimateObservation {
                spatial_unit: unit.to_string(),
                date: start + Duration::days(i),
                temperature_max: Some(25.0 + value),
                temperature_min: Some(15.0 + value / 2.0),
                temperature_mean: Some(20.0 + value),
                precipitation_sum: Some(value),
            }
        })
        .collect()
}

/// Write a text file into `dir` and return its path
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write test file");
    path
}

/// Render climate observations as CSV with the canonical header
#[must_use]
pub fn climate_csv(observations: &[ClimateObservation]) -> String {
    let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    let mut csv = String::from(
        "spatial_unit,date,temperature_max,temperature_min,temperature_mean,precipitation_sum\n",
    );
    for obs in observations {
        writeln!(
            csv,
            "{},{},{},{},{},{}",
            obs.spatial_unit,
            obs.date,
            fmt(obs.temperature_max),
            fmt(obs.temperature_min),
            fmt(obs.temperature_mean),
            fmt(obs.precipitation_sum)
        )
        .expect("write to string");
    }
    csv
}

/// Render case records as CSV with the canonical header
#[must_use]
pub fn cases_csv(cases: &[CaseRecord]) -> String {
    let mut csv = String::from("id,infection_date,spatial_unit,lab_result\n");
    for case in cases {
        writeln!(
            csv,
            "{},{},{},{}",
            case.id,
            case.infection_date,
            case.spatial_unit,
            case.lab_result.as_deref().unwrap_or_default()
        )
        .expect("write to string");
    }
    csv
}

/// Configuration builder for files in `dir`, with a fixed seed
#[must_use]
pub fn config_in(dir: &Path, cases: &Path, climate: &Path) -> StudyConfigBuilder {
    StudyConfig::builder()
        .cases_path(cases)
        .climate_path(climate)
        .output_path(dir.join("crossover.csv"))
        .random_seed(20_150_101)
        .threads(2)
}
