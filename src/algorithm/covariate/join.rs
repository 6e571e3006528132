//! Covariate join
//!
//! Left-joins the crossover set to the climate window table on the exact
//! (spatial unit, date) key. Rows without a climate match are kept with
//! missing covariates and counted in a [`MissingCovariateReport`].

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::NaiveDate;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::algorithm::climate::ClimateWindowTable;
use crate::algorithm::crossover::CrossoverSet;
use crate::models::CrossoverRow;
use crate::utils::logging::log_stage_complete;

/// A crossover row with its climate covariates attached
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub row: CrossoverRow,
    /// Aligned with `JoinedTable::covariate_columns`
    pub covariates: Vec<Option<f64>>,
}

/// Missing covariate bookkeeping for the joined table
///
/// Missingness is never fatal; it is reported so downstream analysis can
/// handle it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingCovariateReport {
    /// Rows with no climate row for their (spatial unit, date)
    pub rows_without_climate: usize,
    /// Spatial units of the crossover set absent from the climate table
    pub units_without_climate: BTreeSet<String>,
    /// Per covariate column, matched rows whose aggregate is undefined
    pub null_aggregates: Vec<(String, usize)>,
}

impl MissingCovariateReport {
    /// Whether any covariate value is missing
    #[must_use]
    pub fn has_missing(&self) -> bool {
        self.rows_without_climate > 0 || self.null_aggregates.iter().any(|(_, n)| *n > 0)
    }

    /// Emit warnings summarising missingness
    pub fn log_warnings(&self) {
        if self.rows_without_climate > 0 {
            warn!(
                "{} crossover rows have no matching climate row; their covariates are missing",
                self.rows_without_climate
            );
        }
        if !self.units_without_climate.is_empty() {
            warn!(
                "Spatial units absent from the climate table: {}",
                self.units_without_climate.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        for (column, count) in &self.null_aggregates {
            if *count > 0 {
                warn!("{count} crossover rows have an undefined {column} (insufficient window history)");
            }
        }
    }
}

/// Result of the covariate join
#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub covariate_columns: Vec<String>,
    pub rows: Vec<JoinedRow>,
    pub report: MissingCovariateReport,
}

impl JoinedTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Left-join crossover rows to climate windows on (spatial unit, date)
///
/// Neither input is modified; the joined table owns copies of the rows.
#[must_use]
pub fn left_join(crossover: &CrossoverSet, climate: &ClimateWindowTable) -> JoinedTable {
    let start_time = Instant::now();

    let index: FxHashMap<(&str, NaiveDate), usize> = climate
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| ((row.spatial_unit.as_str(), row.date), i))
        .collect();

    let known_units: BTreeSet<&str> = climate.rows().iter().map(|r| r.spatial_unit.as_str()).collect();

    let width = climate.columns().len();
    let mut report = MissingCovariateReport {
        null_aggregates: climate.columns().iter().map(|c| (c.clone(), 0)).collect(),
        ..MissingCovariateReport::default()
    };

    let rows = crossover
        .rows()
        .iter()
        .map(|row| {
            let covariates = match index.get(&(row.spatial_unit.as_str(), row.date)) {
                Some(&i) => {
                    let aggregates = climate.rows()[i].aggregates.clone();
                    for (k, value) in aggregates.iter().enumerate() {
                        if value.is_none() {
                            report.null_aggregates[k].1 += 1;
                        }
                    }
                    aggregates
                }
                None => {
                    debug!(
                        "No climate row for stratum {} ({}, {})",
                        row.stratum_id, row.spatial_unit, row.date
                    );
                    report.rows_without_climate += 1;
                    if !known_units.contains(row.spatial_unit.as_str()) {
                        report.units_without_climate.insert(row.spatial_unit.clone());
                    }
                    vec![None; width]
                }
            };

            JoinedRow {
                row: row.clone(),
                covariates,
            }
        })
        .collect::<Vec<_>>();

    log_stage_complete("Covariate join", rows.len(), start_time.elapsed());

    JoinedTable {
        covariate_columns: climate.columns().to_vec(),
        rows,
        report,
    }
}
