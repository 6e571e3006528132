//! Trailing-window climate aggregates
//!
//! Each spatial unit is processed independently: its observations are
//! ordered by date, derived covariates are computed per row, and every
//! requested aggregate is evaluated over a calendar-aligned trailing window.

use std::time::Instant;

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use smallvec::SmallVec;

use super::spec::WindowSpec;
use crate::error::{CrossoverError, Result};
use crate::models::ClimateObservation;
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, log_stage_complete};
use crate::utils::to_date32;

/// Trailing aggregates of one spatial unit on one date
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateWindowRow {
    pub spatial_unit: String,
    pub date: NaiveDate,
    /// One value per window spec, `None` when the window is incomplete
    pub aggregates: Vec<Option<f64>>,
}

/// Output of the window engine, one row per (spatial unit, date)
#[derive(Debug, Clone, Default)]
pub struct ClimateWindowTable {
    columns: Vec<String>,
    rows: Vec<ClimateWindowRow>,
}

impl ClimateWindowTable {
    /// Aggregate column names, aligned with `ClimateWindowRow::aggregates`
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows ordered by spatial unit, then date
    #[must_use]
    pub fn rows(&self) -> &[ClimateWindowRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Engine computing trailing aggregates per spatial unit
#[derive(Debug, Clone)]
pub struct ClimateWindowEngine {
    specs: Vec<WindowSpec>,
    window_days: usize,
    use_parallel: bool,
}

impl ClimateWindowEngine {
    /// Create an engine for the given specs and window size
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `window_days` is zero
    pub fn new(specs: Vec<WindowSpec>, window_days: usize) -> Result<Self> {
        if window_days == 0 {
            return Err(CrossoverError::Config(
                "Climate window must span at least one day".to_string(),
            ));
        }
        Ok(Self {
            specs,
            window_days,
            use_parallel: true,
        })
    }

    /// Set whether spatial units are processed in parallel
    #[must_use]
    pub const fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    #[must_use]
    pub fn specs(&self) -> &[WindowSpec] {
        &self.specs
    }

    #[must_use]
    pub const fn window_days(&self) -> usize {
        self.window_days
    }

    /// Output column names in spec order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| spec.column_name(self.window_days))
            .collect()
    }

    /// Compute the window table for all observations
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if a spatial unit has two observations for
    /// the same date
    pub fn compute(&self, observations: &[ClimateObservation]) -> Result<ClimateWindowTable> {
        let start_time = Instant::now();

        let mut units: Vec<(&str, Vec<&ClimateObservation>)> = observations
            .iter()
            .into_group_map_by(|obs| obs.spatial_unit.as_str())
            .into_iter()
            .collect();
        units.sort_unstable_by(|a, b| a.0.cmp(b.0));

        info!(
            "Computing {} trailing {}-day aggregates for {} spatial units ({} observations)",
            self.specs.len(),
            self.window_days,
            units.len(),
            observations.len()
        );

        let pb = create_main_progress_bar(units.len() as u64, Some("Climate windows"));

        let results: Vec<Result<Vec<ClimateWindowRow>>> = if self.use_parallel {
            units
                .into_par_iter()
                .map(|(unit, series)| {
                    let rows = self.compute_unit(unit, series);
                    pb.inc(1);
                    rows
                })
                .collect()
        } else {
            units
                .into_iter()
                .map(|(unit, series)| {
                    let rows = self.compute_unit(unit, series);
                    pb.inc(1);
                    rows
                })
                .collect()
        };

        finish_progress_bar(&pb, Some("Climate windows complete"));

        let mut rows = Vec::with_capacity(observations.len());
        for unit_rows in results {
            rows.extend(unit_rows?);
        }

        let columns = self.column_names();
        for (k, column) in columns.iter().enumerate() {
            let missing = rows.iter().filter(|r| r.aggregates[k].is_none()).count();
            debug!("{column}: {missing} of {} values undefined", rows.len());
        }

        log_stage_complete("Climate windows", rows.len(), start_time.elapsed());

        Ok(ClimateWindowTable { columns, rows })
    }

    /// Compute the rows of one spatial unit
    fn compute_unit(
        &self,
        unit: &str,
        mut series: Vec<&ClimateObservation>,
    ) -> Result<Vec<ClimateWindowRow>> {
        series.sort_unstable_by_key(|obs| obs.date);

        if let Some(pair) = series.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(CrossoverError::malformed(
                "climate",
                format!(
                    "duplicate observation for spatial unit '{unit}' on {}",
                    pair[0].date
                ),
            ));
        }

        let days: Vec<i32> = series.iter().map(|obs| to_date32(obs.date)).collect();

        // Derived covariates are evaluated per row before any windowing
        let daily: Vec<Vec<Option<f64>>> = self
            .specs
            .iter()
            .map(|spec| series.iter().map(|obs| spec.covariate.value(obs)).collect())
            .collect();

        let rows = series
            .iter()
            .enumerate()
            .map(|(i, obs)| ClimateWindowRow {
                spatial_unit: unit.to_string(),
                date: obs.date,
                aggregates: self
                    .specs
                    .iter()
                    .zip(&daily)
                    .map(|(spec, values)| self.window_value(&days, values, i, spec))
                    .collect(),
            })
            .collect();

        Ok(rows)
    }

    /// Aggregate over the window ending `lag_days` before row `i`
    ///
    /// Undefined when the window reaches before the series start, spans a
    /// missing date, or contains a missing value.
    fn window_value(
        &self,
        days: &[i32],
        values: &[Option<f64>],
        i: usize,
        spec: &WindowSpec,
    ) -> Option<f64> {
        let end_day = days[i].checked_sub(i32::try_from(spec.lag_days).ok()?)?;
        let end = days.binary_search(&end_day).ok()?;
        let start = end.checked_sub(self.window_days - 1)?;

        // Dates are unique and sorted, so equal span means no gaps
        let span = i64::from(days[end]) - i64::from(days[start]);
        if span != self.window_days as i64 - 1 {
            return None;
        }

        let window: SmallVec<[f64; 16]> = values[start..=end].iter().copied().collect::<Option<_>>()?;
        Some(spec.aggregation.apply(&window))
    }
}
