//! Case-crossover assembly
//!
//! Unions one case row per case with its sampled control rows into a
//! stratified set and checks the stratum shape afterwards.

use std::time::Instant;

use log::info;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{CrossoverError, Result};
use crate::models::{CaseRecord, ControlDate, CrossoverRow};
use crate::utils::logging::log_stage_complete;

/// Assembled strata of one case row and N control rows each
#[derive(Debug, Clone)]
pub struct CrossoverSet {
    rows: Vec<CrossoverRow>,
    controls_per_case: usize,
}

impl CrossoverSet {
    /// All rows, grouped by stratum with the case row first
    #[must_use]
    pub fn rows(&self) -> &[CrossoverRow] {
        &self.rows
    }

    /// Number of control rows in each stratum
    #[must_use]
    pub const fn controls_per_case(&self) -> usize {
        self.controls_per_case
    }

    /// Number of strata
    #[must_use]
    pub fn stratum_count(&self) -> usize {
        self.rows.len() / (self.controls_per_case + 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check that every stratum holds exactly N + 1 rows, one of them the case
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` for the first offending stratum in row order
    pub fn validate(&self) -> Result<()> {
        let expected = self.controls_per_case + 1;
        let mut counts: FxHashMap<i64, (usize, usize)> = FxHashMap::default();
        let mut order = Vec::new();

        for row in &self.rows {
            let entry = counts.entry(row.stratum_id).or_insert_with(|| {
                order.push(row.stratum_id);
                (0, 0)
            });
            entry.0 += 1;
            if row.is_case {
                entry.1 += 1;
            }
        }

        for stratum_id in order {
            let (observed, case_rows) = counts[&stratum_id];
            if observed != expected || case_rows != 1 {
                return Err(CrossoverError::InvariantViolation {
                    stratum_id,
                    observed,
                    case_rows,
                    expected,
                });
            }
        }

        Ok(())
    }
}

/// Build the stratified crossover set
///
/// # Arguments
///
/// * `cases` - Case records in output order
/// * `controls` - Sampled control dates
/// * `controls_per_case` - Expected number of controls per stratum
/// * `excluded` - Case ids rejected during sampling; they form no stratum
///
/// # Errors
///
/// Returns `InvariantViolation` if any stratum ends up with the wrong number
/// of rows, including controls that reference no known case
pub fn assemble(
    cases: &[CaseRecord],
    controls: &[ControlDate],
    controls_per_case: usize,
    excluded: &FxHashSet<i64>,
) -> Result<CrossoverSet> {
    let start_time = Instant::now();

    let mut controls_by_case: FxHashMap<i64, Vec<&ControlDate>> = FxHashMap::default();
    for control in controls {
        controls_by_case.entry(control.case_id).or_default().push(control);
    }

    let included = cases.iter().filter(|c| !excluded.contains(&c.id)).count();
    let mut rows = Vec::with_capacity(included * (controls_per_case + 1));

    for case in cases.iter().filter(|c| !excluded.contains(&c.id)) {
        rows.push(CrossoverRow {
            stratum_id: case.id,
            date: case.infection_date,
            is_case: true,
            spatial_unit: case.spatial_unit.clone(),
            lab_result: case.lab_result.clone(),
        });

        // A repeated case id only contributes its controls once; the
        // duplicate case row then trips validation
        if let Some(mut case_controls) = controls_by_case.remove(&case.id) {
            case_controls.sort_unstable_by_key(|c| c.date);
            rows.extend(case_controls.into_iter().map(|c| CrossoverRow {
                stratum_id: case.id,
                date: c.date,
                is_case: false,
                spatial_unit: case.spatial_unit.clone(),
                lab_result: None,
            }));
        }
    }

    // Controls left over belong to no assembled case
    if let Some(orphan) = controls
        .iter()
        .find(|c| controls_by_case.contains_key(&c.case_id))
    {
        return Err(CrossoverError::InvariantViolation {
            stratum_id: orphan.case_id,
            observed: controls_by_case[&orphan.case_id].len(),
            case_rows: 0,
            expected: controls_per_case + 1,
        });
    }

    let set = CrossoverSet {
        rows,
        controls_per_case,
    };
    set.validate()?;

    log_stage_complete("Crossover assembly", set.len(), start_time.elapsed());
    info!(
        "Assembled {} strata of 1 case + {} controls",
        set.stratum_count(),
        controls_per_case
    );

    Ok(set)
}
