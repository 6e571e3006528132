use case_crossover::{
    Aggregation, ClimateWindowEngine, ControlDate, Covariate, CrossoverError, WindowSpec, assemble,
    left_join,
};
use rustc_hash::FxHashSet;

use crate::utils::{case, daily_series, date};

fn precip_windows(units: &[&str]) -> case_crossover::ClimateWindowTable {
    let mut observations = Vec::new();
    for unit in units {
        observations.extend(daily_series(unit, date(2015, 1, 1), 31));
    }
    ClimateWindowEngine::new(vec![WindowSpec::new(Covariate::Precipitation, Aggregation::Sum)], 3)
        .unwrap()
        .with_parallel(false)
        .compute(&observations)
        .unwrap()
}

fn controls(case_id: i64, days: &[u32]) -> Vec<ControlDate> {
    days.iter()
        .map(|&d| ControlDate {
            case_id,
            date: date(2015, 1, d),
        })
        .collect()
}

#[test]
fn test_join_attaches_unit_and_date_values() {
    let cases = vec![case(1, date(2015, 1, 15), "A")];
    let crossover = assemble(&cases, &controls(1, &[8, 22]), 2, &FxHashSet::default()).unwrap();
    let joined = left_join(&crossover, &precip_windows(&["A", "B"]));

    assert_eq!(joined.len(), 3);
    assert_eq!(joined.covariate_columns, vec!["precip_sum_3d".to_string()]);
    // daily_series value on day d is (d - 1) % 10
    assert_eq!(joined.rows[0].covariates, vec![Some(2.0 + 3.0 + 4.0)]);
    assert_eq!(joined.rows[1].covariates, vec![Some(5.0 + 6.0 + 7.0)]);
    assert!(!joined.report.has_missing());
}

#[test]
fn test_unit_without_climate_keeps_rows() {
    let cases = vec![case(1, date(2015, 1, 15), "A"), case(2, date(2015, 1, 16), "X")];
    let mut all_controls = controls(1, &[8, 22]);
    all_controls.extend(controls(2, &[9, 23]));
    let crossover = assemble(&cases, &all_controls, 2, &FxHashSet::default()).unwrap();

    let joined = left_join(&crossover, &precip_windows(&["A"]));

    assert_eq!(joined.len(), 6);
    for row in joined.rows.iter().filter(|r| r.row.stratum_id == 2) {
        assert_eq!(row.covariates, vec![None]);
    }
    assert_eq!(joined.report.rows_without_climate, 3);
    assert!(joined.report.units_without_climate.contains("X"));
    assert!(joined.report.has_missing());
}

#[test]
fn test_early_dates_have_undefined_windows() {
    let cases = vec![case(1, date(2015, 1, 2), "A")];
    let crossover = assemble(&cases, &controls(1, &[6]), 1, &FxHashSet::default()).unwrap();
    let joined = left_join(&crossover, &precip_windows(&["A"]));

    // The series starts on 2015-01-01, so the 3-day window at 01-02 is incomplete
    assert_eq!(joined.rows[0].covariates, vec![None]);
    assert!(joined.rows[1].covariates[0].is_some());
    assert_eq!(joined.report.null_aggregates, vec![("precip_sum_3d".to_string(), 1)]);
    assert_eq!(joined.report.rows_without_climate, 0);
}

#[test]
fn test_short_stratum_is_invariant_violation() {
    let cases = vec![case(1, date(2015, 1, 15), "A"), case(2, date(2015, 1, 16), "A")];
    let mut all_controls = controls(1, &[8, 22]);
    all_controls.extend(controls(2, &[9]));

    let err = assemble(&cases, &all_controls, 2, &FxHashSet::default()).unwrap_err();
    match err {
        CrossoverError::InvariantViolation {
            stratum_id,
            observed,
            expected,
            ..
        } => {
            assert_eq!(stratum_id, 2);
            assert_eq!(observed, 2);
            assert_eq!(expected, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}
