use case_crossover::{Aggregation, ClimateObservation, ClimateWindowEngine, Covariate, WindowSpec};

use crate::utils::{daily_series, date};

fn engine(specs: Vec<WindowSpec>, window: usize) -> ClimateWindowEngine {
    ClimateWindowEngine::new(specs, window).unwrap().with_parallel(false)
}

fn tmax_series(unit: &str, values: &[f64]) -> Vec<ClimateObservation> {
    values
        .iter()
        .zip(1..)
        .map(|(&v, d)| {
            let mut obs = ClimateObservation::empty(unit, date(2015, 1, d));
            obs.temperature_max = Some(v);
            obs
        })
        .collect()
}

#[test]
fn test_mean_over_exact_window() {
    let observations = tmax_series("A", &[10.0, 20.0, 30.0, 40.0]);
    let table = engine(vec![WindowSpec::new(Covariate::TemperatureMax, Aggregation::Mean)], 3)
        .compute(&observations)
        .unwrap();

    let values: Vec<_> = table.rows().iter().map(|r| r.aggregates[0]).collect();
    assert_eq!(values, vec![None, None, Some(20.0), Some(30.0)]);
    assert_eq!(table.columns(), &["tmax_mean_3d".to_string()]);
}

#[test]
fn test_default_width_week_window() {
    let observations = tmax_series("A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    let specs = vec![
        WindowSpec::new(Covariate::TemperatureMax, Aggregation::Sum),
        WindowSpec::new(Covariate::TemperatureMax, Aggregation::Mean),
    ];
    let table = engine(specs, 7).compute(&observations).unwrap();

    let rows = table.rows();
    assert_eq!(rows.len(), 8);
    for row in &rows[..6] {
        assert_eq!(row.aggregates.as_slice(), &[None, None], "{}", row.date);
    }
    // 2015-01-07 covers days 1-7, 2015-01-08 covers days 2-8
    assert_eq!(rows[6].date, date(2015, 1, 7));
    assert_eq!(rows[6].aggregates.as_slice(), &[Some(28.0), Some(4.0)]);
    assert_eq!(rows[7].aggregates.as_slice(), &[Some(35.0), Some(5.0)]);
    assert_eq!(table.columns(), &["tmax_sum_7d".to_string(), "tmax_mean_7d".to_string()]);
}

#[test]
fn test_missing_value_propagates_to_covering_windows() {
    let mut observations = tmax_series("A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    observations[2].temperature_max = None;

    let table = engine(vec![WindowSpec::new(Covariate::TemperatureMax, Aggregation::Max)], 2)
        .compute(&observations)
        .unwrap();

    let values: Vec<_> = table.rows().iter().map(|r| r.aggregates[0]).collect();
    assert_eq!(values, vec![None, Some(2.0), None, None, Some(5.0), Some(6.0)]);
}

#[test]
fn test_lagged_window() {
    let observations = tmax_series("A", &[1.0, 2.0, 3.0, 4.0, 5.0]);
    let spec = WindowSpec::new(Covariate::TemperatureMax, Aggregation::Sum).with_lag(1);
    let table = engine(vec![spec], 2).compute(&observations).unwrap();

    // Day 3 sums days 1 and 2
    let values: Vec<_> = table.rows().iter().map(|r| r.aggregates[0]).collect();
    assert_eq!(values, vec![None, None, Some(3.0), Some(5.0), Some(7.0)]);
    assert_eq!(table.columns(), &["tmax_sum_2d_lag1".to_string()]);
}

#[test]
fn test_units_never_share_windows() {
    // B's series starts where A's ends; A's history must not leak into B
    let mut observations = tmax_series("A", &[1.0, 1.0, 1.0]);
    let mut b = ClimateObservation::empty("B", date(2015, 1, 4));
    b.temperature_max = Some(9.0);
    observations.push(b);

    let table = engine(vec![WindowSpec::new(Covariate::TemperatureMax, Aggregation::Sum)], 2)
        .compute(&observations)
        .unwrap();

    let b_row = table.rows().iter().find(|r| r.spatial_unit == "B").unwrap();
    assert_eq!(b_row.aggregates[0], None);
    assert_eq!(table.rows()[2].aggregates[0], Some(2.0));
}

#[test]
fn test_diurnal_range_derived_before_windowing() {
    let observations: Vec<_> = [(30.0, 20.0), (28.0, 14.0)]
        .iter()
        .zip(1..)
        .map(|(&(max, min), d)| {
            let mut obs = ClimateObservation::empty("A", date(2015, 1, d));
            obs.temperature_max = Some(max);
            obs.temperature_min = Some(min);
            obs
        })
        .collect();

    let table = engine(vec![WindowSpec::new(Covariate::DiurnalRange, Aggregation::Max)], 2)
        .compute(&observations)
        .unwrap();

    // Daily ranges are 10 and 14; max(tmax) - max(tmin) would give 10
    assert_eq!(table.rows()[1].aggregates[0], Some(14.0));
    assert_eq!(table.columns(), &["diurnal_max_2d".to_string()]);
}

#[test]
fn test_parallel_matches_sequential() {
    let mut observations = Vec::new();
    for unit in ["0101", "0147", "0151", "0153", "0155"] {
        observations.extend(daily_series(unit, date(2014, 12, 1), 90));
    }
    let specs = case_crossover::algorithm::climate::default_specs();

    let sequential = engine(specs.clone(), 7).compute(&observations).unwrap();
    let parallel = ClimateWindowEngine::new(specs, 7)
        .unwrap()
        .with_parallel(true)
        .compute(&observations)
        .unwrap();

    assert_eq!(sequential.rows(), parallel.rows());
    assert_eq!(sequential.len(), 5 * 90);
}
