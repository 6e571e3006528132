use std::fs;

use case_crossover::{
    CandidatePolicy, CaseCrossoverPipeline, CrossoverError, RecordBatch, read_table,
};
use tempfile::tempdir;

use crate::utils::{case, cases_csv, climate_csv, config_in, daily_series, date, write_file};

fn climate_for(units: &[&str]) -> String {
    let mut observations = Vec::new();
    for unit in units {
        observations.extend(daily_series(unit, date(2014, 12, 1), 120));
    }
    climate_csv(&observations)
}

#[test]
fn test_end_to_end_csv() {
    let dir = tempdir().unwrap();
    let cases = write_file(
        dir.path(),
        "cases.csv",
        &cases_csv(&[
            case(1, date(2015, 1, 2), "0101"),
            case(2, date(2015, 1, 15), "0147"),
            case(3, date(2015, 2, 20), "0101"),
        ]),
    );
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101", "0147"]));

    let config = config_in(dir.path(), &cases, &climate)
        .controls_per_case(4)
        .report_path(dir.path().join("summary.json"))
        .controls_path(dir.path().join("controls.csv"))
        .build()
        .unwrap();
    let output = config.output_path.clone();

    let summary = CaseCrossoverPipeline::new(config).unwrap().run().unwrap();
    assert_eq!(summary.strata, 3);
    assert_eq!(summary.rows, 3 * 5);
    assert_eq!(summary.missing_covariates.rows_without_climate, 0);

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(
        lines[0],
        "stratum_id,date,is_case,spatial_unit,lab_result,\
         precip_sum_7d,tmax_mean_7d,tmin_mean_7d,tmean_mean_7d,diurnal_mean_7d"
    );
    assert_eq!(lines.len(), 1 + 15);
    assert!(lines[1].starts_with("1,2015-01-02,true,0101,confirmed,"));
    assert!(lines[6].starts_with("2,2015-01-15,true,0147,confirmed,"));

    let controls = fs::read_to_string(dir.path().join("controls.csv")).unwrap();
    assert_eq!(controls.lines().count(), 1 + 12);
    assert!(controls.starts_with("case_id,date\n"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(report["seed"], 20_150_101);
    assert_eq!(report["strata"], 3);
}

#[test]
fn test_reruns_are_byte_identical() {
    let dir = tempdir().unwrap();
    let cases: Vec<_> = (1..=40)
        .map(|i| case(i, date(2015, 1, 1) + chrono::Duration::days(i), "0101"))
        .collect();
    let cases = write_file(dir.path(), "cases.csv", &cases_csv(&cases));
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));

    let run = |name: &str, parallel: bool| {
        let config = config_in(dir.path(), &cases, &climate)
            .output_path(dir.path().join(name))
            .insufficient_candidates(CandidatePolicy::Reject)
            .use_parallel(parallel)
            .build()
            .unwrap();
        CaseCrossoverPipeline::new(config).unwrap().run().unwrap();
        fs::read(dir.path().join(name)).unwrap()
    };

    let first = run("first.csv", true);
    let second = run("second.csv", true);
    let sequential = run("sequential.csv", false);
    assert_eq!(first, second);
    assert_eq!(first, sequential);
}

#[test]
fn test_unit_missing_from_climate_gets_null_covariates() {
    let dir = tempdir().unwrap();
    let cases = write_file(
        dir.path(),
        "cases.csv",
        &cases_csv(&[case(1, date(2015, 1, 15), "0101"), case(2, date(2015, 1, 16), "X")]),
    );
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));

    let config = config_in(dir.path(), &cases, &climate).build().unwrap();
    let output = config.output_path.clone();
    let summary = CaseCrossoverPipeline::new(config).unwrap().run().unwrap();

    assert_eq!(summary.rows, 12);
    assert_eq!(summary.missing_covariates.rows_without_climate, 6);
    assert!(summary.missing_covariates.units_without_climate.contains("X"));

    let content = fs::read_to_string(output).unwrap();
    for line in content.lines().filter(|l| l.starts_with("2,")) {
        assert!(line.ends_with(",,,,,"), "{line}");
    }
}

#[test]
fn test_abort_policy_fails_without_output() {
    let dir = tempdir().unwrap();
    let cases = write_file(
        dir.path(),
        "cases.csv",
        &cases_csv(&[case(1, date(2015, 1, 15), "0101"), case(77, date(2015, 2, 4), "0101")]),
    );
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));

    let config = config_in(dir.path(), &cases, &climate)
        .controls_per_case(8)
        .build()
        .unwrap();
    let output = config.output_path.clone();

    let err = CaseCrossoverPipeline::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, CrossoverError::InsufficientCandidates { case_id: 77, .. }));
    assert!(err.to_string().contains("77"));
    assert!(!output.exists());
}

#[test]
fn test_reject_policy_drops_case() {
    let dir = tempdir().unwrap();
    let cases = write_file(
        dir.path(),
        "cases.csv",
        &cases_csv(&[case(1, date(2015, 1, 15), "0101"), case(77, date(2015, 2, 4), "0101")]),
    );
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));

    let config = config_in(dir.path(), &cases, &climate)
        .controls_per_case(8)
        .insufficient_candidates(CandidatePolicy::Reject)
        .build()
        .unwrap();

    let summary = CaseCrossoverPipeline::new(config).unwrap().run().unwrap();
    assert_eq!(summary.strata, 1);
    assert_eq!(summary.rows, 9);
    assert_eq!(summary.rejected_cases.len(), 1);
    assert_eq!(summary.rejected_cases[0].case_id, 77);
}

#[test]
fn test_yearly_directory_and_parquet_output() {
    let dir = tempdir().unwrap();
    let yearly = dir.path().join("cases");
    fs::create_dir(&yearly).unwrap();
    write_file(&yearly, "cases_2014.csv", &cases_csv(&[case(1, date(2014, 12, 15), "0101")]));
    write_file(&yearly, "cases_2015.csv", &cases_csv(&[case(2, date(2015, 1, 15), "0101")]));
    write_file(&yearly, "cases_2016.csv", &cases_csv(&[case(3, date(2016, 1, 15), "0101")]));
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));

    let config = config_in(dir.path(), &yearly, &climate)
        .year_range(2014, 2015)
        .output_path(dir.path().join("crossover.parquet"))
        .build()
        .unwrap();
    let output = config.output_path.clone();

    let summary = CaseCrossoverPipeline::new(config).unwrap().run().unwrap();
    assert_eq!(summary.cases_loaded, 2);
    assert_eq!(summary.strata, 2);

    let batches = read_table(&output).unwrap();
    assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 12);
    assert_eq!(batches[0].num_columns(), 10);
}

#[test]
fn test_malformed_case_row_is_reported() {
    let dir = tempdir().unwrap();
    let cases = write_file(
        dir.path(),
        "cases.csv",
        "id,infection_date,spatial_unit,lab_result\n1,2015-01-15,0101,confirmed\n2,,0101,confirmed\n",
    );
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));

    let config = config_in(dir.path(), &cases, &climate).build().unwrap();
    let err = CaseCrossoverPipeline::new(config).unwrap().run().unwrap_err();

    match err {
        CrossoverError::MalformedInput { table, message } => {
            assert_eq!(table, "cases (cases.csv)");
            assert!(message.starts_with("row 2:"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failed_side_output_leaves_no_main_output() {
    let dir = tempdir().unwrap();
    let cases = write_file(dir.path(), "cases.csv", &cases_csv(&[case(1, date(2015, 1, 15), "0101")]));
    let climate = write_file(dir.path(), "climate.csv", &climate_for(&["0101"]));
    let blocker = write_file(dir.path(), "blocker", "not a directory");

    let config = config_in(dir.path(), &cases, &climate)
        .controls_path(blocker.join("controls.csv"))
        .report_path(dir.path().join("summary.json"))
        .build()
        .unwrap();
    let output = config.output_path.clone();

    let err = CaseCrossoverPipeline::new(config).unwrap().run().unwrap_err();
    assert!(matches!(err, CrossoverError::Io { .. }), "{err}");
    assert!(!output.exists());
    assert!(!dir.path().join("crossover.csv.tmp").exists());
    assert!(!dir.path().join("summary.json").exists());
}

#[test]
fn test_build_rejects_invalid_in_memory_cases() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), &dir.path().join("cases.csv"), &dir.path().join("climate.csv"))
        .build()
        .unwrap();
    let pipeline = CaseCrossoverPipeline::new(config).unwrap();
    let climate = daily_series("0101", date(2014, 12, 1), 120);

    let blank_unit = [case(1, date(2015, 1, 15), "0101"), case(2, date(2015, 1, 16), "  ")];
    match pipeline.build(&blank_unit, &climate).unwrap_err() {
        CrossoverError::MalformedInput { table, message } => {
            assert_eq!(table, "cases");
            assert!(message.starts_with("row 2:"), "{message}");
            assert!(message.contains("spatial_unit"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let duplicate = [case(1, date(2015, 1, 15), "0101"), case(1, date(2015, 1, 16), "0101")];
    let err = pipeline.build(&duplicate, &climate).unwrap_err();
    assert!(err.to_string().contains("duplicate case id 1"), "{err}");

    assert!(pipeline.build(&blank_unit[..1], &climate).is_ok());
}
