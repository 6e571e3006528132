use case_crossover::algorithm::referent::{ReferentPosition, SamplerConfig};
use case_crossover::{
    CandidatePolicy, ControlSampler, CrossoverError, ReferentClass, ReferentScheme, candidate_dates,
    classify,
};
use chrono::{Datelike, Duration};

use crate::utils::{case, date, synthetic_cases};

fn sampler(n: usize, seed: u64, use_parallel: bool, policy: CandidatePolicy) -> ControlSampler {
    ControlSampler::new(SamplerConfig {
        controls_per_case: n,
        scheme: ReferentScheme::default(),
        seed,
        policy,
        use_parallel,
    })
}

#[test]
fn test_every_day_of_2016_gets_one_class() {
    let mut day = date(2016, 1, 1);
    while day.year() == 2016 {
        let class = classify(day);
        let position = ReferentPosition::of(day, &ReferentScheme::default());
        assert_eq!(class, position.class, "{day}");
        match class {
            ReferentClass::Start => assert!(day.day() <= 4),
            ReferentClass::End => assert!(position.days_remaining() <= 4),
            ReferentClass::Mid => assert!(day.day() > 4 && position.days_remaining() > 4),
        }
        day += Duration::days(1);
    }
}

#[test]
fn test_candidates_stay_in_month_and_away_from_case() {
    let scheme = ReferentScheme::default();
    let mut day = date(2015, 1, 1);
    while day.year() == 2015 {
        let position = ReferentPosition::of(day, &scheme);
        for candidate in candidate_dates(&position, &scheme) {
            assert_eq!(candidate.month(), day.month(), "{day} -> {candidate}");
            assert!((candidate - day).num_days().abs() >= 4, "{day} -> {candidate}");
        }
        day += Duration::days(1);
    }
}

#[test]
fn test_start_case_round_trip() {
    let outcome = sampler(5, 7, false, CandidatePolicy::Abort)
        .sample(&[case(1, date(2015, 1, 2), "A")])
        .unwrap();

    let position = ReferentPosition::of(date(2015, 1, 2), &ReferentScheme::default());
    let candidates = candidate_dates(&position, &ReferentScheme::default());
    assert_eq!(candidates.len(), 9);

    assert_eq!(outcome.controls.len(), 5);
    let mut previous = None;
    for control in &outcome.controls {
        assert_eq!(control.case_id, 1);
        assert!(candidates.contains(&control.date));
        assert!(previous < Some(control.date), "controls must be distinct and ascending");
        previous = Some(control.date);
    }
}

#[test]
fn test_same_seed_same_controls() {
    let cases = synthetic_cases(200, &["A", "B"]);
    let first = sampler(5, 99, false, CandidatePolicy::Reject).sample(&cases).unwrap();
    let second = sampler(5, 99, false, CandidatePolicy::Reject).sample(&cases).unwrap();
    assert_eq!(first.controls, second.controls);
}

#[test]
fn test_different_seed_different_controls() {
    let cases = synthetic_cases(200, &["A", "B"]);
    let first = sampler(5, 1, false, CandidatePolicy::Reject).sample(&cases).unwrap();
    let second = sampler(5, 2, false, CandidatePolicy::Reject).sample(&cases).unwrap();
    assert_ne!(first.controls, second.controls);
}

#[test]
fn test_parallel_matches_sequential() {
    // Above the parallel threshold
    let cases = synthetic_cases(2_500, &["A", "B", "C"]);
    let sequential = sampler(5, 42, false, CandidatePolicy::Reject).sample(&cases).unwrap();
    let parallel = sampler(5, 42, true, CandidatePolicy::Reject).sample(&cases).unwrap();

    assert_eq!(sequential.controls, parallel.controls);
    assert_eq!(sequential.rejected, parallel.rejected);
    assert_eq!(sequential.class_counts, parallel.class_counts);
}

#[test]
fn test_case_order_does_not_change_its_controls() {
    let cases = synthetic_cases(50, &["A"]);
    let mut reversed = cases.clone();
    reversed.reverse();

    let forward = sampler(4, 5, false, CandidatePolicy::Reject).sample(&cases).unwrap();
    let backward = sampler(4, 5, false, CandidatePolicy::Reject).sample(&reversed).unwrap();

    let mut a = forward.controls;
    let mut b = backward.controls;
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn test_abort_names_first_offending_case() {
    // 2015-02-04 offers 7 candidates
    let cases = vec![
        case(10, date(2015, 1, 15), "A"),
        case(11, date(2015, 2, 4), "A"),
        case(12, date(2015, 2, 5), "A"),
    ];
    let err = sampler(8, 3, false, CandidatePolicy::Abort).sample(&cases).unwrap_err();
    match err {
        CrossoverError::InsufficientCandidates {
            case_id,
            available,
            required,
            ..
        } => {
            assert_eq!(case_id, 11);
            assert_eq!(available, 7);
            assert_eq!(required, 8);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reject_drops_offending_cases() {
    let cases = vec![case(10, date(2015, 1, 15), "A"), case(11, date(2015, 2, 4), "A")];
    let outcome = sampler(8, 3, false, CandidatePolicy::Reject).sample(&cases).unwrap();

    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].case_id, 11);
    assert!(outcome.controls.iter().all(|c| c.case_id == 10));
    assert_eq!(outcome.controls.len(), 8);
}
