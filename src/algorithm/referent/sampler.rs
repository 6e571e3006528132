//! Control date sampling
//!
//! Draws a fixed number of control dates per case, uniformly without
//! replacement from the case's candidate window.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::NaiveDate;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::classifier::{ReferentClass, ReferentPosition};
use super::window::candidate_dates;
use super::ReferentScheme;
use crate::error::{CrossoverError, Result};
use crate::models::{CaseRecord, ControlDate};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar};

/// Sampled dates for one case
pub type Controls = SmallVec<[NaiveDate; 8]>;

/// What to do with a case whose window cannot supply enough controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidatePolicy {
    /// Fail the whole run, naming the first offending case
    #[default]
    Abort,
    /// Drop the case (and its stratum) and continue
    Reject,
}

impl fmt::Display for CandidatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for CandidatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "reject" => Ok(Self::Reject),
            other => Err(format!("Unknown candidate policy '{other}' (expected abort or reject)")),
        }
    }
}

/// Configuration for the control sampler
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of controls per case
    pub controls_per_case: usize,
    /// Referent window constants
    pub scheme: ReferentScheme,
    /// Base seed; each case derives its own stream from it
    pub seed: u64,
    /// Handling of cases with too few candidates
    pub policy: CandidatePolicy,
    /// Whether to use parallel processing for large case tables
    pub use_parallel: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            controls_per_case: 5,
            scheme: ReferentScheme::default(),
            seed: 0,
            policy: CandidatePolicy::Abort,
            use_parallel: true,
        }
    }
}

impl SamplerConfig {
    /// Use the configured seed, or draw one from OS entropy
    #[must_use]
    pub fn resolve_seed(seed: Option<u64>) -> u64 {
        seed.unwrap_or_else(|| {
            let drawn = rand::random::<u64>();
            info!("No random seed configured; drew seed {drawn} (pass it back to reproduce this run)");
            drawn
        })
    }
}

/// Controls drawn for one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledCase {
    pub case_id: i64,
    pub class: ReferentClass,
    /// Control dates, ascending
    pub dates: Controls,
}

/// A case dropped under the reject policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedCase {
    pub case_id: i64,
    pub infection_date: NaiveDate,
    pub class: ReferentClass,
    /// Candidate dates its window offered
    pub available: usize,
}

/// Result of sampling a whole case table
#[derive(Debug, Clone, Default)]
pub struct SamplingOutcome {
    /// Control dates in case input order, ascending within a case
    pub controls: Vec<ControlDate>,
    /// Cases excluded under the reject policy
    pub rejected: Vec<RejectedCase>,
    /// Number of cases per referent class among sampled cases
    pub class_counts: FxHashMap<ReferentClass, usize>,
}

impl SamplingOutcome {
    /// Number of cases that received controls
    #[must_use]
    pub fn sampled_case_count(&self) -> usize {
        self.class_counts.values().sum()
    }
}

/// SplitMix64 finaliser
const fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed of the random stream used for one case
#[must_use]
pub const fn stream_seed(base_seed: u64, case_id: i64) -> u64 {
    splitmix64(base_seed ^ splitmix64(case_id as u64))
}

/// Sampler for control dates
#[derive(Debug)]
pub struct ControlSampler {
    config: SamplerConfig,
}

impl ControlSampler {
    // Threshold for switching to parallel processing
    const PARALLEL_THRESHOLD: usize = 1000;

    /// Create a new sampler with the given configuration
    #[must_use]
    pub const fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// The sampler's configuration
    #[must_use]
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draw the control dates for a single case
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCandidates` if the case's window offers fewer
    /// distinct dates than `controls_per_case`
    pub fn sample_case(&self, case: &CaseRecord) -> Result<SampledCase> {
        let scheme = &self.config.scheme;
        let required = self.config.controls_per_case;

        let position = ReferentPosition::of(case.infection_date, scheme);
        let mut candidates = candidate_dates(&position, scheme);

        if candidates.len() < required {
            return Err(CrossoverError::InsufficientCandidates {
                case_id: case.id,
                infection_date: case.infection_date,
                class: position.class,
                available: candidates.len(),
                required,
            });
        }

        let mut rng = StdRng::seed_from_u64(stream_seed(self.config.seed, case.id));
        let (chosen, _) = candidates.partial_shuffle(&mut rng, required);

        let mut dates: Controls = chosen.iter().copied().collect();
        dates.sort_unstable();

        Ok(SampledCase {
            case_id: case.id,
            class: position.class,
            dates,
        })
    }

    /// Sample control dates for every case
    ///
    /// # Arguments
    ///
    /// * `cases` - Validated case records
    ///
    /// # Returns
    ///
    /// Control dates for all sampled cases plus the cases rejected under
    /// [`CandidatePolicy::Reject`]
    pub fn sample(&self, cases: &[CaseRecord]) -> Result<SamplingOutcome> {
        let start_time = Instant::now();

        info!(
            "Sampling {} controls for each of {} cases (seed {})",
            self.config.controls_per_case,
            cases.len(),
            self.config.seed
        );

        let pb = create_main_progress_bar(cases.len() as u64, Some("Sampling control dates"));

        // Use parallel or sequential sampling based on configuration and dataset size
        let use_parallel = self.config.use_parallel && cases.len() >= Self::PARALLEL_THRESHOLD;

        let results: Vec<Result<SampledCase>> = if use_parallel {
            info!(
                "Using parallel processing with {} threads",
                rayon::current_num_threads()
            );
            cases
                .par_iter()
                .map(|case| {
                    let result = self.sample_case(case);
                    pb.inc(1);
                    result
                })
                .collect()
        } else {
            cases
                .iter()
                .map(|case| {
                    let result = self.sample_case(case);
                    pb.inc(1);
                    result
                })
                .collect()
        };

        finish_progress_bar(&pb, Some("Sampling complete"));

        let mut outcome = SamplingOutcome {
            controls: Vec::with_capacity(cases.len() * self.config.controls_per_case),
            ..SamplingOutcome::default()
        };

        // Fold in input order so the first failure reported is deterministic
        for (case, result) in cases.iter().zip(results) {
            match result {
                Ok(sampled) => {
                    *outcome.class_counts.entry(sampled.class).or_insert(0) += 1;
                    outcome.controls.extend(sampled.dates.iter().map(|&date| ControlDate {
                        case_id: sampled.case_id,
                        date,
                    }));
                }
                Err(CrossoverError::InsufficientCandidates {
                    class, available, ..
                }) if self.config.policy == CandidatePolicy::Reject => {
                    warn!(
                        "Rejecting case {} ({}, {class}): only {available} candidate dates",
                        case.id, case.infection_date
                    );
                    outcome.rejected.push(RejectedCase {
                        case_id: case.id,
                        infection_date: case.infection_date,
                        class,
                        available,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        for (class, count) in &outcome.class_counts {
            debug!("{count} cases classified as {class}");
        }

        info!(
            "Sampled {} control dates for {} cases in {:.2?} ({} rejected)",
            outcome.controls.len(),
            outcome.sampled_case_count(),
            start_time.elapsed(),
            outcome.rejected.len()
        );

        Ok(outcome)
    }
}
