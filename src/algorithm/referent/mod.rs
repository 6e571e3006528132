//! Time-stratified referent selection
//!
//! This module implements the referent (control period) side of the
//! case-crossover design:
//!
//! 1. Classification of each case by its position within the month
//! 2. Candidate window generation per class
//! 3. Seeded, per-case sampling of control dates
//!
//! Each case draws from its own random stream keyed by case id, so results
//! do not depend on processing order or parallelism.

pub mod classifier;
pub mod sampler;
pub mod window;

use serde::{Deserialize, Serialize};

pub use classifier::{ReferentClass, ReferentPosition, classify};
pub use sampler::{CandidatePolicy, ControlSampler, RejectedCase, SamplerConfig, SamplingOutcome};
pub use window::{Candidates, SteppedWindow, candidate_dates};

/// Constants of the referent window scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferentScheme {
    /// Days from either month boundary within which a case is START or END
    pub boundary_days: u32,
    /// Minimum distance in days between a control and the case date
    pub min_offset_days: i64,
    /// Spacing in days between consecutive candidate dates
    pub step_days: i64,
}

impl Default for ReferentScheme {
    fn default() -> Self {
        Self {
            boundary_days: 4,
            min_offset_days: 4,
            step_days: 3,
        }
    }
}
