//! A Rust library for building time-stratified case-crossover datasets from
//! case tables and daily climate observations.
//!
//! Each confirmed case is paired with control dates drawn from the same
//! calendar month, and every case and control row is joined to trailing
//! climate aggregates of its spatial unit.

pub mod algorithm;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod utils;
pub mod writer;

// Re-export the most common types for easier use
// Core types
pub use config::{CandidatePolicy, StudyConfig, StudyConfigBuilder, YearRange};
pub use error::{CrossoverError, Result};
pub use models::{CaseRecord, ClimateObservation, ControlDate, CrossoverRow};
pub use pipeline::{CaseCrossoverPipeline, PipelineOutput, RunSummary};

// Algorithm components
pub use algorithm::climate::{Aggregation, ClimateWindowEngine, ClimateWindowTable, Covariate, WindowSpec};
pub use algorithm::covariate::{JoinedTable, MissingCovariateReport, left_join};
pub use algorithm::crossover::{CrossoverSet, assemble};
pub use algorithm::referent::{
    ControlSampler, ReferentClass, ReferentScheme, SamplerConfig, SamplingOutcome, candidate_dates, classify,
};

// Input and output
pub use reader::{load_cases, load_climate, read_table};
pub use writer::{StagedFile, to_record_batch, write_control_assignments, write_table};

// Arrow types
pub use arrow::record_batch::RecordBatch;
