//! Command-line interface definitions

use std::path::PathBuf;

use clap::Parser;

use crate::algorithm::climate::WindowSpec;
use crate::config::{CandidatePolicy, StudyConfig, YearRange};
use crate::error::Result;

#[derive(Debug, Parser)]
#[command(
    name = "case-crossover",
    version,
    about = "Build a time-stratified case-crossover dataset with trailing climate covariates",
    long_about = "Build a time-stratified case-crossover dataset.\n\n\
                  Each case is paired with control dates from the same month, and every \
                  row is joined to trailing-window climate aggregates of its spatial unit."
)]
pub struct Cli {
    /// Case table file, or directory of yearly case files
    #[arg(long, value_name = "PATH")]
    pub cases: Option<PathBuf>,

    /// Daily climate table file
    #[arg(long, value_name = "PATH")]
    pub climate: Option<PathBuf>,

    /// Output table (.parquet writes Parquet, anything else delimited text)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// JSON configuration file; flags given here override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Export the sampled control dates to this file
    #[arg(long = "controls-output", value_name = "PATH")]
    pub controls_output: Option<PathBuf>,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Control dates per case
    #[arg(short = 'n', long = "controls", value_name = "N")]
    pub controls_per_case: Option<usize>,

    /// Trailing window size in days
    #[arg(short = 'w', long = "window", value_name = "DAYS")]
    pub window_days: Option<usize>,

    /// Random seed for control sampling
    #[arg(long, env = "CASE_CROSSOVER_SEED", value_name = "SEED")]
    pub seed: Option<u64>,

    /// What to do with cases whose window has too few candidate dates
    #[arg(long = "on-insufficient", value_name = "abort|reject")]
    pub on_insufficient: Option<CandidatePolicy>,

    /// Trailing aggregate as covariate:aggregation[:lag], e.g. precip:sum or tmax:mean:2
    #[arg(long = "covariate", value_name = "SPEC")]
    pub covariates: Vec<WindowSpec>,

    /// First year of yearly case files to load
    #[arg(long = "year-start", value_name = "YEAR", requires = "year_end")]
    pub year_start: Option<i32>,

    /// Last year of yearly case files to load
    #[arg(long = "year-end", value_name = "YEAR", requires = "year_start")]
    pub year_end: Option<i32>,

    /// Field delimiter of delimited-text output
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Disable parallel processing
    #[arg(long)]
    pub sequential: bool,
}

impl Cli {
    /// Resolve the run configuration: defaults, then config file, then flags
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the merged
    /// configuration is invalid
    pub fn into_config(self) -> Result<StudyConfig> {
        let mut config = match &self.config {
            Some(path) => StudyConfig::from_json_file(path)?,
            None => StudyConfig::default(),
        };

        if let Some(path) = self.cases {
            config.cases_path = path;
        }
        if let Some(path) = self.climate {
            config.climate_path = path;
        }
        if let Some(path) = self.output {
            config.output_path = path;
        }
        if self.controls_output.is_some() {
            config.controls_path = self.controls_output;
        }
        if self.report.is_some() {
            config.report_path = self.report;
        }
        if let Some(n) = self.controls_per_case {
            config.controls_per_case = n;
        }
        if let Some(days) = self.window_days {
            config.window_days = days;
        }
        if self.seed.is_some() {
            config.random_seed = self.seed;
        }
        if let Some(policy) = self.on_insufficient {
            config.insufficient_candidates = policy;
        }
        if !self.covariates.is_empty() {
            config.covariates = self.covariates;
        }
        if let (Some(start), Some(end)) = (self.year_start, self.year_end) {
            config.year_range = Some(YearRange::new(start, end));
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.sequential {
            config.use_parallel = false;
        }

        config.validate()?;
        Ok(config)
    }
}
