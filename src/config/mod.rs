//! Study configuration
//!
//! A [`StudyConfig`] is built from defaults, optionally overlaid by a JSON
//! config file, and finally by command-line flags (see [`crate::cli`]).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::algorithm::climate::{WindowSpec, default_specs};
use crate::algorithm::referent::ReferentScheme;
use crate::error::{CrossoverError, Result};

pub use crate::algorithm::referent::CandidatePolicy;

/// Inclusive range of years used to select yearly case files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    #[must_use]
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Whether a year falls within the range
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Configuration of a case-crossover run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Case table file, or directory of yearly case files
    pub cases_path: PathBuf,
    /// Daily climate table file
    pub climate_path: PathBuf,
    /// Output table; `.parquet` selects Parquet, anything else delimited text
    pub output_path: PathBuf,
    /// Optional export of the sampled control dates
    pub controls_path: Option<PathBuf>,
    /// Optional JSON run summary
    pub report_path: Option<PathBuf>,
    /// Years of case files to load from a directory
    pub year_range: Option<YearRange>,
    /// Number of control dates per case (N)
    pub controls_per_case: usize,
    /// Trailing window size in days (W)
    pub window_days: usize,
    /// Trailing aggregates attached to every row
    pub covariates: Vec<WindowSpec>,
    /// Base seed for control sampling
    pub random_seed: Option<u64>,
    /// Handling of cases with too few candidate dates
    pub insufficient_candidates: CandidatePolicy,
    /// Referent window constants
    pub scheme: ReferentScheme,
    /// Delimiter of delimited-text output
    pub delimiter: char,
    /// Whether to use parallel processing
    pub use_parallel: bool,
    /// Worker threads, defaults to the number of CPUs
    pub threads: Option<usize>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            cases_path: PathBuf::new(),
            climate_path: PathBuf::new(),
            output_path: PathBuf::new(),
            controls_path: None,
            report_path: None,
            year_range: None,
            controls_per_case: 5,
            window_days: 7,
            covariates: default_specs(),
            random_seed: None,
            insufficient_candidates: CandidatePolicy::Abort,
            scheme: ReferentScheme::default(),
            delimiter: ',',
            use_parallel: true,
            threads: None,
        }
    }
}

impl StudyConfig {
    /// Create a builder starting from defaults
    #[must_use]
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder::new()
    }

    /// Load a configuration from a JSON file; absent fields take defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CrossoverError::io(path, e))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Output delimiter as a byte
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-ASCII delimiters
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                CrossoverError::Config(format!(
                    "Delimiter '{}' must be a single ASCII character",
                    self.delimiter
                ))
            })
    }

    /// Check the configuration before any data is read
    ///
    /// # Errors
    ///
    /// Returns `CrossoverError::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(CrossoverError::Config(message));

        for (name, path) in [
            ("cases_path", &self.cases_path),
            ("climate_path", &self.climate_path),
            ("output_path", &self.output_path),
        ] {
            if path.as_os_str().is_empty() {
                return fail(format!("{name} must be set"));
            }
        }
        if self.controls_per_case == 0 {
            return fail("controls_per_case must be at least 1".to_string());
        }
        if self.window_days == 0 {
            return fail("window_days must be at least 1".to_string());
        }
        if self.scheme.step_days <= 0 {
            return fail("scheme.step_days must be positive".to_string());
        }
        if self.scheme.min_offset_days < 1 {
            return fail("scheme.min_offset_days must be at least 1".to_string());
        }
        if let Some(range) = self.year_range {
            if range.start > range.end {
                return fail(format!("year range {range} is inverted"));
            }
        }
        if self.threads == Some(0) {
            return fail("threads must be at least 1".to_string());
        }
        let mut columns = FxHashSet::default();
        for spec in &self.covariates {
            let column = spec.column_name(self.window_days);
            if !columns.insert(column.clone()) {
                return fail(format!("covariate {spec} is listed more than once (column {column})"));
            }
        }
        self.delimiter_byte()?;
        Ok(())
    }
}

impl fmt::Display for StudyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Study Configuration:")?;
        writeln!(f, "  Cases: {}", self.cases_path.display())?;
        if let Some(range) = self.year_range {
            writeln!(f, "  Case Years: {range}")?;
        }
        writeln!(f, "  Climate: {}", self.climate_path.display())?;
        writeln!(f, "  Output: {}", self.output_path.display())?;
        writeln!(f, "  Controls per Case: {}", self.controls_per_case)?;
        writeln!(f, "  Window: {} days", self.window_days)?;
        let covariates: Vec<String> = self.covariates.iter().map(ToString::to_string).collect();
        writeln!(f, "  Covariates: {}", covariates.join(", "))?;
        match self.random_seed {
            Some(seed) => writeln!(f, "  Random Seed: {seed}")?,
            None => writeln!(f, "  Random Seed: drawn at startup")?,
        }
        writeln!(f, "  Insufficient Candidates: {}", self.insufficient_candidates)?;
        writeln!(
            f,
            "  Referent Scheme: boundary {}d, offset {}d, step {}d",
            self.scheme.boundary_days, self.scheme.min_offset_days, self.scheme.step_days
        )?;
        Ok(())
    }
}

/// Builder for constructing a study configuration
#[derive(Debug, Clone, Default)]
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one loaded from a file
    #[must_use]
    pub const fn from_config(config: StudyConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn cases_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cases_path = path.into();
        self
    }

    #[must_use]
    pub fn climate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.climate_path = path.into();
        self
    }

    #[must_use]
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    #[must_use]
    pub fn controls_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.controls_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report_path = Some(path.into());
        self
    }

    #[must_use]
    pub const fn year_range(mut self, start: i32, end: i32) -> Self {
        self.config.year_range = Some(YearRange::new(start, end));
        self
    }

    /// Set the number of controls per case
    #[must_use]
    pub const fn controls_per_case(mut self, n: usize) -> Self {
        self.config.controls_per_case = n;
        self
    }

    /// Set the trailing window size in days
    #[must_use]
    pub const fn window_days(mut self, days: usize) -> Self {
        self.config.window_days = days;
        self
    }

    /// Replace the covariate specifications
    #[must_use]
    pub fn covariates(mut self, specs: Vec<WindowSpec>) -> Self {
        self.config.covariates = specs;
        self
    }

    #[must_use]
    pub const fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn insufficient_candidates(mut self, policy: CandidatePolicy) -> Self {
        self.config.insufficient_candidates = policy;
        self
    }

    #[must_use]
    pub const fn scheme(mut self, scheme: ReferentScheme) -> Self {
        self.config.scheme = scheme;
        self
    }

    #[must_use]
    pub const fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn use_parallel(mut self, use_parallel: bool) -> Self {
        self.config.use_parallel = use_parallel;
        self
    }

    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails
    pub fn build(self) -> Result<StudyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
