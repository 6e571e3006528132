//! End-to-end case-crossover batch
//!
//! Loads the case and climate tables, samples control dates, assembles the
//! strata, computes climate windows, joins them and writes the result.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use log::info;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::algorithm::climate::ClimateWindowEngine;
use crate::algorithm::covariate::{JoinedTable, MissingCovariateReport, left_join};
use crate::algorithm::crossover::assemble;
use crate::algorithm::referent::{ControlSampler, RejectedCase, SamplerConfig, SamplingOutcome};
use crate::config::StudyConfig;
use crate::error::{CrossoverError, Result};
use crate::models::{CaseRecord, ClimateObservation};
use crate::reader::{load_cases, load_climate};
use crate::writer::{stage_control_assignments, stage_json, stage_table, to_record_batch};

/// In-memory result of the pipeline stages
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Seed actually used for sampling
    pub seed: u64,
    pub sampling: SamplingOutcome,
    pub table: JoinedTable,
}

impl PipelineOutput {
    /// Number of strata (case rows) in the joined table
    #[must_use]
    pub fn stratum_count(&self) -> usize {
        self.table.rows.iter().filter(|r| r.row.is_case).count()
    }
}

/// Summary of a completed run, optionally written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub cases_loaded: usize,
    pub cases_sampled: usize,
    pub rejected_cases: Vec<RejectedCase>,
    pub controls_per_case: usize,
    pub strata: usize,
    pub rows: usize,
    pub climate_observations: usize,
    pub covariate_columns: Vec<String>,
    pub missing_covariates: MissingCovariateReport,
    pub output_path: PathBuf,
    pub elapsed_seconds: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Case-Crossover Summary:")?;
        writeln!(f, "  Seed: {}", self.seed)?;
        writeln!(f, "  Cases Loaded: {}", self.cases_loaded)?;
        writeln!(f, "  Cases Sampled: {}", self.cases_sampled)?;
        if !self.rejected_cases.is_empty() {
            writeln!(f, "  Cases Rejected: {}", self.rejected_cases.len())?;
        }
        writeln!(
            f,
            "  Strata: {} (1 case + {} controls)",
            self.strata, self.controls_per_case
        )?;
        writeln!(f, "  Rows: {}", self.rows)?;
        writeln!(f, "  Climate Observations: {}", self.climate_observations)?;
        writeln!(
            f,
            "  Rows Without Climate: {}",
            self.missing_covariates.rows_without_climate
        )?;
        writeln!(f, "  Output: {}", self.output_path.display())?;
        writeln!(f, "  Elapsed: {:.2}s", self.elapsed_seconds)?;
        Ok(())
    }
}

/// Orchestrates a case-crossover run for one configuration
#[derive(Debug, Clone)]
pub struct CaseCrossoverPipeline {
    config: StudyConfig,
}

impl CaseCrossoverPipeline {
    /// Create a pipeline for a validated configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid
    pub fn new(config: StudyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Run every in-memory stage on already loaded inputs
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` for a case without a spatial unit or with a
    /// repeated id, and propagates sampling, assembly and climate window
    /// errors; nothing is produced on failure
    pub fn build(
        &self,
        cases: &[CaseRecord],
        climate: &[ClimateObservation],
    ) -> Result<PipelineOutput> {
        validate_cases(cases)?;
        let config = &self.config;
        let seed = SamplerConfig::resolve_seed(config.random_seed);

        let sampler = ControlSampler::new(SamplerConfig {
            controls_per_case: config.controls_per_case,
            scheme: config.scheme,
            seed,
            policy: config.insufficient_candidates,
            use_parallel: config.use_parallel,
        });
        let sampling = sampler.sample(cases)?;

        let excluded: FxHashSet<i64> = sampling.rejected.iter().map(|r| r.case_id).collect();
        let crossover = assemble(cases, &sampling.controls, config.controls_per_case, &excluded)?;

        let engine = ClimateWindowEngine::new(config.covariates.clone(), config.window_days)?
            .with_parallel(config.use_parallel);
        let windows = engine.compute(climate)?;

        let table = left_join(&crossover, &windows);
        table.report.log_warnings();

        Ok(PipelineOutput {
            seed,
            sampling,
            table,
        })
    }

    /// Run the whole batch: load, build and write
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; outputs are staged and only renamed
    /// into place once every stage and every staged write has succeeded
    pub fn run(&self) -> Result<RunSummary> {
        let threads = self.config.threads.unwrap_or_else(num_cpus::get);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| CrossoverError::Config(format!("Failed to start {threads} worker threads: {e}")))?;

        info!("Starting case-crossover run with {threads} worker threads");
        info!("{}", self.config);

        pool.install(|| self.run_stages())
    }

    fn run_stages(&self) -> Result<RunSummary> {
        let start_time = Instant::now();
        let config = &self.config;

        let cases = load_cases(&config.cases_path, config.year_range.as_ref())?;
        let climate = load_climate(&config.climate_path)?;

        let output = self.build(&cases, &climate)?;
        let delimiter = config.delimiter_byte()?;

        let batch = to_record_batch(&output.table)?;
        let main_output = stage_table(&config.output_path, &batch, delimiter)?;

        let controls = config
            .controls_path
            .as_ref()
            .map(|path| stage_control_assignments(path, &output.sampling.controls, delimiter))
            .transpose()?;

        let summary = RunSummary {
            seed: output.seed,
            cases_loaded: cases.len(),
            cases_sampled: output.sampling.sampled_case_count(),
            rejected_cases: output.sampling.rejected.clone(),
            controls_per_case: config.controls_per_case,
            strata: output.stratum_count(),
            rows: output.table.len(),
            climate_observations: climate.len(),
            covariate_columns: output.table.covariate_columns.clone(),
            missing_covariates: output.table.report.clone(),
            output_path: config.output_path.clone(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };

        let report = config
            .report_path
            .as_ref()
            .map(|path| stage_json(path, &summary))
            .transpose()?;

        // The main table is committed last so it only appears if every other
        // output is in place.
        for staged in controls.into_iter().chain(report) {
            staged.commit()?;
        }
        main_output.commit()?;

        info!("{summary}");
        Ok(summary)
    }
}

/// Check the case record invariants for cases that did not come through the
/// reader
fn validate_cases(cases: &[CaseRecord]) -> Result<()> {
    let mut seen: FxHashSet<i64> = FxHashSet::default();
    for (i, case) in cases.iter().enumerate() {
        if case.spatial_unit.trim().is_empty() {
            return Err(CrossoverError::malformed_row(
                "cases",
                i + 1,
                format!("case {} has no spatial_unit", case.id),
            ));
        }
        if !seen.insert(case.id) {
            return Err(CrossoverError::malformed_row(
                "cases",
                i + 1,
                format!("duplicate case id {}", case.id),
            ));
        }
    }
    Ok(())
}
