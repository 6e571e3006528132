use std::process::ExitCode;

use anyhow::{Context, Result};
use case_crossover::cli::Cli;
use case_crossover::{CaseCrossoverPipeline, CrossoverError, RunSummary};
use clap::Parser;
use log::error;

fn run(cli: Cli) -> Result<RunSummary> {
    let config = cli.into_config().context("Failed to resolve configuration")?;
    let pipeline = CaseCrossoverPipeline::new(config)?;
    let summary = pipeline
        .run()
        .with_context(|| format!("Case-crossover run failed for {}", pipeline.config().cases_path.display()))?;
    Ok(summary)
}

fn main() -> ExitCode {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            // Bad input data is distinguished from configuration and IO failures
            let input_error = e
                .downcast_ref::<CrossoverError>()
                .is_some_and(CrossoverError::is_input_error);
            ExitCode::from(if input_error { 2 } else { 1 })
        }
    }
}
