//! textpipe - Main Entry Point
//!
//! Runs the pipeline described by the file given as the first argument and
//! prints the run report as JSON.

use anyhow::{bail, Context};
use textpipe::{config::PipelineConfig, pipeline::PipelineBuilder};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,textpipe=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: textpipe <pipeline.toml|pipeline.json>");
    };

    tracing::info!("Starting textpipe with {}", path);
    let config = PipelineConfig::load(&path)
        .with_context(|| format!("Failed to load pipeline description {}", path))?;
    let pipeline = PipelineBuilder::from_config(config).context("Failed to assemble pipeline")?;
    let report = pipeline.run().context("Failed to start pipeline")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_success() {
        for failure in report.failures() {
            tracing::error!("Module '{}' did not succeed: {:?}", failure.name, failure.outcome);
        }
        bail!("{} module(s) failed", report.failures().count());
    }
    tracing::info!("Pipeline finished successfully");
    Ok(())
}
