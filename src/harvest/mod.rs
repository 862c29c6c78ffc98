//! Harvest orchestration
//!
//! This module contains the parts of a run that sit between the source and
//! the store:
//! - `Scheduler`: paced, one-at-a-time scrape dispatch with retries
//! - `RunAggregator`: per-season counters and before/after snapshots
//! - `Pipeline`: the run loop and its phase machine

mod aggregator;
mod pipeline;
mod scheduler;

pub use aggregator::RunAggregator;
pub use pipeline::Pipeline;
pub use scheduler::{Dispatch, ScrapeTask, Scheduler};

use crate::config::Config;
use crate::output::{generate_markdown_summary, RunSummary};
use crate::source::HttpConnector;
use crate::HarvestError;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Runs one harvest against the configured source and database
///
/// Writes the markdown summary when `output.summary-path` is set. A failure
/// to write it is logged and does not fail the run.
pub async fn run_harvest(
    config: &Config,
    config_hash: &str,
    cancel: &CancellationToken,
) -> Result<RunSummary, HarvestError> {
    let mut pipeline = Pipeline::open(config)?.with_config_hash(config_hash);
    let connector = HttpConnector::new(config)?;

    let summary = pipeline.run(&connector, cancel).await?;

    if let Some(path) = &config.output.summary_path {
        match generate_markdown_summary(&summary, Path::new(path)) {
            Ok(()) => tracing::info!("Summary written to {}", path),
            Err(e) => tracing::warn!("Failed to write summary to {}: {}", path, e),
        }
    }

    Ok(summary)
}
