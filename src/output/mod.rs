//! Output module for run summaries and store reports
//!
//! This module handles:
//! - The `RunSummary` produced at the end of every run
//! - Printing it to the console and writing it as markdown
//! - Store-wide statistics for `--stats`

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use summary::{
    DivisionFailure, OutputError, OutputResult, RunSummary, SeasonDelta, SeasonSummary,
};

/// Prints a run summary to stdout
///
/// Every season the run touched is listed, even when all of its divisions
/// failed or it was skipped.
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Harvest Run {} ===\n", summary.run_id);
    println!("Status: {}", summary.status.to_db_string());
    if let Some(reason) = &summary.abort_reason {
        println!("Aborted: {}", reason);
    }
    if summary.nothing_to_do {
        println!("The source listed no seasons; nothing to do.");
    }
    println!();

    for season in &summary.seasons {
        let totals = &season.totals;
        print!(
            "  {} ({}): {} attempted, {} succeeded, {} failed; {} created, {} updated",
            season.season_name,
            season.season_id,
            totals.divisions_attempted,
            totals.divisions_succeeded,
            totals.divisions_failed,
            totals.teams_created,
            totals.teams_updated
        );
        if let Some(error) = &season.discovery_error {
            print!(" [skipped: {}]", error);
        } else if season.no_divisions {
            print!(" [no divisions]");
        }
        println!();

        for failure in &season.failures {
            println!(
                "    - {} ({}): {}",
                failure.division_name, failure.division_id, failure.reason
            );
        }
    }
    if !summary.seasons.is_empty() {
        println!();
    }

    let totals = &summary.totals;
    println!(
        "Total: {} attempted, {} succeeded, {} failed ({:.1}% success)",
        totals.divisions_attempted,
        totals.divisions_succeeded,
        totals.divisions_failed,
        summary.success_rate()
    );
    println!(
        "Teams: {} created, {} updated, {} linked to identities",
        totals.teams_created, totals.teams_updated, summary.teams_linked
    );

    let deltas = summary.season_deltas();
    if !deltas.is_empty() {
        println!("\nStored teams (before -> after):");
        for delta in deltas {
            println!(
                "  {}: {} -> {} ({:+})",
                delta.season_id,
                delta.before,
                delta.after,
                delta.change()
            );
        }
    }
}
