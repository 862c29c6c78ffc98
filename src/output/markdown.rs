//! Markdown summary generation
//!
//! This module generates a human-readable markdown report of one run: the
//! totals, a per-season breakdown, the before/after diff and every failure.

use crate::output::summary::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# League Harvest Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status.to_db_string()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    if let Some(reason) = &summary.abort_reason {
        md.push_str(&format!("**Run aborted**: {}\n\n", reason));
    }
    if summary.nothing_to_do {
        md.push_str("The source listed no seasons; nothing to do.\n\n");
    }

    // Overall statistics
    let totals = &summary.totals;
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!(
        "- **Divisions Attempted**: {}\n",
        totals.divisions_attempted
    ));
    md.push_str(&format!(
        "- **Divisions Succeeded**: {}\n",
        totals.divisions_succeeded
    ));
    md.push_str(&format!("- **Divisions Failed**: {}\n", totals.divisions_failed));
    md.push_str(&format!("- **Teams Created**: {}\n", totals.teams_created));
    md.push_str(&format!("- **Teams Updated**: {}\n", totals.teams_updated));
    md.push_str(&format!("- **Teams Linked**: {}\n", summary.teams_linked));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    // Per-season breakdown
    if !summary.seasons.is_empty() {
        md.push_str("## Seasons\n\n");
        md.push_str("| Season | Attempted | Succeeded | Failed | Created | Updated | Note |\n");
        md.push_str("|--------|-----------|-----------|--------|---------|---------|------|\n");

        for season in &summary.seasons {
            let note = match (&season.discovery_error, season.no_divisions) {
                (Some(error), _) => format!("skipped: {}", error),
                (None, true) => "no divisions".to_string(),
                (None, false) => String::new(),
            };
            md.push_str(&format!(
                "| {} ({}) | {} | {} | {} | {} | {} | {} |\n",
                season.season_name,
                season.season_id,
                season.totals.divisions_attempted,
                season.totals.divisions_succeeded,
                season.totals.divisions_failed,
                season.totals.teams_created,
                season.totals.teams_updated,
                note
            ));
        }
        md.push('\n');
    }

    // Before/after diff
    let deltas = summary.season_deltas();
    if !deltas.is_empty() {
        md.push_str("## Stored Teams Before and After\n\n");
        md.push_str("| Season | Before | After | Change |\n");
        md.push_str("|--------|--------|-------|--------|\n");
        for delta in &deltas {
            md.push_str(&format!(
                "| {} | {} | {} | {:+} |\n",
                delta.season_id,
                delta.before,
                delta.after,
                delta.change()
            ));
        }
        md.push('\n');
    }

    // Failures
    let failures: Vec<_> = summary
        .seasons
        .iter()
        .flat_map(|season| season.failures.iter().map(move |f| (season, f)))
        .collect();

    if !failures.is_empty() {
        md.push_str("## Failed Divisions\n\n");
        for (season, failure) in failures {
            md.push_str(&format!(
                "- {} / {} ({}): {} (attempts: {})\n",
                season.season_id,
                failure.division_name,
                failure.division_id,
                failure.reason,
                failure.attempts
            ));
        }
        md.push('\n');
    }

    md
}
