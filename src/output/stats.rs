//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying what the
//! store currently holds, independent of any single run.

use crate::storage::{ReconciliationStore, RunRecord, SeasonDivisionCount, StorageResult};
use std::collections::BTreeMap;

/// How many recent runs `--stats` lists
const RECENT_RUNS: usize = 5;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total scraped team rows
    pub total_teams: u64,

    /// Rows without an identity link
    pub unresolved_teams: u64,

    /// Rows per season id
    pub teams_by_season: BTreeMap<String, u64>,

    /// Rows per division label
    pub teams_by_division: BTreeMap<String, u64>,

    /// Rows per (season, division label)
    pub teams_by_season_and_division: Vec<SeasonDivisionCount>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics<S: ReconciliationStore + ?Sized>(
    storage: &S,
) -> StorageResult<HarvestStatistics> {
    Ok(HarvestStatistics {
        total_teams: storage.count_total_teams()?,
        unresolved_teams: storage.list_unresolved_teams()?.len() as u64,
        teams_by_season: storage.count_teams_by_season()?,
        teams_by_division: storage.count_teams_by_division()?,
        teams_by_season_and_division: storage.count_teams_by_season_and_division()?,
        recent_runs: storage.latest_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Scraped team rows: {}", stats.total_teams);
    println!("  Without identity: {}", stats.unresolved_teams);
    println!();

    if !stats.teams_by_season.is_empty() {
        println!("Teams by Season:");
        for (season, count) in &stats.teams_by_season {
            println!("  {}: {}", season, count);
        }
        println!();
    }

    if !stats.teams_by_division.is_empty() {
        println!("Teams by Division:");
        // Largest divisions first
        let mut divisions: Vec<_> = stats.teams_by_division.iter().collect();
        divisions.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (division, count) in divisions {
            let percentage = if stats.total_teams > 0 {
                (*count as f64 / stats.total_teams as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", division, count, percentage);
        }
        println!();
    }

    if !stats.teams_by_season_and_division.is_empty() {
        println!("Teams by Season and Division:");
        for row in &stats.teams_by_season_and_division {
            println!("  {} / {}: {}", row.season_id, row.division_label, row.teams);
        }
        println!();
    }

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            println!(
                "  #{} {} [{}] divisions {}/{} ok, teams +{} ~{}",
                run.id,
                run.started_at,
                run.status.to_db_string(),
                run.totals.divisions_succeeded,
                run.totals.divisions_attempted,
                run.totals.teams_created,
                run.totals.teams_updated
            );
        }
    }
}
