//! Run summary types
//!
//! A `RunSummary` is built once per run by the aggregator and rendered by the
//! console printer and the markdown writer. It is never persisted as a whole;
//! only its totals land in the `runs` table.

use crate::storage::{RunStatus, RunTotals};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A division whose scrape or reconciliation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionFailure {
    pub division_id: String,
    pub division_name: String,
    pub reason: String,
    pub attempts: u32,
}

/// What one season contributed to the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonSummary {
    pub season_id: String,
    pub season_name: String,
    pub totals: RunTotals,

    /// Newly created rows linked to an existing identity
    pub teams_linked: u32,

    /// Set when the division listing failed and the season was skipped
    pub discovery_error: Option<String>,

    /// The season listed no divisions
    pub no_divisions: bool,

    pub failures: Vec<DivisionFailure>,
}

impl SeasonSummary {
    pub fn new(season_id: impl Into<String>, season_name: impl Into<String>) -> Self {
        Self {
            season_id: season_id.into(),
            season_name: season_name.into(),
            totals: RunTotals::default(),
            teams_linked: 0,
            discovery_error: None,
            no_divisions: false,
            failures: Vec::new(),
        }
    }

    /// Returns true if the season was skipped before any division ran
    pub fn was_skipped(&self) -> bool {
        self.discovery_error.is_some() || self.no_divisions
    }
}

/// Team counts for one season before and after the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonDelta<'a> {
    pub season_id: &'a str,
    pub before: u64,
    pub after: u64,
}

impl SeasonDelta<'_> {
    pub fn change(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: RunStatus,
    pub config_hash: String,

    /// The source listed no seasons
    pub nothing_to_do: bool,

    /// Why the run stopped early, for aborted runs
    pub abort_reason: Option<String>,

    // Per-season and overall counts
    pub seasons: Vec<SeasonSummary>,
    pub totals: RunTotals,
    pub teams_linked: u32,

    // Teams per season id, taken before and after the run
    pub before: BTreeMap<String, u64>,
    pub after: BTreeMap<String, u64>,
}

impl RunSummary {
    pub fn is_aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }

    /// Returns the share of attempted divisions that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.totals.divisions_attempted == 0 {
            return 0.0;
        }
        (self.totals.divisions_succeeded as f64 / self.totals.divisions_attempted as f64) * 100.0
    }

    /// Before/after team counts for every season present in either snapshot
    pub fn season_deltas(&self) -> Vec<SeasonDelta<'_>> {
        let seasons: BTreeSet<&String> = self.before.keys().chain(self.after.keys()).collect();

        seasons
            .into_iter()
            .map(|season_id| SeasonDelta {
                season_id,
                before: self.before.get(season_id).copied().unwrap_or(0),
                after: self.after.get(season_id).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Total team rows added by this run according to the snapshots
    pub fn net_new_teams(&self) -> i64 {
        self.after.values().sum::<u64>() as i64 - self.before.values().sum::<u64>() as i64
    }
}
