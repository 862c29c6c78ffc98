//! Per-run counters and before/after snapshots
//!
//! The aggregator watches every step's outcome and builds the final
//! `RunSummary`. Its only contact with the store is through read-only count
//! queries.

use crate::model::{Division, Season};
use crate::output::{DivisionFailure, RunSummary, SeasonSummary};
use crate::storage::{ReconciliationStore, RunStatus, RunTotals, StorageResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Accumulates the outcome of one pipeline run
#[derive(Debug)]
pub struct RunAggregator {
    run_id: i64,
    config_hash: String,
    started_at: DateTime<Utc>,
    seasons: Vec<SeasonSummary>,
    before: BTreeMap<String, u64>,
    after: BTreeMap<String, u64>,
    nothing_to_do: bool,
    abort_reason: Option<String>,
}

impl RunAggregator {
    pub fn new(run_id: i64, config_hash: impl Into<String>) -> Self {
        Self {
            run_id,
            config_hash: config_hash.into(),
            started_at: Utc::now(),
            seasons: Vec::new(),
            before: BTreeMap::new(),
            after: BTreeMap::new(),
            nothing_to_do: false,
            abort_reason: None,
        }
    }

    fn season_mut(&mut self, season_id: &str) -> &mut SeasonSummary {
        let index = match self.seasons.iter().position(|s| s.season_id == season_id) {
            Some(index) => index,
            None => {
                self.seasons.push(SeasonSummary::new(season_id, season_id));
                self.seasons.len() - 1
            }
        };
        &mut self.seasons[index]
    }

    /// Opens the tally for a season; every discovered season gets one
    pub fn begin_season(&mut self, season: &Season) {
        self.season_mut(&season.id).season_name = season.name.clone();
    }

    pub fn record_discovery_failure(&mut self, season_id: &str, message: impl Into<String>) {
        self.season_mut(season_id).discovery_error = Some(message.into());
    }

    pub fn record_no_divisions(&mut self, season_id: &str) {
        self.season_mut(season_id).no_divisions = true;
    }

    pub fn record_success(&mut self, division: &Division, created: u32, updated: u32, linked: u32) {
        let season = self.season_mut(&division.season_id);
        season.totals.divisions_attempted += 1;
        season.totals.divisions_succeeded += 1;
        season.totals.teams_created += created;
        season.totals.teams_updated += updated;
        season.teams_linked += linked;
    }

    pub fn record_failure(&mut self, division: &Division, reason: impl Into<String>, attempts: u32) {
        let season = self.season_mut(&division.season_id);
        season.totals.divisions_attempted += 1;
        season.totals.divisions_failed += 1;
        season.failures.push(DivisionFailure {
            division_id: division.id.clone(),
            division_name: division.name.clone(),
            reason: reason.into(),
            attempts,
        });
    }

    pub fn record_nothing_to_do(&mut self) {
        self.nothing_to_do = true;
    }

    pub fn record_abort(&mut self, reason: impl Into<String>) {
        self.abort_reason = Some(reason.into());
    }

    /// Totals across every season seen so far
    pub fn totals(&self) -> RunTotals {
        let mut totals = RunTotals::default();
        for season in &self.seasons {
            totals.absorb(&season.totals);
        }
        totals
    }

    pub fn capture_before<S: ReconciliationStore + ?Sized>(&mut self, store: &S) -> StorageResult<()> {
        self.before = store.count_teams_by_season()?;
        Ok(())
    }

    pub fn capture_after<S: ReconciliationStore + ?Sized>(&mut self, store: &S) -> StorageResult<()> {
        self.after = store.count_teams_by_season()?;
        Ok(())
    }

    /// Team rows per season when the run started
    pub fn before_snapshot(&self) -> &BTreeMap<String, u64> {
        &self.before
    }

    /// Team rows per season when the run ended
    pub fn after_snapshot(&self) -> &BTreeMap<String, u64> {
        &self.after
    }

    /// Builds the final report
    pub fn summary(&self, status: RunStatus) -> RunSummary {
        let finished_at = Utc::now();
        let duration_seconds = (finished_at - self.started_at).num_seconds().max(0) as u64;

        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at.to_rfc3339(),
            finished_at: Some(finished_at.to_rfc3339()),
            duration_seconds: Some(duration_seconds),
            status,
            config_hash: self.config_hash.clone(),
            nothing_to_do: self.nothing_to_do,
            abort_reason: self.abort_reason.clone(),
            seasons: self.seasons.clone(),
            totals: self.totals(),
            teams_linked: self.seasons.iter().map(|s| s.teams_linked).sum(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}
