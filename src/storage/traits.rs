//! Storage traits and error types
//!
//! This module defines the trait interface for the reconciliation store and
//! associated error types.

use crate::model::{LeagueTableRow, NaturalKey};
use crate::storage::{
    DivisionScope, KeyPrefix, ReconcileCounts, RunRecord, RunStatus, RunTotals,
    ScrapedTeamRecord, SeasonDivisionCount, TeamIdentity, Upserted,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Scraped team not found: {0}")]
    TeamNotFound(i64),

    #[error("Team identity not found: {0}")]
    IdentityNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the reconciliation store
///
/// Every write goes through the natural key; a key collision resolves to an
/// update and never surfaces as an error to the caller.
pub trait ReconciliationStore {
    // ===== Run Management =====

    /// Creates a new run record in the `running` state
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Stamps a run with its final status and counters
    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals)
        -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Scraped Teams =====

    /// Inserts a row for the natural key, or refreshes the existing one
    ///
    /// A fresh row starts active. An existing row is marked active and its
    /// `updated_at` bumped; `division_id` is payload and is not part of the
    /// match.
    fn upsert_scraped_team(&mut self, key: &NaturalKey, division_id: &str)
        -> StorageResult<Upserted>;

    /// Gets a scraped team row by ID
    fn get_scraped_team(&self, id: i64) -> StorageResult<ScrapedTeamRecord>;

    /// Finds rows whose natural key starts with the given prefix
    fn find_teams_by_natural_key_prefix(
        &self,
        prefix: &KeyPrefix,
    ) -> StorageResult<Vec<ScrapedTeamRecord>>;

    /// Rows with no identity link, oldest first
    fn list_unresolved_teams(&self) -> StorageResult<Vec<ScrapedTeamRecord>>;

    // ===== League Tables =====

    /// Replaces the standings of one (season, division) with `rows`
    ///
    /// Returns the number of rows now stored for that scope.
    fn replace_league_table(
        &mut self,
        season_id: &str,
        division_id: &str,
        rows: &[LeagueTableRow],
    ) -> StorageResult<usize>;

    /// Gets the standings of one (season, division), ordered by position
    fn league_table(&self, season_id: &str, division_id: &str)
        -> StorageResult<Vec<LeagueTableRow>>;

    /// Upserts every team of a scraped table and replaces its standings
    ///
    /// The whole division is one transaction: either all of it lands or none
    /// of it does.
    fn reconcile_division(
        &mut self,
        scope: &DivisionScope,
        rows: &[LeagueTableRow],
    ) -> StorageResult<ReconcileCounts>;

    // ===== Team Identities =====

    /// Creates a canonical identity, or returns the existing one with that name
    fn create_identity(&mut self, canonical_name: &str) -> StorageResult<TeamIdentity>;

    /// Points a scraped row at an identity
    fn link_to_identity(&mut self, scraped_team_id: i64, identity_id: i64) -> StorageResult<()>;

    /// Gets the identity a scraped row is linked to, if any
    fn identity_for(&self, scraped_team_id: i64) -> StorageResult<Option<TeamIdentity>>;

    // ===== Statistics =====

    fn count_total_teams(&self) -> StorageResult<u64>;

    /// Scraped team rows per season id
    fn count_teams_by_season(&self) -> StorageResult<BTreeMap<String, u64>>;

    /// Scraped team rows per division label
    fn count_teams_by_division(&self) -> StorageResult<BTreeMap<String, u64>>;

    fn count_teams_by_season_and_division(&self) -> StorageResult<Vec<SeasonDivisionCount>>;
}
