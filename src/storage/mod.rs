//! Storage module for persisting harvested league data
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Idempotent scraped-team upserts keyed by the natural key
//! - Wholesale replacement of per-division league tables
//! - Team identity links
//! - Run tracking and aggregate queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ReconciliationStore, StorageError, StorageResult};

use crate::model::NaturalKey;
use crate::model::UpsertOutcome;
use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Represents a scraped team row in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedTeamRecord {
    pub id: i64,
    pub key: NaturalKey,
    pub division_id: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub identity_id: Option<i64>,
}

/// A canonical club that scraped rows can be linked to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamIdentity {
    pub id: i64,
    pub canonical_name: String,
    pub created_at: String,
}

/// Result of a single upsert: the row it landed on and what happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub outcome: UpsertOutcome,
}

/// Where one division's scrape gets written
///
/// Built only from values returned by discovery in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionScope {
    pub season_id: String,
    pub division_id: String,
    pub division_label: String,
    pub league_id: String,
}

impl DivisionScope {
    /// The natural key of one team within this scope
    pub fn key_for(&self, team_name: &str) -> NaturalKey {
        NaturalKey::new(
            team_name,
            self.division_label.as_str(),
            self.league_id.as_str(),
            self.season_id.as_str(),
        )
    }
}

/// What reconciling one division changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub created: u32,
    pub updated: u32,
    /// Rows inserted by this reconciliation
    pub created_ids: Vec<i64>,
    pub table_rows: usize,
}

/// A team name plus optional narrowing on the other natural-key components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix {
    pub team_name: String,
    pub division_label: Option<String>,
    pub league_id: Option<String>,
    pub season_id: Option<String>,
}

impl KeyPrefix {
    /// All rows with this exact team name, in any division, league or season
    pub fn team(team_name: impl Into<String>) -> Self {
        Self {
            team_name: team_name.into(),
            division_label: None,
            league_id: None,
            season_id: None,
        }
    }

    pub fn division_label(mut self, label: impl Into<String>) -> Self {
        self.division_label = Some(label.into());
        self
    }

    pub fn league(mut self, league_id: impl Into<String>) -> Self {
        self.league_id = Some(league_id.into());
        self
    }

    pub fn season(mut self, season_id: impl Into<String>) -> Self {
        self.season_id = Some(season_id.into());
        self
    }
}

/// One row of the season × division grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonDivisionCount {
    pub season_id: String,
    pub division_label: String,
    pub teams: u64,
}

/// Counters persisted with a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub divisions_attempted: u32,
    pub divisions_succeeded: u32,
    pub divisions_failed: u32,
    pub teams_created: u32,
    pub teams_updated: u32,
}

impl RunTotals {
    pub fn absorb(&mut self, other: &RunTotals) {
        self.divisions_attempted += other.divisions_attempted;
        self.divisions_succeeded += other.divisions_succeeded;
        self.divisions_failed += other.divisions_failed;
        self.teams_created += other.teams_created;
        self.teams_updated += other.teams_updated;
    }
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Cancelled,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
