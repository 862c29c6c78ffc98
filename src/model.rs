//! Domain types shared by the source, the store and the pipeline

use serde::{Deserialize, Serialize};

/// A competition period as reported by the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub id: String,
    pub name: String,
    pub is_live: bool,
}

/// A group of teams within one season; the unit of a single scrape call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    pub id: String,
    pub name: String,
    pub season_id: String,
}

impl Division {
    /// The label used in natural keys: the display name, or the id when unnamed
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// The persisted identity of a scraped team row
///
/// Field order is the order of the composite unique key in the store.
/// `division_id` is deliberately absent: it is payload, not identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub team_name: String,
    pub division_label: String,
    pub league_id: String,
    pub season_id: String,
}

impl NaturalKey {
    pub fn new(
        team_name: impl Into<String>,
        division_label: impl Into<String>,
        league_id: impl Into<String>,
        season_id: impl Into<String>,
    ) -> Self {
        Self {
            team_name: team_name.into(),
            division_label: division_label.into(),
            league_id: league_id.into(),
            season_id: season_id.into(),
        }
    }
}

/// Whether an upsert inserted a fresh row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// One standings row as scraped from a division table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueTableRow {
    #[serde(alias = "team", alias = "name")]
    pub team_name: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub played: u32,
    #[serde(default)]
    pub won: u32,
    #[serde(default)]
    pub drawn: u32,
    #[serde(default)]
    pub lost: u32,
    #[serde(default)]
    pub goals_for: u32,
    #[serde(default)]
    pub goals_against: u32,
    #[serde(default)]
    pub goal_difference: i32,
    #[serde(default)]
    pub points: i32,
}

impl LeagueTableRow {
    /// Convenience constructor for a row with only name, position and points
    pub fn new(team_name: impl Into<String>, position: u32, points: i32) -> Self {
        Self {
            team_name: team_name.into(),
            position,
            played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            goals_for: 0,
            goals_against: 0,
            goal_difference: 0,
            points,
        }
    }
}
