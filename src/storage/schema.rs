//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the League Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track pipeline runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    divisions_attempted INTEGER NOT NULL DEFAULT 0,
    divisions_succeeded INTEGER NOT NULL DEFAULT 0,
    divisions_failed INTEGER NOT NULL DEFAULT 0,
    teams_created INTEGER NOT NULL DEFAULT 0,
    teams_updated INTEGER NOT NULL DEFAULT 0
);

-- Canonical clubs that scraped rows may be linked to
CREATE TABLE IF NOT EXISTS team_identities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    canonical_name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- One team's membership in one division of one season
CREATE TABLE IF NOT EXISTS scraped_teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_name TEXT NOT NULL,
    division_label TEXT NOT NULL,
    league_id TEXT NOT NULL,
    season_id TEXT NOT NULL,
    division_id TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    identity_id INTEGER REFERENCES team_identities(id),
    UNIQUE(team_name, division_label, league_id, season_id)
);

CREATE INDEX IF NOT EXISTS idx_scraped_teams_season ON scraped_teams(season_id);
CREATE INDEX IF NOT EXISTS idx_scraped_teams_identity ON scraped_teams(identity_id);

-- Standings rows, superseded wholesale per (season, division)
CREATE TABLE IF NOT EXISTS league_table_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    season_id TEXT NOT NULL,
    division_id TEXT NOT NULL,
    team_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    played INTEGER NOT NULL DEFAULT 0,
    won INTEGER NOT NULL DEFAULT 0,
    drawn INTEGER NOT NULL DEFAULT 0,
    lost INTEGER NOT NULL DEFAULT 0,
    goals_for INTEGER NOT NULL DEFAULT 0,
    goals_against INTEGER NOT NULL DEFAULT 0,
    goal_difference INTEGER NOT NULL DEFAULT 0,
    points INTEGER NOT NULL DEFAULT 0,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_league_table_scope ON league_table_entries(season_id, division_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
