//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ReconciliationStore trait.

use crate::model::{LeagueTableRow, NaturalKey, UpsertOutcome};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReconciliationStore, StorageError, StorageResult};
use crate::storage::{
    DivisionScope, KeyPrefix, ReconcileCounts, RunRecord, RunStatus, RunTotals,
    ScrapedTeamRecord, SeasonDivisionCount, TeamIdentity, Upserted,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const TEAM_COLUMNS: &str = "id, team_name, division_label, league_id, season_id, division_id,
     is_active, created_at, updated_at, identity_id";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status,
     divisions_attempted, divisions_succeeded, divisions_failed, teams_created, teams_updated";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;
        // Before the WAL switch, which itself needs the write lock
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn identity_count(&self) -> u64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM team_identities", [], |row| row.get(0))
            .unwrap()
    }

    #[cfg(test)]
    pub(crate) fn busy_timeout_ms(&self) -> i64 {
        self.conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap()
    }
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapedTeamRecord> {
    Ok(ScrapedTeamRecord {
        id: row.get(0)?,
        key: NaturalKey {
            team_name: row.get(1)?,
            division_label: row.get(2)?,
            league_id: row.get(3)?,
            season_id: row.get(4)?,
        },
        division_id: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        identity_id: row.get(9)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        totals: RunTotals {
            divisions_attempted: row.get(5)?,
            divisions_succeeded: row.get(6)?,
            divisions_failed: row.get(7)?,
            teams_created: row.get(8)?,
            teams_updated: row.get(9)?,
        },
    })
}

fn table_row_from_row(row: &Row<'_>) -> rusqlite::Result<LeagueTableRow> {
    Ok(LeagueTableRow {
        team_name: row.get(0)?,
        position: row.get(1)?,
        played: row.get(2)?,
        won: row.get(3)?,
        drawn: row.get(4)?,
        lost: row.get(5)?,
        goals_for: row.get(6)?,
        goals_against: row.get(7)?,
        goal_difference: row.get(8)?,
        points: row.get(9)?,
    })
}

/// Insert-or-refresh on the natural key
///
/// The insert is a no-op when the key already exists, so of two racing
/// writers exactly one sees a changed row and the other falls through to the
/// update.
fn upsert_team(
    conn: &Connection,
    key: &NaturalKey,
    division_id: &str,
    now: &str,
) -> rusqlite::Result<Upserted> {
    let inserted = conn.execute(
        "INSERT INTO scraped_teams
         (team_name, division_label, league_id, season_id, division_id, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
         ON CONFLICT(team_name, division_label, league_id, season_id) DO NOTHING",
        params![
            key.team_name,
            key.division_label,
            key.league_id,
            key.season_id,
            division_id,
            now
        ],
    )?;

    if inserted == 1 {
        return Ok(Upserted {
            id: conn.last_insert_rowid(),
            outcome: UpsertOutcome::Created,
        });
    }

    let id: i64 = conn.query_row(
        "UPDATE scraped_teams SET is_active = 1, updated_at = ?5
         WHERE team_name = ?1 AND division_label = ?2 AND league_id = ?3 AND season_id = ?4
         RETURNING id",
        params![
            key.team_name,
            key.division_label,
            key.league_id,
            key.season_id,
            now
        ],
        |row| row.get(0),
    )?;

    Ok(Upserted {
        id,
        outcome: UpsertOutcome::Updated,
    })
}

fn write_league_table(
    conn: &Connection,
    season_id: &str,
    division_id: &str,
    rows: &[LeagueTableRow],
    now: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM league_table_entries WHERE season_id = ?1 AND division_id = ?2",
        params![season_id, division_id],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO league_table_entries
         (season_id, division_id, team_name, position, played, won, drawn, lost,
          goals_for, goals_against, goal_difference, points, scraped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;

    for row in rows {
        stmt.execute(params![
            season_id,
            division_id,
            row.team_name,
            row.position,
            row.played,
            row.won,
            row.drawn,
            row.lost,
            row.goals_for,
            row.goals_against,
            row.goal_difference,
            row.points,
            now
        ])?;
    }

    Ok(rows.len())
}

impl ReconciliationStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2,
             divisions_attempted = ?3, divisions_succeeded = ?4, divisions_failed = ?5,
             teams_created = ?6, teams_updated = ?7
             WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                totals.divisions_attempted,
                totals.divisions_succeeded,
                totals.divisions_failed,
                totals.teams_created,
                totals.teams_updated,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT ?1"
        ))?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    // ===== Scraped Teams =====

    fn upsert_scraped_team(
        &mut self,
        key: &NaturalKey,
        division_id: &str,
    ) -> StorageResult<Upserted> {
        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let upserted = upsert_team(&tx, key, division_id, &now)?;
        tx.commit()?;
        Ok(upserted)
    }

    fn get_scraped_team(&self, id: i64) -> StorageResult<ScrapedTeamRecord> {
        self.conn
            .query_row(
                &format!("SELECT {TEAM_COLUMNS} FROM scraped_teams WHERE id = ?1"),
                params![id],
                team_from_row,
            )
            .optional()?
            .ok_or(StorageError::TeamNotFound(id))
    }

    fn find_teams_by_natural_key_prefix(
        &self,
        prefix: &KeyPrefix,
    ) -> StorageResult<Vec<ScrapedTeamRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEAM_COLUMNS} FROM scraped_teams
             WHERE team_name = ?1
               AND (?2 IS NULL OR division_label = ?2)
               AND (?3 IS NULL OR league_id = ?3)
               AND (?4 IS NULL OR season_id = ?4)
             ORDER BY season_id, division_label, id"
        ))?;

        let teams = stmt
            .query_map(
                params![
                    prefix.team_name,
                    prefix.division_label,
                    prefix.league_id,
                    prefix.season_id
                ],
                team_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(teams)
    }

    fn list_unresolved_teams(&self) -> StorageResult<Vec<ScrapedTeamRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEAM_COLUMNS} FROM scraped_teams WHERE identity_id IS NULL ORDER BY id"
        ))?;

        let teams = stmt
            .query_map([], team_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(teams)
    }

    // ===== League Tables =====

    fn replace_league_table(
        &mut self,
        season_id: &str,
        division_id: &str,
        rows: &[LeagueTableRow],
    ) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let written = write_league_table(&tx, season_id, division_id, rows, &now)?;
        tx.commit()?;
        Ok(written)
    }

    fn league_table(
        &self,
        season_id: &str,
        division_id: &str,
    ) -> StorageResult<Vec<LeagueTableRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT team_name, position, played, won, drawn, lost,
             goals_for, goals_against, goal_difference, points
             FROM league_table_entries
             WHERE season_id = ?1 AND division_id = ?2
             ORDER BY position, id",
        )?;

        let rows = stmt
            .query_map(params![season_id, division_id], table_row_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn reconcile_division(
        &mut self,
        scope: &DivisionScope,
        rows: &[LeagueTableRow],
    ) -> StorageResult<ReconcileCounts> {
        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut counts = ReconcileCounts::default();
        for row in rows {
            let key = scope.key_for(&row.team_name);
            let upserted = upsert_team(&tx, &key, &scope.division_id, &now)?;
            match upserted.outcome {
                UpsertOutcome::Created => {
                    counts.created += 1;
                    counts.created_ids.push(upserted.id);
                }
                UpsertOutcome::Updated => counts.updated += 1,
            }
        }

        counts.table_rows =
            write_league_table(&tx, &scope.season_id, &scope.division_id, rows, &now)?;
        tx.commit()?;

        Ok(counts)
    }

    // ===== Team Identities =====

    fn create_identity(&mut self, canonical_name: &str) -> StorageResult<TeamIdentity> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO team_identities (canonical_name, created_at) VALUES (?1, ?2)
             ON CONFLICT(canonical_name) DO NOTHING",
            params![canonical_name, now],
        )?;

        let identity = self.conn.query_row(
            "SELECT id, canonical_name, created_at FROM team_identities WHERE canonical_name = ?1",
            params![canonical_name],
            |row| {
                Ok(TeamIdentity {
                    id: row.get(0)?,
                    canonical_name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )?;

        Ok(identity)
    }

    fn link_to_identity(&mut self, scraped_team_id: i64, identity_id: i64) -> StorageResult<()> {
        let identity_exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM team_identities WHERE id = ?1",
                params![identity_id],
                |row| row.get(0),
            )
            .optional()?;

        if identity_exists.is_none() {
            return Err(StorageError::IdentityNotFound(identity_id));
        }

        let changed = self.conn.execute(
            "UPDATE scraped_teams SET identity_id = ?1 WHERE id = ?2",
            params![identity_id, scraped_team_id],
        )?;

        if changed == 0 {
            return Err(StorageError::TeamNotFound(scraped_team_id));
        }
        Ok(())
    }

    fn identity_for(&self, scraped_team_id: i64) -> StorageResult<Option<TeamIdentity>> {
        let team = self.get_scraped_team(scraped_team_id)?;

        let Some(identity_id) = team.identity_id else {
            return Ok(None);
        };

        let identity = self
            .conn
            .query_row(
                "SELECT id, canonical_name, created_at FROM team_identities WHERE id = ?1",
                params![identity_id],
                |row| {
                    Ok(TeamIdentity {
                        id: row.get(0)?,
                        canonical_name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(identity)
    }

    // ===== Statistics =====

    fn count_total_teams(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM scraped_teams", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_teams_by_season(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT season_id, COUNT(*) FROM scraped_teams GROUP BY season_id")?;

        let mut counts = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (season_id, count) = row?;
            counts.insert(season_id, count as u64);
        }

        Ok(counts)
    }

    fn count_teams_by_division(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT division_label, COUNT(*) FROM scraped_teams GROUP BY division_label",
        )?;

        let mut counts = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (label, count) = row?;
            counts.insert(label, count as u64);
        }

        Ok(counts)
    }

    fn count_teams_by_season_and_division(&self) -> StorageResult<Vec<SeasonDivisionCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT season_id, division_label, COUNT(*)
             FROM scraped_teams
             GROUP BY season_id, division_label
             ORDER BY season_id, division_label",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok(SeasonDivisionCount {
                    season_id: row.get(0)?,
                    division_label: row.get(1)?,
                    teams: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Barrier;

    fn key(team: &str, season: &str) -> NaturalKey {
        NaturalKey::new(team, "Division One", "L1", season)
    }

    fn scope(season: &str, division: &str) -> DivisionScope {
        DivisionScope {
            season_id: season.to_string(),
            division_id: division.to_string(),
            division_label: "Division One".to_string(),
            league_id: "L1".to_string(),
        }
    }

    fn rows(names: &[&str]) -> Vec<LeagueTableRow> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| LeagueTableRow::new(*name, i as u32 + 1, 30 - i as i32))
            .collect()
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_open_waits_for_a_locked_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.db");

        let holder = Connection::open(&path).unwrap();
        holder
            .execute_batch("CREATE TABLE t (x INTEGER); BEGIN EXCLUSIVE; INSERT INTO t VALUES (1);")
            .unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            holder.execute_batch("COMMIT;").unwrap();
        });

        let storage = SqliteStorage::new(&path).unwrap();
        release.join().unwrap();

        assert_eq!(storage.busy_timeout_ms(), 10_000);
        assert_eq!(storage.count_total_teams().unwrap(), 0);
    }

    #[test]
    fn test_upsert_twice_creates_then_updates() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let k = key("Westminster Wanderers 1st Team", "S1");

        let first = storage.upsert_scraped_team(&k, "D1").unwrap();
        let second = storage.upsert_scraped_team(&k, "D1").unwrap();

        assert_eq!(first.outcome, UpsertOutcome::Created);
        assert_eq!(second.outcome, UpsertOutcome::Updated);
        assert_eq!(first.id, second.id);
        assert_eq!(storage.count_total_teams().unwrap(), 1);
    }

    #[test]
    fn test_division_id_is_payload_not_key() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let k = key("Rovers", "S1");

        let first = storage.upsert_scraped_team(&k, "D1").unwrap();
        let second = storage.upsert_scraped_team(&k, "D2").unwrap();

        assert_eq!(second.outcome, UpsertOutcome::Updated);
        assert_eq!(first.id, second.id);
        assert_eq!(storage.count_total_teams().unwrap(), 1);

        let record = storage.get_scraped_team(first.id).unwrap();
        assert_eq!(record.division_id, "D1");
    }

    #[test]
    fn test_distinct_keys_get_distinct_rows() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        storage.upsert_scraped_team(&key("Rovers", "S1"), "D1").unwrap();
        storage.upsert_scraped_team(&key("Rovers", "S2"), "D1").unwrap();
        storage
            .upsert_scraped_team(&NaturalKey::new("Rovers", "Division Two", "L1", "S1"), "D2")
            .unwrap();
        storage
            .upsert_scraped_team(&NaturalKey::new("Rovers", "Division One", "L2", "S1"), "D1")
            .unwrap();

        assert_eq!(storage.count_total_teams().unwrap(), 4);
    }

    #[test]
    fn test_update_reactivates_and_bumps_updated_at() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let k = key("Rovers", "S1");
        let created = storage.upsert_scraped_team(&k, "D1").unwrap();

        storage
            .conn
            .execute(
                "UPDATE scraped_teams SET is_active = 0, updated_at = '2000-01-01T00:00:00+00:00' WHERE id = ?1",
                params![created.id],
            )
            .unwrap();

        storage.upsert_scraped_team(&k, "D1").unwrap();
        let record = storage.get_scraped_team(created.id).unwrap();

        assert!(record.is_active);
        assert_ne!(record.updated_at, "2000-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_concurrent_upserts_yield_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        SqliteStorage::new(&path).unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let mut storage = SqliteStorage::new(&path).unwrap();
                    barrier.wait();
                    (0..25)
                        .map(|_| {
                            storage
                                .upsert_scraped_team(&key("Rovers", "S1"), "D1")
                                .unwrap()
                                .outcome
                        })
                        .filter(|outcome| *outcome == UpsertOutcome::Created)
                        .count()
                })
            })
            .collect();

        let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(created, 1);
        assert_eq!(storage.count_total_teams().unwrap(), 1);
    }

    #[test]
    fn test_replace_league_table_supersedes_previous_rows() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let first = rows(&["A", "B", "C", "D", "E"]);
        assert_eq!(storage.replace_league_table("S1", "D1", &first).unwrap(), 5);

        let second = rows(&["F", "G", "H", "I"]);
        assert_eq!(storage.replace_league_table("S1", "D1", &second).unwrap(), 4);

        let table = storage.league_table("S1", "D1").unwrap();
        assert_eq!(table.len(), 4);
        assert!(table
            .iter()
            .all(|row| !["A", "B", "C", "D", "E"].contains(&row.team_name.as_str())));
        assert_eq!(table[0].team_name, "F");
    }

    #[test]
    fn test_replace_league_table_leaves_other_scopes_alone() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        storage.replace_league_table("S1", "D1", &rows(&["A", "B"])).unwrap();
        storage.replace_league_table("S1", "D2", &rows(&["C"])).unwrap();
        storage.replace_league_table("S2", "D1", &rows(&["D"])).unwrap();
        storage.replace_league_table("S1", "D1", &rows(&["E"])).unwrap();

        assert_eq!(storage.league_table("S1", "D1").unwrap().len(), 1);
        assert_eq!(storage.league_table("S1", "D2").unwrap().len(), 1);
        assert_eq!(storage.league_table("S2", "D1").unwrap().len(), 1);
    }

    #[test]
    fn test_reconcile_division_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let scope = scope("S1", "D1");

        let first = storage
            .reconcile_division(&scope, &rows(&["A", "B", "C"]))
            .unwrap();
        assert_eq!(first.created, 3);
        assert_eq!(first.updated, 0);
        assert_eq!(first.created_ids.len(), 3);
        assert_eq!(first.table_rows, 3);

        let second = storage
            .reconcile_division(&scope, &rows(&["B", "C", "D"]))
            .unwrap();
        assert_eq!(second.created, 1);
        assert_eq!(second.updated, 2);

        assert_eq!(storage.count_total_teams().unwrap(), 4);
        assert_eq!(storage.league_table("S1", "D1").unwrap().len(), 3);
    }

    #[test]
    fn test_reconcile_division_rolls_back_on_failure() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_e BEFORE INSERT ON league_table_entries
                 WHEN NEW.team_name = 'E'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = storage.reconcile_division(&scope("S1", "D1"), &rows(&["A", "E"]));

        assert!(result.is_err());
        assert_eq!(storage.count_total_teams().unwrap(), 0);
        assert!(storage.league_table("S1", "D1").unwrap().is_empty());
    }

    #[test]
    fn test_group_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .reconcile_division(&scope("S1", "D1"), &rows(&["A", "B", "C"]))
            .unwrap();
        storage
            .reconcile_division(&scope("S2", "D7"), &rows(&["A", "B"]))
            .unwrap();
        storage
            .reconcile_division(
                &DivisionScope {
                    division_label: "Division Two".to_string(),
                    ..scope("S2", "D8")
                },
                &rows(&["X"]),
            )
            .unwrap();

        let by_season = storage.count_teams_by_season().unwrap();
        assert_eq!(by_season.get("S1"), Some(&3));
        assert_eq!(by_season.get("S2"), Some(&3));

        let by_division = storage.count_teams_by_division().unwrap();
        assert_eq!(by_division.get("Division One"), Some(&5));
        assert_eq!(by_division.get("Division Two"), Some(&1));

        let grouped = storage.count_teams_by_season_and_division().unwrap();
        assert_eq!(grouped.len(), 3);
        assert_eq!(
            grouped[1],
            SeasonDivisionCount {
                season_id: "S2".to_string(),
                division_label: "Division One".to_string(),
                teams: 2,
            }
        );
    }

    #[test]
    fn test_find_by_natural_key_prefix() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_scraped_team(&key("Rovers", "S1"), "D1").unwrap();
        storage.upsert_scraped_team(&key("Rovers", "S2"), "D5").unwrap();
        storage
            .upsert_scraped_team(&NaturalKey::new("Rovers", "Division Two", "L1", "S3"), "D9")
            .unwrap();
        storage.upsert_scraped_team(&key("United", "S1"), "D1").unwrap();

        let all = storage
            .find_teams_by_natural_key_prefix(&KeyPrefix::team("Rovers"))
            .unwrap();
        assert_eq!(all.len(), 3);

        let division_one = storage
            .find_teams_by_natural_key_prefix(
                &KeyPrefix::team("Rovers").division_label("Division One").league("L1"),
            )
            .unwrap();
        assert_eq!(division_one.len(), 2);

        let one_season = storage
            .find_teams_by_natural_key_prefix(&KeyPrefix::team("Rovers").season("S2"))
            .unwrap();
        assert_eq!(one_season.len(), 1);
        assert_eq!(one_season[0].division_id, "D5");
    }

    #[test]
    fn test_identity_link_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let team = storage.upsert_scraped_team(&key("Rovers", "S1"), "D1").unwrap();

        assert_eq!(storage.identity_for(team.id).unwrap(), None);

        let identity = storage.create_identity("Rovers FC").unwrap();
        storage.link_to_identity(team.id, identity.id).unwrap();

        let linked = storage.identity_for(team.id).unwrap().unwrap();
        assert_eq!(linked.canonical_name, "Rovers FC");
        assert!(storage.list_unresolved_teams().unwrap().is_empty());
    }

    #[test]
    fn test_create_identity_is_idempotent_by_name() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let a = storage.create_identity("Rovers FC").unwrap();
        let b = storage.create_identity("Rovers FC").unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_many_teams_one_identity() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let identity = storage.create_identity("Rovers FC").unwrap();
        let a = storage.upsert_scraped_team(&key("Rovers", "S1"), "D1").unwrap();
        let b = storage.upsert_scraped_team(&key("Rovers", "S2"), "D1").unwrap();

        storage.link_to_identity(a.id, identity.id).unwrap();
        storage.link_to_identity(b.id, identity.id).unwrap();

        assert_eq!(storage.identity_for(a.id).unwrap().unwrap().id, identity.id);
        assert_eq!(storage.identity_for(b.id).unwrap().unwrap().id, identity.id);
    }

    #[test]
    fn test_link_errors() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let team = storage.upsert_scraped_team(&key("Rovers", "S1"), "D1").unwrap();
        let identity = storage.create_identity("Rovers FC").unwrap();

        assert!(matches!(
            storage.link_to_identity(team.id, 999),
            Err(StorageError::IdentityNotFound(999))
        ));
        assert!(matches!(
            storage.link_to_identity(999, identity.id),
            Err(StorageError::TeamNotFound(999))
        ));
        assert!(matches!(
            storage.identity_for(999),
            Err(StorageError::TeamNotFound(999))
        ));
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash").unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        let totals = RunTotals {
            divisions_attempted: 2,
            divisions_succeeded: 1,
            divisions_failed: 1,
            teams_created: 3,
            teams_updated: 0,
        };
        storage
            .finish_run(run_id, RunStatus::Completed, &totals)
            .unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.totals, totals);

        assert!(matches!(
            storage.finish_run(42, RunStatus::Completed, &totals),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_latest_runs_newest_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.create_run("a").unwrap();
        let second = storage.create_run("b").unwrap();

        let runs = storage.latest_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);

        assert_eq!(storage.latest_runs(1).unwrap().len(), 1);
    }
}
