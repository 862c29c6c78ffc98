//! Pipeline orchestration
//!
//! This module contains the run loop that ties the pieces together:
//! - Opening a run record and taking the before-snapshot
//! - Authenticating through a `Connector`
//! - Walking seasons, then divisions, in discovery order
//! - Handing each division to the scheduler and reconciling what comes back
//! - Closing the run with the after-snapshot and a summary
//!
//! Only a rejected credential or an unreadable season list ends a run early.
//! Every other failure is scoped to its season or division and counted.

use crate::config::{Config, SchedulerConfig};
use crate::harvest::aggregator::RunAggregator;
use crate::harvest::scheduler::{Dispatch, ScrapeTask, Scheduler};
use crate::identity::IdentityResolver;
use crate::output::RunSummary;
use crate::source::{Connector, LeagueSource, ScrapeOutcome, ScrapeReport};
use crate::state::RunPhase;
use crate::storage::{DivisionScope, ReconciliationStore, RunStatus, SqliteStorage, StorageResult};
use crate::HarvestError;
use std::fmt::Display;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Counts from reconciling one division
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reconciled {
    created: u32,
    updated: u32,
    linked: u32,
}

/// Drives one or more harvest runs against a store
pub struct Pipeline<S: ReconciliationStore> {
    store: S,
    league_id: String,
    scheduler_config: SchedulerConfig,
    config_hash: String,
    phase: RunPhase,
}

impl Pipeline<SqliteStorage> {
    /// Opens the configured SQLite database and builds a pipeline over it
    pub fn open(config: &Config) -> Result<Self, HarvestError> {
        let store = SqliteStorage::new(Path::new(&config.output.database_path))?;

        Ok(Self::new(
            store,
            config.source.league_id.clone(),
            config.scheduler.clone(),
        ))
    }
}

impl<S: ReconciliationStore> Pipeline<S> {
    pub fn new(store: S, league_id: impl Into<String>, scheduler_config: SchedulerConfig) -> Self {
        Self {
            store,
            league_id: league_id.into(),
            scheduler_config,
            config_hash: String::new(),
            phase: RunPhase::NotStarted,
        }
    }

    /// Sets the config hash recorded with each run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn advance(&mut self, next: RunPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!("Run phase: {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Runs the pipeline once
    ///
    /// Aborted and cancelled runs still return `Ok` with a summary whose
    /// `status` says so. `Err` means the pipeline itself could not operate,
    /// e.g. the run record could not be written.
    pub async fn run<C: Connector>(
        &mut self,
        connector: &C,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, HarvestError> {
        if self.phase != RunPhase::NotStarted {
            if !self.phase.is_terminal() {
                tracing::warn!("Previous run stopped in phase {}; starting over", self.phase);
            }
            self.phase = RunPhase::NotStarted;
        }

        let run_id = self.store.create_run(&self.config_hash)?;
        let mut aggregator = RunAggregator::new(run_id, self.config_hash.clone());
        if let Err(e) = aggregator.capture_before(&self.store) {
            tracing::warn!("Failed to take before-snapshot: {}", e);
        }

        tracing::info!("Starting harvest run {}", run_id);

        self.advance(RunPhase::Authenticating)?;
        let source = match connector.connect().await {
            Ok(source) => source,
            Err(e) => return self.abort(run_id, &mut aggregator, &HarvestError::Auth(e)),
        };

        self.advance(RunPhase::DiscoveringSeasons)?;
        let seasons = match source.list_seasons().await {
            Ok(seasons) => seasons,
            Err(e) => return self.abort(run_id, &mut aggregator, &e),
        };

        if seasons.is_empty() {
            tracing::info!("Source listed no seasons; nothing to do");
            aggregator.record_nothing_to_do();
            return self.wind_down(run_id, &mut aggregator, false);
        }

        tracing::info!("Discovered {} seasons", seasons.len());

        let league_id = self.league_id.clone();
        let mut scheduler = Scheduler::new(self.scheduler_config.clone(), cancel.clone());
        let mut cancelled = false;

        'seasons: for season in &seasons {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.advance(RunPhase::DiscoveringDivisions)?;
            aggregator.begin_season(season);

            let divisions = match source.list_divisions(season).await {
                Ok(divisions) => divisions,
                Err(e) if e.is_fatal() => return self.abort(run_id, &mut aggregator, &e),
                Err(e) => {
                    tracing::warn!("Skipping season {}: {}", season.id, e);
                    aggregator.record_discovery_failure(&season.id, e.to_string());
                    continue;
                }
            };

            if divisions.is_empty() {
                tracing::info!("Season {} lists no divisions; skipping", season.id);
                aggregator.record_no_divisions(&season.id);
                continue;
            }

            tracing::info!(
                "Season {} ({}): {} divisions",
                season.id,
                season.name,
                divisions.len()
            );
            scheduler.enqueue_season(season, divisions);

            while let Some(task) = scheduler.next_task() {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'seasons;
                }

                self.advance(RunPhase::Scraping)?;
                let dispatch = scheduler
                    .dispatch(|| source.scrape(&task.division, &league_id))
                    .await;

                match dispatch {
                    Err(e) => return self.abort(run_id, &mut aggregator, &HarvestError::Auth(e)),
                    Ok(Dispatch::Cancelled) => {
                        cancelled = true;
                        break 'seasons;
                    }
                    Ok(Dispatch::Completed {
                        outcome: ScrapeOutcome::Failure { reason, .. },
                        attempts,
                    }) => {
                        tracing::warn!(
                            "Division {} of season {} failed: {}",
                            task.division.id,
                            task.season.id,
                            reason
                        );
                        aggregator.record_failure(&task.division, reason, attempts);
                    }
                    Ok(Dispatch::Completed {
                        outcome: ScrapeOutcome::Success(report),
                        attempts,
                    }) => {
                        self.advance(RunPhase::Reconciling)?;
                        match self.reconcile(&task, report) {
                            Ok(done) => {
                                tracing::debug!(
                                    "Division {} of season {}: {} created, {} updated",
                                    task.division.id,
                                    task.season.id,
                                    done.created,
                                    done.updated
                                );
                                aggregator.record_success(
                                    &task.division,
                                    done.created,
                                    done.updated,
                                    done.linked,
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "Failed to store division {} of season {}: {}",
                                    task.division.id,
                                    task.season.id,
                                    e
                                );
                                aggregator.record_failure(
                                    &task.division,
                                    format!("store failure: {e}"),
                                    attempts,
                                );
                            }
                        }
                    }
                }
            }
        }

        if cancelled {
            tracing::info!(
                "Run {} cancelled with {} divisions still queued",
                run_id,
                scheduler.pending()
            );
        }

        self.wind_down(run_id, &mut aggregator, cancelled)
    }

    /// Writes one successful scrape into the store
    ///
    /// When the source returned the standings, they are reconciled here and
    /// the local counts win. Otherwise the source's own counts are taken.
    fn reconcile(&mut self, task: &ScrapeTask, report: ScrapeReport) -> StorageResult<Reconciled> {
        let Some(rows) = report.table else {
            return Ok(Reconciled {
                created: report.teams_created,
                updated: report.teams_updated,
                linked: 0,
            });
        };

        let scope = DivisionScope {
            season_id: task.season.id.clone(),
            division_id: task.division.id.clone(),
            division_label: task.division.label().to_string(),
            league_id: self.league_id.clone(),
        };

        let counts = self.store.reconcile_division(&scope, &rows)?;

        let linked = match IdentityResolver::new(&mut self.store).resolve_teams(&counts.created_ids)
        {
            Ok(report) => report.linked,
            Err(e) => {
                tracing::warn!(
                    "Identity resolution failed for division {}: {}",
                    task.division.id,
                    e
                );
                0
            }
        };

        Ok(Reconciled {
            created: counts.created,
            updated: counts.updated,
            linked,
        })
    }

    fn abort(
        &mut self,
        run_id: i64,
        aggregator: &mut RunAggregator,
        error: &dyn Display,
    ) -> Result<RunSummary, HarvestError> {
        tracing::error!("Run {} aborted: {}", run_id, error);
        self.advance(RunPhase::Aborted)?;
        aggregator.record_abort(error.to_string());
        self.close(run_id, aggregator, RunStatus::Aborted)
    }

    fn wind_down(
        &mut self,
        run_id: i64,
        aggregator: &mut RunAggregator,
        cancelled: bool,
    ) -> Result<RunSummary, HarvestError> {
        self.advance(RunPhase::Summarizing)?;

        let (status, phase) = if cancelled {
            (RunStatus::Cancelled, RunPhase::Cancelled)
        } else {
            (RunStatus::Completed, RunPhase::Done)
        };

        let summary = self.close(run_id, aggregator, status)?;
        self.advance(phase)?;

        tracing::info!(
            "Run {} {}: {} divisions attempted, {} succeeded, {} failed",
            run_id,
            status.to_db_string(),
            summary.totals.divisions_attempted,
            summary.totals.divisions_succeeded,
            summary.totals.divisions_failed
        );

        Ok(summary)
    }

    /// Builds the summary and stamps the run record
    ///
    /// The scraped data is already committed at this point, so a failure to
    /// write the run record is logged and the summary is still returned.
    fn close(
        &mut self,
        run_id: i64,
        aggregator: &mut RunAggregator,
        status: RunStatus,
    ) -> Result<RunSummary, HarvestError> {
        if let Err(e) = aggregator.capture_after(&self.store) {
            tracing::warn!("Failed to take after-snapshot: {}", e);
        }

        let summary = aggregator.summary(status);
        if let Err(e) = self.store.finish_run(run_id, status, &summary.totals) {
            tracing::warn!(
                "Failed to record the end of run {} as {}: {}",
                run_id,
                status.to_db_string(),
                e
            );
        }

        Ok(summary)
    }
}
