//! Rate-limited scrape scheduler
//!
//! This module handles:
//! - The per-season frontier of divisions still to scrape
//! - Spacing consecutive scrape requests by a base delay plus random jitter
//! - Retrying transient failures within the same pacing contract
//! - Stopping at the next boundary once the run is cancelled
//!
//! Only one scrape is ever in flight: `dispatch` takes `&mut self` and
//! awaits the call before returning.

use crate::config::SchedulerConfig;
use crate::model::{Division, Season};
use crate::source::ScrapeOutcome;
use crate::AuthError;
use rand::Rng;
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// One division waiting to be scraped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTask {
    pub season: Season,
    pub division: Division,
}

/// Result of handing one task to the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The call ran; `outcome` is the last attempt's result
    Completed { outcome: ScrapeOutcome, attempts: u32 },

    /// The run was cancelled before the first attempt could be issued
    Cancelled,
}

/// Scheduler sequences scrape calls and enforces the pacing contract
pub struct Scheduler {
    /// Divisions of the current season, in discovery order
    frontier: VecDeque<ScrapeTask>,

    /// When the previous scrape call finished
    last_request: Option<Instant>,

    config: SchedulerConfig,

    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self {
            frontier: VecDeque::new(),
            last_request: None,
            config,
            cancel,
        }
    }

    /// Queues every division of a season behind whatever is already queued
    pub fn enqueue_season(&mut self, season: &Season, divisions: Vec<Division>) {
        self.frontier
            .extend(divisions.into_iter().map(|division| ScrapeTask {
                season: season.clone(),
                division,
            }));
    }

    /// Gets the next division to scrape, in discovery order
    pub fn next_task(&mut self) -> Option<ScrapeTask> {
        self.frontier.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Draws the gap to enforce before the next call: base plus `[0, jitter]`
    pub fn sample_gap(&self) -> Duration {
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        };
        Duration::from_millis(self.config.base_delay_ms + jitter)
    }

    /// Time left before a call may be issued, given the chosen gap
    ///
    /// Returns `None` when a call may go out immediately.
    pub fn time_until_next_request(&self, now: Instant, gap: Duration) -> Option<Duration> {
        let last = self.last_request?;
        let ready_at = last + gap;

        if now >= ready_at {
            None
        } else {
            Some(ready_at - now)
        }
    }

    /// Records that a scrape call has just finished
    pub fn record_request(&mut self, now: Instant) {
        self.last_request = Some(now);
    }

    /// Sleeps until the next call is allowed
    ///
    /// Returns false if the run was cancelled before or during the wait.
    pub async fn wait_turn(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let gap = self.sample_gap();
        let Some(wait) = self.time_until_next_request(Instant::now(), gap) else {
            return true;
        };

        tracing::trace!("Pacing: waiting {:?} before next scrape", wait);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }

    /// Issues one scrape call, retrying transient failures
    ///
    /// Every attempt, retries included, waits its turn first. A rejected
    /// credential is returned immediately and never retried. Cancellation
    /// during a retry wait ends the dispatch with the last attempt's outcome.
    pub async fn dispatch<F, Fut>(&mut self, mut call: F) -> Result<Dispatch, AuthError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ScrapeOutcome, AuthError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_outcome = None;

        loop {
            if !self.wait_turn().await {
                return Ok(match last_outcome {
                    Some(outcome) => Dispatch::Completed { outcome, attempts },
                    None => Dispatch::Cancelled,
                });
            }

            attempts += 1;
            let result = call().await;
            self.record_request(Instant::now());
            let outcome = result?;

            let retry = match &outcome {
                ScrapeOutcome::Failure {
                    reason,
                    transient: true,
                } if attempts < max_attempts => {
                    tracing::warn!(
                        "Transient scrape failure (attempt {}/{}): {}; retrying",
                        attempts,
                        max_attempts,
                        reason
                    );
                    true
                }
                _ => false,
            };

            if !retry {
                return Ok(Dispatch::Completed { outcome, attempts });
            }
            last_outcome = Some(outcome);
        }
    }
}
