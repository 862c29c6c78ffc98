//! Scrape invocation and result normalization
//!
//! One call scrapes one division of one season. The invoker never retries;
//! whatever goes wrong short of a rejected credential is folded into
//! `ScrapeOutcome::Failure` so callers count failures the same way regardless
//! of cause.

use crate::model::{Division, LeagueTableRow};
use crate::source::envelope::{ScrapeEnvelope, ScrapeRequest};
use crate::source::session::Session;
use crate::AuthError;
use reqwest::StatusCode;

/// What a successful scrape reported
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScrapeReport {
    /// Teams the source says it created
    pub teams_created: u32,
    /// Teams the source says it refreshed
    pub teams_updated: u32,
    /// Standings rows, when the source returned them
    pub table: Option<Vec<LeagueTableRow>>,
}

/// Normalized result of one scrape call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Success(ScrapeReport),
    Failure {
        reason: String,
        /// Whether trying again later could plausibly succeed
        transient: bool,
    },
}

impl ScrapeOutcome {
    pub fn failure(reason: impl Into<String>, transient: bool) -> Self {
        Self::Failure {
            reason: reason.into(),
            transient,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_transient_failure(&self) -> bool {
        matches!(self, Self::Failure { transient: true, .. })
    }
}

/// Turns a non-auth HTTP response into a scrape outcome
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | HTTP 429 or 5xx | transient Failure |
/// | other non-2xx | Failure |
/// | body not a scrape envelope | Failure |
/// | `success: false` | Failure with the source's `error` text |
/// | `success: true` | Success |
pub fn interpret_response(status: StatusCode, body: &str) -> ScrapeOutcome {
    if !status.is_success() {
        let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        return ScrapeOutcome::failure(format!("HTTP {status}"), transient);
    }

    let mut envelope: ScrapeEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return ScrapeOutcome::failure(format!("malformed response: {e}"), false),
    };

    if !envelope.success {
        let reason = envelope
            .error
            .take()
            .unwrap_or_else(|| "source reported failure".to_string());
        return ScrapeOutcome::failure(reason, false);
    }

    let table = envelope.take_table();
    let counts = envelope.database_result.unwrap_or_default();

    ScrapeOutcome::Success(ScrapeReport {
        teams_created: counts.teams_created,
        teams_updated: counts.teams_updated,
        table,
    })
}

/// Scrapes one division
///
/// # Errors
///
/// Only a rejected credential (401/403) is returned as an error; the run
/// cannot continue past it.
pub async fn scrape_division(
    session: &Session,
    path: &str,
    division: &Division,
    league_id: &str,
) -> Result<ScrapeOutcome, AuthError> {
    let url = match session.endpoint(path) {
        Ok(url) => url,
        Err(e) => return Ok(ScrapeOutcome::failure(e.to_string(), false)),
    };

    tracing::debug!(
        "Scraping division {} ({}) of season {}",
        division.id,
        division.name,
        division.season_id
    );

    let request = ScrapeRequest {
        division_id: &division.id,
        season_id: &division.season_id,
        league_id,
    };

    let response = match session.post(url.clone()).json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            let reason = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {e}")
            } else {
                e.to_string()
            };
            return Ok(ScrapeOutcome::failure(reason, true));
        }
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::Expired {
            endpoint: url.path().to_string(),
            status: status.as_u16(),
        });
    }

    match response.text().await {
        Ok(body) => Ok(interpret_response(status, &body)),
        Err(e) => Ok(ScrapeOutcome::failure(e.to_string(), true)),
    }
}
