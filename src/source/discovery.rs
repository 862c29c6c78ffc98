//! Season and division discovery
//!
//! Both listings are re-fetched on every run; nothing cached locally is
//! treated as authoritative. Credential rejection surfaces as
//! `HarvestError::Auth` so the pipeline can abort, every other failure as
//! `HarvestError::Discovery` scoped to what was being listed.

use crate::model::{Division, Season};
use crate::source::envelope::{ListEnvelope, WireDivision, WireSeason};
use crate::source::session::Session;
use crate::{AuthError, HarvestError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

/// Lists seasons in the order the source returns them
pub async fn list_seasons(session: &Session, path: &str) -> Result<Vec<Season>, HarvestError> {
    let url = session.endpoint(path)?;
    let seasons: Vec<WireSeason> = fetch_list(session, url, "season list").await?;

    Ok(seasons.into_iter().map(Season::from).collect())
}

/// Lists the divisions of one season in the order the source returns them
///
/// The season id is appended to `path` as a single, percent-encoded segment.
pub async fn list_divisions(
    session: &Session,
    path: &str,
    season: &Season,
) -> Result<Vec<Division>, HarvestError> {
    let scope = format!("divisions of season {}", season.id);
    let url = divisions_url(session, path, &season.id).map_err(|message| {
        HarvestError::Discovery {
            scope: scope.clone(),
            message,
        }
    })?;

    let divisions: Vec<WireDivision> = fetch_list(session, url, &scope).await?;

    Ok(divisions
        .into_iter()
        .map(|division| division.into_division(&season.id))
        .collect())
}

fn divisions_url(session: &Session, path: &str, season_id: &str) -> Result<Url, String> {
    let mut url = session.endpoint(path).map_err(|e| e.to_string())?;
    url.path_segments_mut()
        .map_err(|_| "base URL cannot take path segments".to_string())?
        .pop_if_empty()
        .push(season_id);
    Ok(url)
}

async fn fetch_list<T: DeserializeOwned>(
    session: &Session,
    url: Url,
    scope: &str,
) -> Result<Vec<T>, HarvestError> {
    let discovery_error = |message: String| HarvestError::Discovery {
        scope: scope.to_string(),
        message,
    };

    tracing::debug!("Listing {} from {}", scope, url);

    let response = session
        .get(url.clone())
        .send()
        .await
        .map_err(|e| discovery_error(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::Expired {
            endpoint: url.path().to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    if !status.is_success() {
        return Err(discovery_error(format!("HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| discovery_error(e.to_string()))?;

    let list: ListEnvelope<T> = serde_json::from_str(&body)
        .map_err(|e| discovery_error(format!("malformed response: {e}")))?;

    Ok(list.into_vec())
}
