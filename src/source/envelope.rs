//! Wire shapes of the source's JSON responses
//!
//! The source is loose about envelopes: lists arrive bare or wrapped, ids
//! arrive as strings or numbers, and the login token has several spellings.
//! Everything here is private to the `source` module and converted to the
//! crate's model types before leaving it.

use crate::model::{Division, LeagueTableRow, Season};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A list response, either bare or wrapped in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped(Wrapped<T>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct Wrapped<T> {
    #[serde(alias = "seasons", alias = "divisions", alias = "items")]
    data: Vec<T>,
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) => items,
            Self::Wrapped(wrapped) => wrapped.data,
        }
    }
}

/// Accepts `"12"` and `12` alike
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSeason {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "isLive", alias = "is_live", alias = "live")]
    is_live: bool,
}

impl From<WireSeason> for Season {
    fn from(wire: WireSeason) -> Self {
        Season {
            id: wire.id,
            name: wire.name,
            is_live: wire.is_live,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDivision {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    #[serde(default)]
    name: String,
}

impl WireDivision {
    pub(crate) fn into_division(self, season_id: &str) -> Division {
        Division {
            id: self.id,
            name: self.name,
            season_id: season_id.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

const TOKEN_FIELDS: [&str; 3] = ["token", "accessToken", "access_token"];

/// Pulls the bearer token out of a login response
pub(crate) fn extract_token(body: &Value) -> Option<String> {
    let lookup = |object: &Value| {
        TOKEN_FIELDS
            .iter()
            .find_map(|field| object.get(*field).and_then(Value::as_str))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    };

    lookup(body).or_else(|| body.get("data").and_then(lookup))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScrapeRequest<'a> {
    pub division_id: &'a str,
    pub season_id: &'a str,
    pub league_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScrapeEnvelope {
    pub success: bool,
    #[serde(default)]
    pub database_result: Option<DatabaseResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<ScrapeData>,
    #[serde(default)]
    pub table: Option<Vec<LeagueTableRow>>,
}

impl ScrapeEnvelope {
    /// Standings rows, wherever the source put them
    pub(crate) fn take_table(&mut self) -> Option<Vec<LeagueTableRow>> {
        self.data
            .as_mut()
            .and_then(|data| data.table.take())
            .or_else(|| self.table.take())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatabaseResult {
    #[serde(default)]
    pub teams_created: u32,
    #[serde(default)]
    pub teams_updated: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScrapeData {
    #[serde(default, alias = "rows")]
    pub table: Option<Vec<LeagueTableRow>>,
}
