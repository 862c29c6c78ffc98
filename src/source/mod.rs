//! Remote league source
//!
//! This module talks to the upstream API:
//! - Building the identified HTTP client
//! - Logging in and carrying the bearer token as an explicit `Session`
//! - Listing seasons and divisions
//! - Invoking the per-division scrape endpoint and normalizing its result
//!
//! The pipeline only sees the `Connector` and `LeagueSource` traits, so tests
//! can drive it without a network.

mod client;
mod discovery;
mod envelope;
mod scrape;
mod session;

pub use client::{build_http_client, user_agent_string};
pub use discovery::{list_divisions, list_seasons};
pub use scrape::{interpret_response, scrape_division, ScrapeOutcome, ScrapeReport};
pub use session::{authenticate, parse_base_url, Session};

use crate::config::{Config, SourceConfig};
use crate::model::{Division, Season};
use crate::{AuthError, HarvestError};
use reqwest::Client;

/// An authenticated view of the source
#[async_trait::async_trait]
pub trait LeagueSource: Send + Sync {
    /// Seasons in source order; an empty list is not an error
    async fn list_seasons(&self) -> Result<Vec<Season>, HarvestError>;

    /// Divisions of one season in source order
    async fn list_divisions(&self, season: &Season) -> Result<Vec<Division>, HarvestError>;

    /// Scrapes one division; only credential rejection is an error
    async fn scrape(&self, division: &Division, league_id: &str)
        -> Result<ScrapeOutcome, AuthError>;
}

/// Produces a `LeagueSource` by authenticating
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Source: LeagueSource;

    async fn connect(&self) -> Result<Self::Source, AuthError>;
}

/// Connects to the real HTTP API
pub struct HttpConnector {
    client: Client,
    config: SourceConfig,
}

impl HttpConnector {
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent, config.source.request_timeout())?;

        Ok(Self {
            client,
            config: config.source.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Connector for HttpConnector {
    type Source = HttpSource;

    async fn connect(&self) -> Result<HttpSource, AuthError> {
        let session = authenticate(&self.client, &self.config).await?;

        Ok(HttpSource {
            session,
            config: self.config.clone(),
        })
    }
}

/// The HTTP API behind an authenticated session
pub struct HttpSource {
    session: Session,
    config: SourceConfig,
}

#[async_trait::async_trait]
impl LeagueSource for HttpSource {
    async fn list_seasons(&self) -> Result<Vec<Season>, HarvestError> {
        list_seasons(&self.session, &self.config.seasons_path).await
    }

    async fn list_divisions(&self, season: &Season) -> Result<Vec<Division>, HarvestError> {
        list_divisions(&self.session, &self.config.divisions_path, season).await
    }

    async fn scrape(
        &self,
        division: &Division,
        league_id: &str,
    ) -> Result<ScrapeOutcome, AuthError> {
        scrape_division(&self.session, &self.config.scrape_path, division, league_id).await
    }
}
