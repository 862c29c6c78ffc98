//! League Harvest: a polite league-table acquisition pipeline
//!
//! This crate walks a remote source's season/division hierarchy, scrapes each
//! division's standings through an authenticated endpoint at a throttled pace,
//! and reconciles the results idempotently into a SQLite store.

pub mod config;
pub mod harvest;
pub mod identity;
pub mod model;
pub mod output;
pub mod source;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for League Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Discovery failed for {scope}: {message}")]
    Discovery { scope: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid run transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunPhase,
        to: state::RunPhase,
    },
}

impl HarvestError {
    /// Returns true if this error must terminate the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Discovery { .. } | Self::Storage(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while obtaining or using the source credential
///
/// These are kept apart from transport failures so the pipeline can tell
/// "nothing downstream can succeed" from "this one request failed".
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login rejected by source (HTTP {status})")]
    Rejected { status: u16 },

    #[error("credential rejected by {endpoint} (HTTP {status})")]
    Expired { endpoint: String, status: u16 },

    #[error("login response did not contain a token")]
    MissingToken,

    #[error("secret not available: {0}")]
    MissingSecret(String),

    #[error("login request failed: {0}")]
    Transport(String),
}

/// Result type alias for League Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{run_harvest, Pipeline};
pub use model::{Division, LeagueTableRow, NaturalKey, Season, UpsertOutcome};
pub use output::RunSummary;
pub use state::RunPhase;
