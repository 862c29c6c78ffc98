use crate::AuthError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for League Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Remote source endpoints and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Base URL every endpoint path is resolved against
    pub base_url: String,

    /// League identifier sent with every scrape request
    pub league_id: String,

    pub username: String,

    /// Login secret given inline
    #[serde(default)]
    pub password: Option<String>,

    /// Name of an environment variable holding the login secret
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_seasons_path")]
    pub seasons_path: String,

    /// Season id is appended as an extra path segment
    #[serde(default = "default_divisions_path")]
    pub divisions_path: String,

    #[serde(default = "default_scrape_path")]
    pub scrape_path: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl SourceConfig {
    /// Resolves the login secret, preferring the inline value
    pub fn resolve_password(&self) -> Result<String, AuthError> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }

        match &self.password_env {
            Some(var) => std::env::var(var)
                .map_err(|_| AuthError::MissingSecret(format!("environment variable {var} is not set"))),
            None => Err(AuthError::MissingSecret(
                "neither password nor password-env is configured".to_string(),
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_login_path() -> String {
    "auth/login".to_string()
}

fn default_seasons_path() -> String {
    "seasons".to_string()
}

fn default_divisions_path() -> String {
    "divisions".to_string()
}

fn default_scrape_path() -> String {
    "scrape-table".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Pacing and retry behaviour for scrape requests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Minimum pause between two scrape requests (milliseconds, at least 1)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random extra pause added to every gap (milliseconds)
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Attempts per division; only transient failures are retried
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    1
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "agent-name")]
    pub agent_name: String,

    /// Version of the harvester
    #[serde(rename = "agent-version")]
    pub agent_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for contact about the harvester
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown run summary, if one should be written
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}
