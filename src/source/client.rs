//! HTTP client construction
//!
//! Every request the harvester makes goes through one client that identifies
//! itself with a descriptive user agent and a bounded timeout.

use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Maximum redirects followed for a single API call
const MAX_REDIRECTS: usize = 5;

/// Formats the user agent string sent with every request
///
/// Format: `HarvesterName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.agent_name, config.agent_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total timeout applied to each request
///
/// # Example
///
/// ```no_run
/// use league_harvest::config::UserAgentConfig;
/// use league_harvest::source::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     agent_name: "LeagueHarvest".to_string(),
///     agent_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            agent_name: "TestHarvester".to_string(),
            agent_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        assert!(build_http_client(&config, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        let config = create_test_config();
        assert_eq!(
            user_agent_string(&config),
            "TestHarvester/1.0 (+https://example.com/about; admin@example.com)"
        );
    }
}
