//! Authenticated session against the remote source
//!
//! A `Session` is an explicit value: the HTTP client, the resolved base URL
//! and the bearer token travel together and are handed to every discovery and
//! scrape call. Nothing about the credential lives in process-wide state.

use crate::config::SourceConfig;
use crate::source::envelope::{extract_token, LoginRequest};
use crate::AuthError;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use url::Url;

/// An authenticated handle on the source API
#[derive(Clone)]
pub struct Session {
    client: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Session {
    pub fn new(client: Client, base_url: Url, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: with_trailing_slash(base_url),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path against the base URL
    ///
    /// Leading slashes are ignored so `"/seasons"` and `"seasons"` both land
    /// under the base path rather than at the host root.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.token)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url).bearer_auth(&self.token)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Parses the configured base URL into the form `Session` expects
pub fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    Url::parse(raw).map(with_trailing_slash)
}

/// Logs in and returns a session carrying the issued token
///
/// # Errors
///
/// * `AuthError::MissingSecret` - no password could be resolved
/// * `AuthError::Rejected` - the source refused the credentials (4xx)
/// * `AuthError::Transport` - the login call itself failed
/// * `AuthError::MissingToken` - the response held no recognisable token
pub async fn authenticate(client: &Client, config: &SourceConfig) -> Result<Session, AuthError> {
    let password = config.resolve_password()?;
    let base_url =
        parse_base_url(&config.base_url).map_err(|e| AuthError::Transport(e.to_string()))?;
    let login_url = base_url
        .join(config.login_path.trim_start_matches('/'))
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    tracing::debug!("Logging in as {} at {}", config.username, login_url);

    let response = client
        .post(login_url)
        .json(&LoginRequest {
            username: &config.username,
            password: &password,
        })
        .send()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_client_error() {
        return Err(AuthError::Rejected {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(AuthError::Transport(format!("login returned HTTP {status}")));
    }

    let body: Value = response.json().await.map_err(|_| AuthError::MissingToken)?;
    let token = extract_token(&body).ok_or(AuthError::MissingToken)?;

    tracing::info!("Authenticated against {}", base_url);

    Ok(Session::new(client.clone(), base_url, token))
}
