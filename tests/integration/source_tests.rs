//! Source boundary tests: login, discovery envelopes and scrape normalization

use league_harvest::config::{SourceConfig, UserAgentConfig};
use league_harvest::model::Season;
use league_harvest::source::{
    authenticate, build_http_client, list_divisions, list_seasons, scrape_division,
    ScrapeOutcome, Session,
};
use league_harvest::{AuthError, HarvestError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_config(base_url: &str) -> SourceConfig {
    SourceConfig {
        base_url: base_url.to_string(),
        league_id: "70".to_string(),
        username: "harvester".to_string(),
        password: Some("hunter2".to_string()),
        password_env: None,
        login_path: "auth/login".to_string(),
        seasons_path: "seasons".to_string(),
        divisions_path: "divisions".to_string(),
        scrape_path: "scrape-table".to_string(),
        request_timeout_secs: 5,
    }
}

fn client() -> reqwest::Client {
    let user_agent = UserAgentConfig {
        agent_name: "TestHarvester".to_string(),
        agent_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    build_http_client(&user_agent, Duration::from_secs(5)).expect("client builds")
}

async fn logged_in(server: &MockServer) -> Session {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": "tok"}})))
        .mount(server)
        .await;

    let config = source_config(&format!("{}/api", server.uri()));
    authenticate(&client(), &config).await.expect("login succeeds")
}

#[tokio::test]
async fn test_login_posts_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "harvester", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = source_config(&format!("{}/api/", server.uri()));
    let session = authenticate(&client(), &config).await;

    assert!(session.is_ok());
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = source_config(&format!("{}/api/", server.uri()));
    let result = authenticate(&client(), &config).await;

    assert!(matches!(result, Err(AuthError::Rejected { status: 401 })));
}

#[tokio::test]
async fn test_login_without_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let config = source_config(&format!("{}/api/", server.uri()));
    let result = authenticate(&client(), &config).await;

    assert!(matches!(result, Err(AuthError::MissingToken)));
}

#[tokio::test]
async fn test_discovery_accepts_both_shapes_and_sends_bearer() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/seasons"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 12, "name": "2022/23", "isLive": false},
                {"id": "13", "name": "2023/24", "isLive": true}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/divisions/13"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "D1", "name": "Premier"},
            {"id": "D2", "name": "Division One"}
        ])))
        .mount(&server)
        .await;

    let seasons = list_seasons(&session, "seasons").await.unwrap();
    assert_eq!(seasons.len(), 2);
    assert_eq!(seasons[0].id, "12");
    assert!(seasons[1].is_live);

    let divisions = list_divisions(&session, "divisions", &seasons[1]).await.unwrap();
    assert_eq!(divisions.len(), 2);
    assert_eq!(divisions[1].name, "Division One");
    assert_eq!(divisions[1].season_id, "13");
}

#[tokio::test]
async fn test_discovery_failure_kinds() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/seasons"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/divisions/S1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let seasons = list_seasons(&session, "seasons").await;
    assert!(matches!(
        seasons,
        Err(HarvestError::Auth(AuthError::Expired { status: 403, .. }))
    ));

    let season = Season {
        id: "S1".to_string(),
        name: "2023/24".to_string(),
        is_live: true,
    };
    let divisions = list_divisions(&session, "divisions", &season).await;
    match divisions {
        Err(e @ HarvestError::Discovery { .. }) => assert!(!e.is_fatal()),
        other => panic!("expected discovery failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scrape_normalizes_failures() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/scrape-table"))
        .and(body_json(json!({"divisionId": "D1", "seasonId": "S1", "leagueId": "70"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/scrape-table"))
        .and(body_json(json!({"divisionId": "D2", "seasonId": "S1", "leagueId": "70"})))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let division = |id: &str| league_harvest::model::Division {
        id: id.to_string(),
        name: format!("Division {id}"),
        season_id: "S1".to_string(),
    };

    let outcome = scrape_division(&session, "scrape-table", &division("D1"), "70")
        .await
        .unwrap();
    assert!(matches!(outcome, ScrapeOutcome::Failure { transient: true, .. }));

    let expired = scrape_division(&session, "scrape-table", &division("D2"), "70").await;
    assert!(matches!(expired, Err(AuthError::Expired { status: 401, .. })));
}
