//! End-to-end harvest runs against a mock league source

use league_harvest::config::{Config, OutputConfig, SchedulerConfig, SourceConfig, UserAgentConfig};
use league_harvest::harvest::run_harvest;
use league_harvest::storage::{KeyPrefix, ReconciliationStore, RunStatus, SqliteStorage};
use serde_json::json;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &Path, summary_path: Option<&Path>) -> Config {
    Config {
        source: SourceConfig {
            base_url: format!("{}/api/", base_url),
            league_id: "70".to_string(),
            username: "harvester".to_string(),
            password: Some("hunter2".to_string()),
            password_env: None,
            login_path: "auth/login".to_string(),
            seasons_path: "seasons".to_string(),
            divisions_path: "divisions".to_string(),
            scrape_path: "scrape-table".to_string(),
            request_timeout_secs: 5,
        },
        scheduler: SchedulerConfig {
            base_delay_ms: 10, // Very short for testing
            jitter_ms: 5,
            max_attempts: 1,
        },
        user_agent: UserAgentConfig {
            agent_name: "TestHarvester".to_string(),
            agent_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            summary_path: summary_path.map(|p| p.to_string_lossy().into_owned()),
        },
    }
}

async fn mock_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .expect(1)
        .mount(server)
        .await;
}

async fn mock_seasons(server: &MockServer, seasons: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/seasons"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(seasons))
        .mount(server)
        .await;
}

async fn mock_divisions(server: &MockServer, season_id: &str, divisions: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/divisions/{}", season_id)))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(divisions))
        .mount(server)
        .await;
}

async fn mock_scrape(server: &MockServer, division_id: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/scrape-table"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_partial_json(json!({"divisionId": division_id, "leagueId": "70"})))
        .respond_with(response)
        .mount(server)
        .await;
}

fn table_response(teams: &[&str]) -> ResponseTemplate {
    let rows: Vec<_> = teams
        .iter()
        .enumerate()
        .map(|(i, team)| {
            json!({
                "teamName": team,
                "position": i + 1,
                "played": 10,
                "won": 10 - i,
                "points": 30 - 3 * i
            })
        })
        .collect();

    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "databaseResult": {"teamsCreated": teams.len(), "teamsUpdated": 0},
        "data": {"table": rows}
    }))
}

#[tokio::test]
async fn test_full_harvest_one_success_one_failure() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let summary_path = dir.path().join("summary.md");

    mock_login(&server).await;
    mock_seasons(&server, json!([{"id": "S1", "name": "2023/24", "isLive": true}])).await;
    mock_divisions(
        &server,
        "S1",
        json!({"divisions": [{"id": "D1", "name": "Premier"}, {"id": "D2", "name": "Division One"}]}),
    )
    .await;
    mock_scrape(&server, "D1", table_response(&["Rovers", "United", "Athletic"])).await;
    mock_scrape(
        &server,
        "D2",
        ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "table missing"})),
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, Some(&summary_path));
    let summary = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.totals.divisions_attempted, 2);
    assert_eq!(summary.totals.divisions_succeeded, 1);
    assert_eq!(summary.totals.divisions_failed, 1);
    assert_eq!(summary.totals.teams_created, 3);
    assert_eq!(summary.totals.teams_updated, 0);
    assert_eq!(summary.seasons[0].failures[0].reason, "table missing");

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_total_teams().unwrap(), 3);
    assert_eq!(storage.league_table("S1", "D1").unwrap().len(), 3);

    let rovers = storage
        .find_teams_by_natural_key_prefix(&KeyPrefix::team("Rovers"))
        .unwrap();
    assert_eq!(rovers.len(), 1);
    assert_eq!(rovers[0].key.division_label, "Premier");
    assert_eq!(rovers[0].key.league_id, "70");
    assert_eq!(rovers[0].division_id, "D1");

    let markdown = std::fs::read_to_string(&summary_path).unwrap();
    assert!(markdown.contains("- **Divisions Failed**: 1"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .expect(2)
        .mount(&server)
        .await;
    mock_seasons(&server, json!([{"id": "S1", "name": "2023/24"}])).await;
    mock_divisions(&server, "S1", json!([{"id": "D1", "name": "Premier"}])).await;
    mock_scrape(&server, "D1", table_response(&["Rovers", "United"])).await;

    let config = create_test_config(&server.uri(), &db_path, None);
    let first = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();
    let second = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.totals.teams_created, 2);
    assert_eq!(second.totals.teams_created, 0);
    assert_eq!(second.totals.teams_updated, 2);
    assert_eq!(second.net_new_teams(), 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_total_teams().unwrap(), 2);
    assert_eq!(storage.latest_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_login_failure_aborts_before_discovery() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/seasons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path, None);
    let summary = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_aborted());
    assert_eq!(summary.totals.divisions_attempted, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let runs = storage.latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Aborted);
}

#[tokio::test]
async fn test_division_listing_failure_skips_only_that_season() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    mock_login(&server).await;
    mock_seasons(
        &server,
        json!([{"id": "S1", "name": "2022/23"}, {"id": "S2", "name": "2023/24"}]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/divisions/S1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mock_divisions(&server, "S2", json!([{"id": "D9", "name": "Premier"}])).await;
    mock_scrape(&server, "D9", table_response(&["Rovers"])).await;

    let config = create_test_config(&server.uri(), &db_path, None);
    let summary = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.seasons.len(), 2);
    assert!(summary.seasons[0].discovery_error.is_some());
    assert_eq!(summary.seasons[1].totals.divisions_succeeded, 1);
    assert_eq!(summary.totals.teams_created, 1);
}

#[tokio::test]
async fn test_empty_season_list_is_nothing_to_do() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    mock_login(&server).await;
    mock_seasons(&server, json!({"seasons": []})).await;

    let config = create_test_config(&server.uri(), &db_path, None);
    let summary = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.nothing_to_do);
    assert_eq!(summary.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_remote_counts_used_without_table() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    mock_login(&server).await;
    mock_seasons(&server, json!([{"id": "S1", "name": "2023/24"}])).await;
    mock_divisions(&server, "S1", json!([{"id": "D1", "name": "Premier"}])).await;
    mock_scrape(
        &server,
        "D1",
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "databaseResult": {"teamsCreated": 4, "teamsUpdated": 6}
        })),
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, None);
    let summary = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.totals.teams_created, 4);
    assert_eq!(summary.totals.teams_updated, 6);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_total_teams().unwrap(), 0);
}

#[tokio::test]
async fn test_transient_failure_retried_when_configured() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    mock_login(&server).await;
    mock_seasons(&server, json!([{"id": "S1", "name": "2023/24"}])).await;
    mock_divisions(&server, "S1", json!([{"id": "D1", "name": "Premier"}])).await;

    // First attempt hits a 503, the retry gets the table
    Mock::given(method("POST"))
        .and(path("/api/scrape-table"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mock_scrape(&server, "D1", table_response(&["Rovers"])).await;

    let mut config = create_test_config(&server.uri(), &db_path, None);
    config.scheduler.max_attempts = 2;

    let summary = run_harvest(&config, "hash", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.totals.divisions_succeeded, 1);
    assert_eq!(summary.totals.divisions_failed, 0);
    assert_eq!(summary.totals.teams_created, 1);
}
