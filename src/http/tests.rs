//! Tests for the HTTP transport

use super::*;
use crate::auth::AuthConfig;
use crate::config::TapConfig;
use crate::error::Error;
use crate::types::BackoffType;
use serde_json::json;
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(server: &MockServer) -> HttpClientConfig {
    HttpClientConfig::for_base_url(server.uri())
        .with_backoff(Backoff::constant(Duration::from_millis(10)))
}

fn tap_config(url: &str) -> TapConfig {
    TapConfig::from_value(json!({
        "start_date": "2024-01-01T00:00:00Z",
        "client_id": "client",
        "client_secret": "secret",
        "redirect_uri": "https://localhost/callback",
        "refresh_token": "refresh-1",
        "org": "contoso",
        "url": url,
        "page_size": 250
    }))
    .unwrap()
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_default_settings() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(120));
    assert_eq!(config.max_retries, 3);
    assert!(config.base_url.is_none());
    assert_eq!(config.requests_per_second, Some(10));
    assert!(config.user_agent.starts_with("tap-dynamics/"));
}

#[test]
fn test_settings_from_tap_config() {
    let config = HttpClientConfig::from_tap_config(&tap_config("http://localhost:1/api/data/v9.0"));

    assert_eq!(
        config.base_url.as_deref(),
        Some("http://localhost:1/api/data/v9.0/")
    );
    assert_eq!(config.header("odata-version"), Some("4.0"));
    assert_eq!(config.header("Prefer"), Some("odata.maxpagesize=250"));
    assert_eq!(config.requests_per_second, Some(10));
}

#[test]
fn test_with_header_replaces_same_name() {
    let config = HttpClientConfig::default()
        .with_header("Accept", "application/json")
        .with_header("accept", "text/plain");
    assert_eq!(config.default_headers.len(), 1);
    assert_eq!(config.header("ACCEPT"), Some("text/plain"));
}

#[test]
fn test_invalid_default_header_rejected() {
    let config = HttpClientConfig::default().with_header("Bad Header", "x");
    let err = HttpClient::with_config(config).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}

#[test_case(BackoffType::Constant, [100, 100, 100, 100] ; "constant")]
#[test_case(BackoffType::Linear, [100, 200, 300, 400] ; "linear")]
#[test_case(BackoffType::Exponential, [100, 200, 400, 500] ; "exponential capped")]
fn test_backoff_schedule(kind: BackoffType, expected_ms: [u64; 4]) {
    let backoff = Backoff {
        kind,
        initial: Duration::from_millis(100),
        max: Duration::from_millis(500),
    };
    let delays: Vec<u64> = (0..4).map(|a| backoff.delay(a).as_millis() as u64).collect();
    assert_eq!(delays, expected_ms.to_vec());
}

#[test]
fn test_backoff_does_not_overflow() {
    let backoff = Backoff::default();
    assert_eq!(backoff.delay(u32::MAX), backoff.max);
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_odata_headers_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.0/accounts"))
        .and(header("Accept", "application/json"))
        .and(header("OData-Version", "4.0"))
        .and(header("OData-MaxVersion", "4.0"))
        .and(header("Prefer", "odata.maxpagesize=250"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config =
        HttpClientConfig::from_tap_config(&tap_config(&format!("{}/api/data/v9.0", server.uri())));
    config.requests_per_second = None;
    let client = HttpClient::with_config(config).unwrap();

    let body: serde_json::Value = client.get_json("accounts", &[]).await.unwrap();
    assert_eq!(body["value"], json!([]));
}

#[tokio::test]
async fn test_get_xml_overrides_accept() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/$metadata"))
        .and(header("Accept", "application/xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<edmx:Edmx/>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = fast_config(&server).with_header("Accept", "application/json");
    let client = HttpClient::with_config(config).unwrap();

    let body = client.get_xml("$metadata").await.unwrap();
    assert_eq!(body, "<edmx:Edmx/>");
}

#[tokio::test]
async fn test_query_params_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/leads"))
        .and(query_param("$filter", "modifiedon gt 2024-01-01T00:00:00Z"))
        .and(query_param("$orderby", "modifiedon asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let query = params(&[
        ("$filter", "modifiedon gt 2024-01-01T00:00:00Z"),
        ("$orderby", "modifiedon asc"),
    ]);
    let response = client.get("/leads", &query, None).await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_next_link_bypasses_base_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.0/accounts"))
        .and(query_param("$skiptoken", "abc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client =
        HttpClient::with_config(HttpClientConfig::for_base_url("http://unused.invalid/")).unwrap();

    let next = format!("{}/api/data/v9.0/accounts?$skiptoken=abc", server.uri());
    let response = client.get(&next, &[], None).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let err = client
        .get_json::<serde_json::Value>("accounts", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

// ============================================================================
// Failures and retries
// ============================================================================

#[tokio::test]
async fn test_404_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let err = client.get("/widgets", &[], None).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 404, ref body } if body == "Not found"));
    assert!(err.is_not_found());
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_server_error_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let response = client.get("/flaky", &[], None).await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_429_waits_for_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let started = std::time::Instant::now();
    let response = client.get("/limited", &[], None).await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-fail"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = fast_config(&server);
    config.max_retries = 2;
    let client = HttpClient::with_config(config).unwrap();
    let err = client.get("/always-fail", &[], None).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_401_refreshes_token_and_retries_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "stale",
            "refresh_token": "refresh-2",
            "expires_in": 3599
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-3",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthConfig::Oauth2Refresh {
        token_url: format!("{}/oauth2/token", server.uri()),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "https://localhost/callback".to_string(),
        refresh_token: "refresh-1".to_string(),
        resource: "https://contoso.crm.dynamics.com".to_string(),
        persist_to: None,
    };
    let client = HttpClient::with_auth(fast_config(&server), auth).unwrap();

    let response = client.get("/accounts", &[], None).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_401_with_static_token_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthConfig::Bearer {
        token: "static".to_string(),
    };
    let client = HttpClient::with_auth(fast_config(&server), auth).unwrap();

    let err = client.get("/accounts", &[], None).await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_throttled_client_still_serves_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = fast_config(&server);
    config.requests_per_second = Some(100);
    let client = HttpClient::with_config(config).unwrap();

    for _ in 0..3 {
        let response = client.get("/data", &[], None).await.unwrap();
        assert_eq!(response.status(), 200);
    }
}
