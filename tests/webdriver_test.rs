use httpmock::prelude::*;
use maplink_geocoder::adapters::WebDriverRedirectResolver;
use maplink_geocoder::config::ResolverKind;
use maplink_geocoder::domain::ports::RedirectResolver;
use maplink_geocoder::{app, EtlEngine, EtlError, Settings};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

const PLACE_URL: &str = "https://www.google.com/maps/place/Z%C3%B3calo/@19.4326,-99.1332,17z";

fn mock_session(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/session");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"value": {"sessionId": "abc123", "capabilities": {}}}));
    })
}

fn mock_navigation(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/session/abc123/url");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"value": null}));
    })
}

fn mock_current_url<'a>(server: &'a MockServer, url: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path("/session/abc123/url");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "value": url }));
    })
}

fn mock_source(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/session/abc123/source");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"value": "<html><body>Zócalo</body></html>"}));
    })
}

fn mock_delete(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(DELETE).path("/session/abc123");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"value": null}));
    })
}

#[tokio::test]
async fn test_browser_session_reused_and_closed() {
    let server = MockServer::start();
    let session_mock = mock_session(&server);
    let navigation_mock = mock_navigation(&server);
    mock_current_url(&server, PLACE_URL);
    mock_source(&server);
    let delete_mock = mock_delete(&server);

    let resolver = WebDriverRedirectResolver::new(&server.base_url())
        .unwrap()
        .with_poll_interval(Duration::from_millis(20));

    let first = resolver
        .fetch("https://maps.app.goo.gl/a", Duration::from_secs(5))
        .await
        .unwrap();
    let second = resolver
        .fetch("https://maps.app.goo.gl/b", Duration::from_secs(5))
        .await
        .unwrap();
    resolver.shutdown().await.unwrap();

    assert_eq!(first.final_url, PLACE_URL);
    assert_eq!(second.body.as_deref(), Some("<html><body>Zócalo</body></html>"));
    session_mock.assert_hits(1);
    navigation_mock.assert_hits(2);
    delete_mock.assert_hits(1);
}

#[tokio::test]
async fn test_browser_times_out_when_url_never_settles() {
    let server = MockServer::start();
    mock_session(&server);
    mock_navigation(&server);
    let poll_mock = mock_current_url(&server, "https://maps.app.goo.gl/still-loading");
    let source_mock = mock_source(&server);

    let resolver = WebDriverRedirectResolver::new(&server.base_url())
        .unwrap()
        .with_poll_interval(Duration::from_millis(50));

    let err = resolver
        .fetch("https://maps.app.goo.gl/still-loading", Duration::from_millis(300))
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::RedirectTimeout { .. }));
    assert!(err.is_retryable());
    assert!(poll_mock.hits() >= 2);
    source_mock.assert_hits(0);
}

#[tokio::test]
async fn test_dead_session_is_replaced_on_next_fetch() {
    let server = MockServer::start();
    let session_mock = mock_session(&server);
    mock_navigation(&server);
    let poll_mock = server.mock(|when, then| {
        when.method(GET).path("/session/abc123/url");
        then.status(404)
            .header("Content-Type", "application/json")
            .json_body(json!({"value": {
                "error": "invalid session id",
                "message": "session deleted because of page crash"
            }}));
    });

    let resolver = WebDriverRedirectResolver::new(&server.base_url())
        .unwrap()
        .with_poll_interval(Duration::from_millis(20));

    for url in ["https://maps.app.goo.gl/a", "https://maps.app.goo.gl/b"] {
        let err = resolver.fetch(url, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, EtlError::WebDriverError { .. }));
    }

    poll_mock.assert_hits(2);
    session_mock.assert_hits(2);
}

#[tokio::test]
async fn test_driver_error_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/session");
        then.status(500)
            .header("Content-Type", "application/json")
            .json_body(json!({"value": {
                "error": "session not created",
                "message": "Chrome binary not found"
            }}));
    });

    let resolver = WebDriverRedirectResolver::new(&server.base_url()).unwrap();
    let err = resolver
        .fetch("https://maps.app.goo.gl/a", Duration::from_secs(5))
        .await
        .unwrap_err();

    match err {
        EtlError::WebDriverError { message } => {
            assert!(message.contains("session not created"));
            assert!(message.contains("Chrome binary not found"));
        }
        other => panic!("expected WebDriverError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_browser_resolver_selected_from_settings() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    mock_session(&server);
    mock_navigation(&server);
    mock_current_url(&server, PLACE_URL);
    mock_source(&server);
    let delete_mock = mock_delete(&server);

    let input = temp_dir.path().join("links.csv");
    std::fs::write(&input, "google_maps_url\nhttps://maps.app.goo.gl/a\n").unwrap();
    let output = temp_dir.path().join("out");

    let mut settings = Settings::default();
    settings.input.path = input.to_str().unwrap().to_string();
    settings.output.path = output.to_str().unwrap().to_string();
    settings.output.formats = vec!["csv".to_string()];
    settings.output.expand_urls = true;
    settings.resolver.kind = ResolverKind::Browser;
    settings.resolver.webdriver_url = server.base_url();
    settings.resolver.poll_interval_ms = 20;
    settings.resolver.record_delay_seconds = 0.0;
    settings.resolver.min_interval_ms = 0;
    settings.geocoder.enabled = false;

    let summary = EtlEngine::new(app::build_pipeline(settings).unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.report.resolved_url_pattern, 1);
    delete_mock.assert();

    let csv = std::fs::read_to_string(output.join("geocoded.csv")).unwrap();
    assert!(csv.contains("\"https://www.google.com/maps/place/Zócalo/@19.4326,-99.1332,17z\",19.4326,-99.1332"));
}
