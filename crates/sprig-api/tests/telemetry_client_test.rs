// Integration tests for `TelemetryClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sprig_api::{Error, TelemetryClient, TransportConfig};

const OWNER: &str = "grower@example.com";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, TelemetryClient) {
    let server = MockServer::start().await;
    let client = TelemetryClient::from_reqwest(&server.uri(), OWNER, reqwest::Client::new()).unwrap();
    (server, client)
}

fn log_row(id: i64, device: serde_json::Value, temp: f64, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "deviceId": device,
        "temp": temp,
        "moistureDirt": 40.0,
        "moistureAir": 61.0,
        "rawSoil": 2100,
        "createdAt": created_at,
    })
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/iot/{OWNER}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["ESP32-TEST", "ESP32-B"])))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices, vec!["ESP32-TEST".to_owned(), "ESP32-B".to_owned()]);
}

#[tokio::test]
async fn test_latest_sample_takes_first_element() {
    let (server, client) = setup().await;

    let body = json!([
        log_row(9, json!("ESP32-TEST"), 23.46, "2025-03-01T10:00:00Z"),
        log_row(8, json!("ESP32-TEST"), 20.0, "2025-03-01T09:00:00Z"),
    ]);

    Mock::given(method("GET"))
        .and(path(format!("/logs/{OWNER}/ESP32-TEST")))
        .and(query_param("latest", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let sample = client.latest_sample("ESP32-TEST").await.unwrap().unwrap();
    assert_eq!(sample.id, Some(9));
    assert!((sample.temp - 23.46).abs() < f64::EPSILON);
    assert_eq!(sample.raw_soil, Some(2100.0));
}

#[tokio::test]
async fn test_latest_sample_empty_array_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/logs/{OWNER}/quiet")))
        .and(query_param("latest", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(client.latest_sample("quiet").await.unwrap().is_none());
}

#[tokio::test]
async fn test_recent_samples_sorted_newest_first_and_truncated() {
    let (server, client) = setup().await;

    let body = json!([
        log_row(1, json!(42), 18.0, "2025-03-01T08:00:00"),
        log_row(3, json!(42), 22.0, "2025-03-01T10:00:00"),
        log_row(2, json!(42), 20.0, "2025-03-01T09:00:00"),
    ]);

    Mock::given(method("GET"))
        .and(path(format!("/logs/{OWNER}/42")))
        .and(query_param("page_size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let samples = client.recent_samples("42", 2).await.unwrap();
    let ids: Vec<_> = samples.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![Some(3), Some(2)]);
    assert_eq!(samples[0].device_id, "42");
}

#[tokio::test]
async fn test_recent_samples_zero_limit_skips_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    assert!(client.recent_samples("ESP32-TEST", 0).await.unwrap().is_empty());
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/iot/{OWNER}")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    match &err {
        Error::Status { status, url } => {
            assert_eq!(*status, 503);
            assert!(url.contains("/iot/"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_not_found_is_not_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/logs/{OWNER}/ghost")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.latest_sample("ghost").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_keeps_raw_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/iot/{OWNER}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    let transport = TransportConfig::default().with_timeout(Duration::from_millis(100));
    let client = TelemetryClient::new(Url::parse(&server.uri()).unwrap(), OWNER.into(), &transport)
        .unwrap();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.latest_sample("ESP32-TEST").await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}
