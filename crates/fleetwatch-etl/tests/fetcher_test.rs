//! Integration tests for the telemetry fetcher against a mock provider.

use fleetwatch_etl::config::FetcherConfig;
use fleetwatch_etl::error::EtlError;
use fleetwatch_etl::fetcher::{TelemetryClient, TelemetrySource};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, page_size: u32) -> TelemetryClient {
    TelemetryClient::new(FetcherConfig {
        base_url: format!("{}/vehicles", server.uri()),
        api_key: Some("secret".into()),
        page_size,
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap()
}

fn envelope(data: Vec<Value>, page: u64, total_pages: u64) -> Value {
    json!({
        "data": data,
        "total": 5,
        "page": page,
        "page_size": 2,
        "total_pages": total_pages,
    })
}

fn record(id: i64) -> Value {
    json!({ "vehicle_id": id, "vin": "1HGCM82633SZ12345" })
}

async fn mount_page(server: &MockServer, page: u64, body: Value) {
    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_until_last_page() {
    let server = MockServer::start().await;
    mount_page(&server, 1, envelope(vec![record(1), record(2)], 1, 3)).await;
    mount_page(&server, 2, envelope(vec![record(3), record(4)], 2, 3)).await;
    mount_page(&server, 3, envelope(vec![record(5)], 3, 3)).await;

    let records = client(&server, 2).fetch_all(0).await.unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[4]["vehicle_id"], 5);
}

#[tokio::test]
async fn stops_at_max_pages() {
    let server = MockServer::start().await;
    mount_page(&server, 1, envelope(vec![record(1), record(2)], 1, 3)).await;
    mount_page(&server, 2, envelope(vec![record(3), record(4)], 2, 3)).await;

    let records = client(&server, 2).fetch_all(1).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, 1, envelope(vec![record(1)], 1, 10)).await;
    mount_page(&server, 2, envelope(vec![], 2, 10)).await;

    let records = client(&server, 2).fetch_all(0).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn sends_page_size_and_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "5000"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![], 1, 0)))
        .expect(1)
        .mount(&server)
        .await;

    // Oversized page sizes are clamped to the provider maximum.
    let records = client(&server, 20_000).fetch_all(0).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn missing_envelope_field_is_a_format_error() {
    let server = MockServer::start().await;
    mount_page(&server, 1, json!({ "data": [], "page": 1 })).await;

    let err = client(&server, 2).fetch_all(0).await.unwrap_err();
    assert!(matches!(err, EtlError::ResponseFormat { .. }), "{err}");
}

#[tokio::test]
async fn http_error_status_is_a_format_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server, 2).fetch_all(0).await.unwrap_err();
    match err {
        EtlError::ResponseFormat { excerpt, .. } => assert_eq!(excerpt, "bad gateway"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn timeout_is_a_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(vec![], 1, 1))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client(&server, 2).fetch_all(0).await.unwrap_err();
    assert!(matches!(err, EtlError::Connection(_)), "{err}");
}

#[tokio::test]
async fn unreachable_provider_is_a_connection_error() {
    let client = TelemetryClient::new(FetcherConfig {
        base_url: "http://127.0.0.1:1/vehicles".into(),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let err = client.fetch_all(0).await.unwrap_err();
    assert!(matches!(err, EtlError::Connection(_)), "{err}");
}
