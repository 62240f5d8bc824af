use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use wayfinder_service::router;
use wayfinder_service_shared::AppState;
use wayfinder_service_shared::test_utils::{
    StubProvider, TEST_PROVIDER_KEY, fixture_routes, test_config, test_state, unconfigured_state,
};

fn server(state: AppState) -> TestServer {
    TestServer::new(router(state)).expect("test server")
}

fn berlin() -> Value {
    serde_json::from_str(fixture_routes::BERLIN_REQUEST).unwrap()
}

#[tokio::test]
async fn proxies_berlin_example() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({"coords": [[52.5, 13.4], [52.6, 13.5]]})
    );
}

#[tokio::test]
async fn sends_points_in_lat_lng_order_with_key() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    server.post("/api/route/").json(&berlin()).await;

    let query = stub
        .last_query()
        .expect("provider was called")
        .replace("%2C", ",");
    let key = format!("key={}", TEST_PROVIDER_KEY);
    let pairs: Vec<&str> = query.split('&').collect();
    assert_eq!(
        pairs,
        vec![
            "point=52.5,13.4",
            "point=52.6,13.5",
            "vehicle=foot",
            "points_encoded=false",
            key.as_str(),
        ]
    );
}

#[tokio::test]
async fn route_without_trailing_slash_is_served() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route").json(&berlin()).await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn drops_elevation_from_provider_points() {
    let body = r#"{"paths":[{"points":{"coordinates":[[13.4,52.5,34.0],[13.5,52.6,41.5]]}}]}"#;
    let stub = StubProvider::spawn(StatusCode::OK, body).await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route/").json(&berlin()).await;
    assert_eq!(
        response.json::<Value>(),
        json!({"coords": [[52.5, 13.4], [52.6, 13.5]]})
    );
}

#[tokio::test]
async fn provider_error_status_becomes_bad_gateway_with_its_body() {
    let stub = StubProvider::spawn(StatusCode::SERVICE_UNAVAILABLE, "maintenance window").await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>(), json!({"error": "maintenance window"}));
}

#[tokio::test]
async fn provider_error_with_empty_body_is_forwarded() {
    let stub = StubProvider::spawn(StatusCode::INTERNAL_SERVER_ERROR, "").await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>(), json!({"error": ""}));
}

#[tokio::test]
async fn empty_paths_is_no_path() {
    let stub = StubProvider::spawn(StatusCode::OK, r#"{"paths": []}"#).await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "no path"}));
}

#[tokio::test]
async fn get_is_method_not_allowed() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    let response = server.get("/api/route/").await;

    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json::<Value>(), json!({"error": "POST required"}));
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn missing_dest_is_bad_request() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    let response = server
        .post("/api/route/")
        .json(&json!({"start": {"lat": 52.5, "lng": 13.4}}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>(),
        json!({"error": "start and dest required"})
    );
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn non_numeric_latitude_is_bad_request() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    let response = server
        .post("/api/route/")
        .json(&json!({"start": {"lat": "abc", "lng": 1}, "dest": {"lat": 1, "lng": 2}}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let error = response.json::<Value>()["error"].as_str().unwrap().to_string();
    assert!(error.contains("numeric"), "error: {error}");
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn numeric_strings_are_accepted() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let server = server(test_state(&stub.base_url()));

    let response = server
        .post("/api/route/")
        .json(&json!({"start": {"lat": "52.5", "lng": "13.4"}, "dest": {"lat": 52.6, "lng": 13.5}}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn missing_key_fails_without_calling_provider() {
    let stub = StubProvider::spawn(StatusCode::OK, fixture_routes::BERLIN_PROVIDER_BODY).await;
    let mut config = test_config(&stub.base_url());
    config.provider.api_key = None;
    let server = server(AppState::from_config(config).unwrap());

    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>(),
        json!({"error": "routing provider key not configured on server"})
    );
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn body_that_is_not_json_is_server_error() {
    let server = server(unconfigured_state());

    let response = server.post("/api/route/").text("{not json").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn unreachable_provider_is_bad_gateway() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/route", closed.local_addr().unwrap());
    drop(closed);

    let server = server(test_state(&url));
    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let stub = StubProvider::spawn_delayed(
        StatusCode::OK,
        fixture_routes::BERLIN_PROVIDER_BODY,
        Duration::from_secs(5),
    )
    .await;
    let server = server(test_state(&stub.base_url()));

    let response = server.post("/api/route/").json(&berlin()).await;

    assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        response.json::<Value>(),
        json!({"error": "routing provider timed out after 2s"})
    );
}

#[tokio::test]
async fn readiness_tracks_provider_key() {
    let response = server(unconfigured_state()).get("/health/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let response = server(test_state("http://127.0.0.1:1/route"))
        .get("/health/ready")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server(unconfigured_state()).get("/health/live").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}
