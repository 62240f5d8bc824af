//! Test utilities for handler testing.
//!
//! [`StubProvider`] is a throwaway GraphHopper stand-in served by axum on an
//! ephemeral local port. It answers every request with a canned status and
//! body and records the raw query strings it received.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::RawQuery;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use wayfinder_lib::{MemoryIdentityStore, ProviderConfig, MIN_HASH_COST};

use crate::config::ServiceConfig;
use crate::state::AppState;

/// Provider key used by [`test_config`].
pub const TEST_PROVIDER_KEY: &str = "test-key";

/// Known request/response pair for the Berlin example.
pub mod fixture_routes {
    /// Request body for a short route in Berlin.
    pub const BERLIN_REQUEST: &str =
        r#"{"start": {"lat": 52.5, "lng": 13.4}, "dest": {"lat": 52.6, "lng": 13.5}}"#;

    /// Provider answer for [`BERLIN_REQUEST`], in `[lng, lat]` order.
    pub const BERLIN_PROVIDER_BODY: &str =
        r#"{"paths":[{"points":{"coordinates":[[13.4,52.5],[13.5,52.6]]}}]}"#;
}

/// Local stand-in for the routing provider.
pub struct StubProvider {
    addr: SocketAddr,
    queries: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl StubProvider {
    /// Answer every request with `status` and `body`.
    pub async fn spawn(status: StatusCode, body: impl Into<String>) -> Self {
        Self::spawn_delayed(status, body, Duration::ZERO).await
    }

    /// Like [`StubProvider::spawn`], but wait `delay` before answering.
    pub async fn spawn_delayed(status: StatusCode, body: impl Into<String>, delay: Duration) -> Self {
        let body = body.into();
        let queries = Arc::new(Mutex::new(Vec::new()));
        let recorded = queries.clone();

        let app = Router::new().route(
            "/route",
            get(move |RawQuery(query): RawQuery| {
                let body = body.clone();
                let recorded = recorded.clone();
                async move {
                    recorded
                        .lock()
                        .unwrap()
                        .push(query.unwrap_or_default());
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (status, [(header::CONTENT_TYPE, "application/json")], body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub provider");
        let addr = listener.local_addr().expect("stub provider address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub provider server");
        });

        Self {
            addr,
            queries,
            handle,
        }
    }

    /// URL to configure as the provider endpoint.
    pub fn base_url(&self) -> String {
        format!("http://{}/route", self.addr)
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Raw query string of the most recent request.
    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }
}

impl Drop for StubProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Configuration pointing at `base_url` with a test key and a short timeout.
pub fn test_config(base_url: &str) -> ServiceConfig {
    ServiceConfig {
        provider: ProviderConfig::default()
            .with_api_key(TEST_PROVIDER_KEY)
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(2)),
        ..ServiceConfig::default()
    }
}

/// State for `config` with an identity store that hashes at the cheapest cost.
pub fn state_with_config(config: ServiceConfig) -> AppState {
    let identities = Arc::new(MemoryIdentityStore::new().with_hash_cost(MIN_HASH_COST));
    AppState::new(config, identities)
        .unwrap_or_else(|e| panic!("failed to build test state: {}", e))
}

/// State talking to the provider at `base_url`.
pub fn test_state(base_url: &str) -> AppState {
    state_with_config(test_config(base_url))
}

/// State with no provider key configured.
pub fn unconfigured_state() -> AppState {
    state_with_config(ServiceConfig::default())
}
