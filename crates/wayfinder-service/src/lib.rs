//! Wayfinder HTTP service.
//!
//! # Endpoints
//!
//! - `POST /api/route/` - Proxy a start/destination pair to the routing provider
//! - `GET|POST|PUT /api/profile/` - Read or update the caller's profile
//! - `POST /api/profile/signup/`, `POST /api/profile/login/` - Open a session
//! - `/api/profile/logout/` - End the current session
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live`, `GET /health/ready` - Liveness and readiness probes
//!
//! [`app`] returns the complete service with [`ApiErrorLayer`] outside the
//! router, so failures anywhere in the stack on `/api/` paths are JSON.

#![deny(warnings)]

pub mod profile;
pub mod route;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use tower::Layer;
use tower_http::cors::CorsLayer;

use wayfinder_service_shared::{
    ApiError, ApiErrorLayer, ApiErrorService, AppState, MetricsLayer, health_live, health_ready,
    metrics_handler,
};

pub use profile::{login, logout, profile_view, signup};
pub use route::route_proxy;

/// Router with every endpoint, request tracking and optional CORS.
pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/route/", any(route_proxy))
        .route("/api/route", any(route_proxy))
        .route("/api/profile/", any(profile_view))
        .route("/api/profile/signup/", any(signup))
        .route("/api/profile/login/", any(login))
        .route("/api/profile/logout/", any(logout))
        .route("/metrics", get(metrics_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .fallback(not_found)
        .layer(MetricsLayer);

    let router = match cors_layer(state.config().cors_allowed_origin.as_deref()) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// The full service: [`router`] wrapped by the API error guard.
pub fn app(state: AppState) -> ApiErrorService<Router> {
    let layer = ApiErrorLayer::new(state.config().api_prefix.clone());
    layer.layer(router(state))
}

/// Unknown paths: JSON under the API prefix, a bare 404 elsewhere.
async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    if uri.path().starts_with(&state.config().api_prefix) {
        ApiError::new(StatusCode::NOT_FOUND, "not found").into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Credentialed CORS for a single frontend origin.
fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!(origin, error = %e, "ignoring invalid CORS origin");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}
