//! Shared infrastructure for the Wayfinder HTTP service.
//!
//! - [`AppState`]: routing client, identity store and configuration
//! - [`ServiceConfig`]: environment-driven service configuration
//! - [`ApiError`]: JSON `{error, trace?}` bodies for every `/api/` failure
//! - [`ApiErrorLayer`]: outermost guard turning escaping panics and errors on
//!   API paths into JSON 500s
//! - [`health`]: liveness/readiness handlers
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request tracking and metrics middleware
//! - [`session`]: session cookie handling and the [`CurrentIdentity`] extractor
//!
//! # Architecture
//!
//! Handlers stay thin; validation, the provider call and identity handling
//! live in `wayfinder-lib`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ApiErrorLayer (panics / errors on /api/ → JSON 500)        │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │  MetricsLayer (request span, request id, metrics)     │  │
//! │  │  ┌─────────────────────────────────────────────────┐  │  │
//! │  │  │  axum Handler                                   │  │  │
//! │  │  │  - Parse request JSON                           │  │  │
//! │  │  │  - Call wayfinder-lib                           │  │  │
//! │  │  │  - Map lib errors with from_lib_error           │  │  │
//! │  │  └─────────────────────────────────────────────────┘  │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides a stub routing provider and state
//! helpers. Enable the `test-utils` feature to access it from dependent crates.

#![deny(warnings)]

mod api_error;
mod config;
mod error_wrapper;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod request;
pub mod session;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api_error::{from_lib_error, status_for, ApiError};
pub use config::{ConfigError, ServiceConfig, DEFAULT_API_PREFIX, DEFAULT_PORT};
pub use error_wrapper::{install_panic_hook, panic_message, ApiErrorFuture, ApiErrorLayer, ApiErrorService};
pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_api_exception, record_auth_event, record_route_failed,
    record_route_points, record_route_proxied, MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId};
pub use request::{parse_body, ApiBody, LoginRequest, SignupRequest, Validate};
pub use session::{expired_session_cookie, session_cookie, token_from_headers, CurrentIdentity};
pub use state::{AppState, AppStateError};
