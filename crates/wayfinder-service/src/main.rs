//! Wayfinder HTTP service binary.
//!
//! # Configuration
//!
//! - `ROUTING_PROVIDER_KEY` - Routing provider API key (alias `GRAPHHOPPER_KEY`)
//! - `ROUTING_PROVIDER_URL`, `ROUTING_PROVIDER_VEHICLE`, `ROUTING_PROVIDER_TIMEOUT_SECS`
//! - `API_PREFIX` - Paths answered with JSON errors (default: `/api/`)
//! - `CORS_ALLOWED_ORIGIN` - Frontend origin allowed to send credentials
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `METRICS_ENABLED` - Install the Prometheus recorder (default: true)

use std::net::SocketAddr;

use axum::extract::Request;
use tracing::{error, info};

use wayfinder_service::app;
use wayfinder_service_shared::{
    AppState, LoggingConfig, MetricsConfig, ServiceConfig, init_logging, init_metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service("wayfinder");
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        tracing::warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = ServiceConfig::from_env().map_err(|e| {
        error!(error = %e, "invalid configuration");
        e
    })?;
    config.log();

    let port = config.port;
    let state = AppState::from_config(config).map_err(|e| {
        error!(error = %e, "failed to build application state");
        e
    })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let service = axum::ServiceExt::<Request>::into_make_service(app(state));
    axum::serve(listener, service).await?;

    Ok(())
}
