//! Prometheus metrics infrastructure.
//!
//! - [`MetricsConfig`]: Configuration for the metrics system
//! - [`init_metrics`]: Install the Prometheus recorder
//! - [`metrics_handler`]: Axum handler for `/metrics`
//! - Business metric helpers for the routing proxy, auth and the API error wrapper
//!
//! Recording helpers are no-ops until a recorder is installed, so handlers and
//! tests can call them unconditionally.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Configuration for the metrics system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    /// `METRICS_ENABLED`: anything but "false" enables metrics (default: true).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("METRICS_ENABLED")
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self { enabled }
    }
}

/// Install the Prometheus recorder. Call once at startup.
///
/// # Errors
///
/// Fails when metrics are disabled, already initialized, or the recorder
/// cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if PROMETHEUS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// Axum handler rendering Prometheus exposition text.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Count a route successfully proxied to the provider.
pub fn record_route_proxied(vehicle: &str) {
    metrics::counter!(
        "wayfinder_routes_proxied_total",
        "vehicle" => vehicle.to_string()
    )
    .increment(1);
}

/// Count a failed route request by reason (see `wayfinder_lib::Error::reason`).
pub fn record_route_failed(reason: &'static str) {
    metrics::counter!("wayfinder_routes_failed_total", "reason" => reason).increment(1);
}

/// Record the number of points in a proxied route geometry.
pub fn record_route_points(points: usize) {
    metrics::histogram!("wayfinder_route_points").record(points as f64);
}

/// Count an auth event (`signup`, `login`, `logout`) and its outcome.
pub fn record_auth_event(event: &'static str, outcome: &'static str) {
    metrics::counter!(
        "wayfinder_auth_events_total",
        "event" => event,
        "outcome" => outcome
    )
    .increment(1);
}

/// Count a failure caught by the API error wrapper (`panic` or `error`).
pub fn record_api_exception(kind: &'static str) {
    metrics::counter!("wayfinder_api_exceptions_total", "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_enabled() {
        assert!(MetricsConfig::default().enabled);
        assert!(MetricsConfig::from_lookup(|_| None).enabled);
    }

    #[test]
    fn config_reads_disabled_flag() {
        let config = MetricsConfig::from_lookup(|name| {
            (name == "METRICS_ENABLED").then(|| "FALSE".to_string())
        });
        assert!(!config.enabled);
    }

    #[test]
    fn init_refuses_when_disabled() {
        let err = init_metrics(&MetricsConfig { enabled: false }).unwrap_err();
        assert_eq!(err, MetricsError::Disabled);
    }

    #[test]
    fn helpers_are_safe_without_recorder() {
        record_route_proxied("foot");
        record_route_failed("no_path");
        record_route_points(12);
        record_auth_event("login", "success");
        record_api_exception("panic");
    }

    #[tokio::test]
    async fn handler_reports_uninitialized_recorder() {
        if PROMETHEUS_HANDLE.get().is_none() {
            assert_eq!(metrics_handler().await, "# Metrics not initialized\n");
        }
    }
}
