//! Application state shared by all axum handlers.

use std::sync::Arc;

use wayfinder_lib::{Error as LibError, IdentityStore, MemoryIdentityStore, RoutingClient};

use crate::config::ServiceConfig;

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// The outbound HTTP client could not be built.
    ClientBuild(LibError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientBuild(e) => write!(f, "failed to build routing client: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ClientBuild(e) => Some(e),
        }
    }
}

impl From<LibError> for AppStateError {
    fn from(err: LibError) -> Self {
        Self::ClientBuild(err)
    }
}

/// Shared application state.
///
/// Cheaply cloneable (`Arc` inside); handed to handlers through axum's
/// `State` extractor. Holds no per-request data.
///
/// # Example
///
/// ```ignore
/// use axum::{extract::State, routing::get, Router};
/// use wayfinder_service_shared::{AppState, ServiceConfig};
///
/// async fn handler(State(state): State<AppState>) {
///     let configured = state.routing().is_configured();
/// }
///
/// let state = AppState::from_config(ServiceConfig::default()).unwrap();
/// let app = Router::new().route("/", get(handler)).with_state(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServiceConfig,
    routing: RoutingClient,
    identities: Arc<dyn IdentityStore>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        identities: Arc<dyn IdentityStore>,
    ) -> Result<Self, AppStateError> {
        let routing = RoutingClient::new(config.provider.clone())?;

        if !routing.is_configured() {
            tracing::warn!("routing provider key not configured; /api/route/ will answer 500");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                routing,
                identities,
            }),
        })
    }

    /// State backed by the in-process identity store.
    pub fn from_config(config: ServiceConfig) -> Result<Self, AppStateError> {
        Self::new(config, Arc::new(MemoryIdentityStore::new()))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn routing(&self) -> &RoutingClient {
        &self.inner.routing
    }

    pub fn identities(&self) -> &dyn IdentityStore {
        self.inner.identities.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("api_prefix", &self.inner.config.api_prefix)
            .field("provider_url", &self.inner.config.provider.base_url)
            .field("provider_configured", &self.inner.routing.is_configured())
            .finish()
    }
}
