//! Client for a GraphHopper-compatible directions provider.
//!
//! One call to [`RoutingClient::fetch_path`] performs exactly one outbound
//! request. Failures are surfaced immediately and never retried.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::coordinate::{LngLat, RouteRequest};
use crate::error::{Error, Result, UPSTREAM_FALLBACK_MESSAGE};

/// Default endpoint of the hosted GraphHopper routing API.
pub const DEFAULT_PROVIDER_URL: &str = "https://graphhopper.com/api/1/route";

/// Default vehicle profile requested from the provider.
pub const DEFAULT_VEHICLE: &str = "foot";

/// Default bound on a single outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the routing provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Provider API key. `None` makes every call fail with
    /// [`Error::ProviderKeyMissing`].
    pub api_key: Option<String>,
    pub vehicle: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: None,
            vehicle: DEFAULT_VEHICLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("vehicle", &self.vehicle)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Set the API key, treating an empty or blank key as unset.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    paths: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ProviderPath {
    points: ProviderPoints,
}

#[derive(Debug, Deserialize)]
struct ProviderPoints {
    coordinates: Vec<Vec<f64>>,
}

/// Async HTTP client for the routing provider.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RoutingClient {
    http: Client,
    config: ProviderConfig,
}

impl RoutingClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Whether an API key is available for outbound calls.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Build the provider URL for `request`.
    pub fn request_url(&self, request: &RouteRequest) -> Result<Url> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(Error::ProviderKeyMissing)?;

        Url::parse_with_params(
            &self.config.base_url,
            &[
                ("point", request.start.as_query_point()),
                ("point", request.dest.as_query_point()),
                ("vehicle", self.config.vehicle.clone()),
                ("points_encoded", "false".to_string()),
                ("key", key.to_string()),
            ],
        )
        .map_err(|e| Error::UpstreamUnavailable {
            message: format!("invalid provider url {}: {}", self.config.base_url, e),
        })
    }

    /// Fetch the first path's geometry in the provider's `[lng, lat]` order.
    pub async fn fetch_path(&self, request: &RouteRequest) -> Result<Vec<LngLat>> {
        let url = self.request_url(request)?;
        debug!(
            start = %request.start.as_query_point(),
            dest = %request.dest.as_query_point(),
            vehicle = %self.config.vehicle,
            "requesting route from provider"
        );

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    debug!(error = %e, "provider error body unreadable");
                    UPSTREAM_FALLBACK_MESSAGE.to_string()
                }
            };
            warn!(status = status.as_u16(), "routing provider returned an error status");
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        parse_provider_body(&bytes)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::UpstreamTimeout {
                timeout: self.config.timeout,
            }
        } else {
            Error::UpstreamUnavailable {
                message: err.to_string(),
            }
        }
    }
}

/// Decode a successful provider body into the first path's positions.
///
/// Elevation or other trailing elements of a position are dropped.
pub fn parse_provider_body(body: &[u8]) -> Result<Vec<LngLat>> {
    let response: ProviderResponse =
        serde_json::from_slice(body).map_err(|e| Error::MalformedResponse {
            message: e.to_string(),
        })?;

    let first = response
        .paths
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or(Error::NoRoute)?;
    let path: ProviderPath =
        serde_json::from_value(first).map_err(|e| Error::MalformedResponse {
            message: e.to_string(),
        })?;

    path.points
        .coordinates
        .into_iter()
        .enumerate()
        .map(|(index, position)| match position.as_slice() {
            [lng, lat, ..] => Ok(LngLat(*lng, *lat)),
            _ => Err(Error::MalformedResponse {
                message: format!("position {} has fewer than two elements", index),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;

    fn berlin_request() -> RouteRequest {
        RouteRequest::new(Coordinate::new(52.5, 13.4), Coordinate::new(52.6, 13.5))
    }

    fn client(config: ProviderConfig) -> RoutingClient {
        RoutingClient::new(config).expect("client builds")
    }

    #[test]
    fn request_url_carries_points_vehicle_and_key() {
        let client = client(ProviderConfig::default().with_api_key("secret"));
        let url = client.request_url(&berlin_request()).unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("point".to_string(), "52.5,13.4".to_string()),
                ("point".to_string(), "52.6,13.5".to_string()),
                ("vehicle".to_string(), "foot".to_string()),
                ("points_encoded".to_string(), "false".to_string()),
                ("key".to_string(), "secret".to_string()),
            ]
        );
        assert!(url.as_str().starts_with(DEFAULT_PROVIDER_URL));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = ProviderConfig::default().with_api_key("secret-key");
        let debug = format!("{:?}", config);
        assert!(debug.contains("<redacted>"), "debug: {debug}");
        assert!(!debug.contains("secret-key"));

        let debug = format!("{:?}", client(config));
        assert!(!debug.contains("secret-key"));

        assert!(format!("{:?}", ProviderConfig::default()).contains("api_key: None"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let client = client(ProviderConfig::default().with_api_key("   "));
        assert!(!client.is_configured());
        assert!(matches!(
            client.request_url(&berlin_request()),
            Err(Error::ProviderKeyMissing)
        ));
    }

    #[tokio::test]
    async fn fetch_without_key_fails_before_network() {
        let client = client(ProviderConfig::default().with_base_url("http://127.0.0.1:9/route"));
        let err = client.fetch_path(&berlin_request()).await.unwrap_err();
        assert!(matches!(err, Error::ProviderKeyMissing));
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        // Port 9 (discard) is not expected to be listening on loopback.
        let client = client(
            ProviderConfig::default()
                .with_api_key("k")
                .with_base_url("http://127.0.0.1:9/route"),
        );
        let err = client.fetch_path(&berlin_request()).await.unwrap_err();
        assert!(
            matches!(err, Error::UpstreamUnavailable { .. } | Error::UpstreamTimeout { .. }),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn parses_first_path_only() {
        let body = br#"{"paths":[
            {"points":{"coordinates":[[13.4,52.5],[13.5,52.6]]}},
            {"points":{"coordinates":[[0.0,0.0]]}}
        ]}"#;
        let points = parse_provider_body(body).unwrap();
        assert_eq!(points, vec![LngLat(13.4, 52.5), LngLat(13.5, 52.6)]);
    }

    #[test]
    fn drops_elevation() {
        let body = br#"{"paths":[{"points":{"coordinates":[[13.4,52.5,34.0]]}}]}"#;
        assert_eq!(parse_provider_body(body).unwrap(), vec![LngLat(13.4, 52.5)]);
    }

    #[test]
    fn empty_or_absent_paths_mean_no_route() {
        assert!(matches!(
            parse_provider_body(br#"{"paths":[]}"#),
            Err(Error::NoRoute)
        ));
        assert!(matches!(
            parse_provider_body(br#"{"info":{}}"#),
            Err(Error::NoRoute)
        ));
        assert!(matches!(
            parse_provider_body(br#"{"paths":null}"#),
            Err(Error::NoRoute)
        ));
    }

    #[test]
    fn path_without_points_is_malformed() {
        assert!(matches!(
            parse_provider_body(br#"{"paths":[{"distance":12.0}]}"#),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn short_position_is_malformed() {
        let err =
            parse_provider_body(br#"{"paths":[{"points":{"coordinates":[[13.4]]}}]}"#).unwrap_err();
        assert!(err.to_string().contains("position 0"));
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(
            parse_provider_body(b"<html>oops</html>"),
            Err(Error::MalformedResponse { .. })
        ));
    }
}
