//! Service configuration read once at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `SERVICE_PORT` | `8080` |
//! | `API_PREFIX` | `/api/` |
//! | `ROUTING_PROVIDER_KEY` (or `GRAPHHOPPER_KEY`) | unset |
//! | `ROUTING_PROVIDER_URL` | GraphHopper route endpoint |
//! | `ROUTING_PROVIDER_VEHICLE` | `foot` |
//! | `ROUTING_PROVIDER_TIMEOUT_SECS` | `10` |
//! | `CORS_ALLOWED_ORIGIN` | unset |
//!
//! A missing provider key is not a startup error: the route endpoint answers
//! 500 and readiness reports not-ready until one is configured.

use std::fmt;
use std::time::Duration;

use wayfinder_lib::ProviderConfig;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_API_PREFIX: &str = "/api/";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { name: &'static str, value: String },
    InvalidPrefix { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber { name, value } => {
                write!(f, "{} must be a positive integer, got '{}'", name, value)
            }
            Self::InvalidPrefix { value } => {
                write!(f, "API_PREFIX must start with '/', got '{}'", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    /// Paths starting with this prefix get JSON error bodies.
    pub api_prefix: String,
    pub provider: ProviderConfig,
    /// Frontend origin allowed to call the API with credentials.
    pub cors_allowed_origin: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            provider: ProviderConfig::default(),
            cors_allowed_origin: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();

        if let Some(port) = value("SERVICE_PORT") {
            config.port = parse_positive("SERVICE_PORT", &port)?;
        }

        if let Some(prefix) = value("API_PREFIX") {
            if !prefix.starts_with('/') {
                return Err(ConfigError::InvalidPrefix { value: prefix });
            }
            config.api_prefix = prefix;
        }

        if let Some(key) = value("ROUTING_PROVIDER_KEY").or_else(|| value("GRAPHHOPPER_KEY")) {
            config.provider = config.provider.with_api_key(key);
        }
        if let Some(url) = value("ROUTING_PROVIDER_URL") {
            config.provider = config.provider.with_base_url(url);
        }
        if let Some(vehicle) = value("ROUTING_PROVIDER_VEHICLE") {
            config.provider.vehicle = vehicle;
        }
        if let Some(secs) = value("ROUTING_PROVIDER_TIMEOUT_SECS") {
            let secs: u64 = parse_positive("ROUTING_PROVIDER_TIMEOUT_SECS", &secs)?;
            config.provider = config.provider.with_timeout(Duration::from_secs(secs));
        }

        config.cors_allowed_origin = value("CORS_ALLOWED_ORIGIN");

        Ok(config)
    }

    /// Log the effective configuration without secrets.
    pub fn log(&self) {
        tracing::info!(
            port = self.port,
            api_prefix = %self.api_prefix,
            provider_url = %self.provider.base_url,
            provider_key_configured = self.provider.api_key.is_some(),
            vehicle = %self.provider.vehicle,
            timeout_secs = self.provider.timeout.as_secs(),
            cors_allowed_origin = self.cors_allowed_origin.as_deref().unwrap_or("-"),
            "service configuration"
        );
    }
}

fn parse_positive<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n != T::default() => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_prefix, "/api/");
        assert!(config.provider.api_key.is_none());
        assert_eq!(config.provider.timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_provider_settings() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("ROUTING_PROVIDER_KEY", "abc"),
            ("ROUTING_PROVIDER_URL", "http://localhost:8989/route"),
            ("ROUTING_PROVIDER_VEHICLE", "bike"),
            ("ROUTING_PROVIDER_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.provider.api_key.as_deref(), Some("abc"));
        assert_eq!(config.provider.base_url, "http://localhost:8989/route");
        assert_eq!(config.provider.vehicle, "bike");
        assert_eq!(config.provider.timeout, Duration::from_secs(3));
    }

    #[test]
    fn graphhopper_key_is_an_alias() {
        let config = ServiceConfig::from_lookup(lookup(&[("GRAPHHOPPER_KEY", "gh")])).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("gh"));
    }

    #[test]
    fn empty_key_is_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[("ROUTING_PROVIDER_KEY", "")])).unwrap();
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = ServiceConfig::from_lookup(lookup(&[("SERVICE_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("SERVICE_PORT"));

        let err =
            ServiceConfig::from_lookup(lookup(&[("ROUTING_PROVIDER_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn rejects_relative_prefix() {
        let err = ServiceConfig::from_lookup(lookup(&[("API_PREFIX", "api/")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrefix { .. }));
    }
}
