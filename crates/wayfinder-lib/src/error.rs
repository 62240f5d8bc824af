use std::time::Duration;

use thiserror::Error;

/// Convenient result alias for the Wayfinder library.
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback message used when the routing provider's error body is unusable.
pub const UPSTREAM_FALLBACK_MESSAGE: &str = "routing provider error";

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// `start` or `dest` was absent, null or empty in the request body.
    #[error("start and dest required")]
    MissingField,

    /// A `lat`/`lng` value could not be coerced to a finite number.
    #[error("start and dest must contain numeric lat and lng")]
    InvalidCoordinate,

    /// No API key is configured for the routing provider.
    #[error("routing provider key not configured on server")]
    ProviderKeyMissing,

    /// The routing provider answered with a non-success status.
    ///
    /// `body` holds the provider's response text, possibly empty, or
    /// [`UPSTREAM_FALLBACK_MESSAGE`] when it could not be read as text.
    #[error("{body}")]
    Upstream { status: u16, body: String },

    /// The routing provider did not answer within the configured timeout.
    #[error("routing provider timed out after {}s", .timeout.as_secs())]
    UpstreamTimeout { timeout: Duration },

    /// The routing provider could not be reached.
    #[error("routing provider unreachable: {message}")]
    UpstreamUnavailable { message: String },

    /// The routing provider answered successfully but returned no path.
    #[error("no path")]
    NoRoute,

    /// The routing provider's success body did not have the expected shape.
    #[error("malformed routing provider response: {message}")]
    MalformedResponse { message: String },

    /// Signup or login was attempted without a username or password.
    #[error("username and password required")]
    MissingCredentials,

    /// The username/password pair did not match a known account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Signup was attempted with a username that already exists.
    #[error("username already taken")]
    UsernameTaken { username: String },

    /// A profile update body could not be applied.
    #[error("{message}")]
    InvalidProfile { message: String },

    /// The identity store could not serve the request.
    #[error("identity store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Wrapper for JSON decoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for HTTP client construction errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Password hashing or verification failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

impl Error {
    /// Short, stable label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::MissingField => "missing_field",
            Error::InvalidCoordinate => "invalid_coordinate",
            Error::ProviderKeyMissing => "provider_key_missing",
            Error::Upstream { .. } => "upstream_status",
            Error::UpstreamTimeout { .. } => "upstream_timeout",
            Error::UpstreamUnavailable { .. } => "upstream_unavailable",
            Error::NoRoute => "no_path",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::MissingCredentials => "missing_credentials",
            Error::InvalidCredentials => "invalid_credentials",
            Error::UsernameTaken { .. } => "username_taken",
            Error::InvalidProfile { .. } => "invalid_profile",
            Error::StoreUnavailable { .. } => "store_unavailable",
            Error::Json(_) => "invalid_json",
            Error::Http(_) => "http_client",
            Error::PasswordHash(_) => "password_hash",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_displays_provider_body() {
        let err = Error::Upstream {
            status: 503,
            body: "{\"message\":\"maintenance\"}".to_string(),
        };
        assert_eq!(err.to_string(), "{\"message\":\"maintenance\"}");
    }

    #[test]
    fn timeout_mentions_duration() {
        let err = Error::UpstreamTimeout {
            timeout: Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn validation_messages_match_public_contract() {
        assert_eq!(Error::MissingField.to_string(), "start and dest required");
        assert_eq!(
            Error::InvalidCoordinate.to_string(),
            "start and dest must contain numeric lat and lng"
        );
        assert_eq!(Error::NoRoute.to_string(), "no path");
    }
}
