//! JSON error payloads for API endpoints.
//!
//! Every failure under the API prefix is answered with
//! `{"error": "...", "trace": "..."}` where `trace` is only present when the
//! API error wrapper caught an unexpected failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use wayfinder_lib::Error as LibError;

/// Error body returned by API endpoints.
///
/// # Example
///
/// ```
/// use wayfinder_service_shared::ApiError;
/// use axum::http::StatusCode;
///
/// let error = ApiError::new(StatusCode::BAD_REQUEST, "start and dest required");
/// assert_eq!(error.status(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status; carried in the status line, not the body.
    #[serde(skip)]
    status: u16,

    /// Human-readable message.
    pub error: String,

    /// Diagnostic detail attached by the API error wrapper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            error: error.into(),
            trace: None,
        }
    }

    /// Attach a diagnostic trace.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 Bad Request.
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// 405 Method Not Allowed.
    pub fn method_not_allowed(error: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, error)
    }

    /// 500 Internal Server Error.
    pub fn internal_error(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.error)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Status code for a library error.
pub fn status_for(error: &LibError) -> StatusCode {
    match error {
        LibError::MissingField
        | LibError::InvalidCoordinate
        | LibError::NoRoute
        | LibError::MissingCredentials
        | LibError::InvalidProfile { .. } => StatusCode::BAD_REQUEST,
        LibError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LibError::UsernameTaken { .. } => StatusCode::CONFLICT,
        LibError::Upstream { .. } | LibError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        LibError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        LibError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LibError::ProviderKeyMissing
        | LibError::MalformedResponse { .. }
        | LibError::Json(_)
        | LibError::Http(_)
        | LibError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a library error into its API response body.
pub fn from_lib_error(error: &LibError) -> ApiError {
    ApiError::new(status_for(error), error.to_string())
}

impl From<LibError> for ApiError {
    fn from(error: LibError) -> Self {
        from_lib_error(&error)
    }
}
