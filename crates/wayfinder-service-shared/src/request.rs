//! Request bodies and validation for the API endpoints.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wayfinder_lib::{Error as LibError, NewAccount};

use crate::api_error::{from_lib_error, ApiError};

/// Raw request body for API handlers.
///
/// Wraps axum's `Bytes` extractor so that a body which cannot be buffered
/// (over the size limit, aborted upload) is answered with a JSON
/// [`ApiError`] carrying the rejection's status instead of plain text.
#[derive(Debug, Clone, Default)]
pub struct ApiBody(pub Bytes);

impl<S> FromRequest<S> for ApiBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match Bytes::from_request(req, state).await {
            Ok(bytes) => Ok(Self(bytes)),
            Err(rejection) => {
                tracing::info!(status = rejection.status().as_u16(), "request body rejected");
                Err(ApiError::new(rejection.status(), rejection.body_text()))
            }
        }
    }
}

/// Validation trait for request types.
///
/// Returns a boxed `ApiError` to avoid large `Result::Err` variants.
pub trait Validate {
    fn validate(&self) -> Result<(), Box<ApiError>>;
}

/// Decode a JSON body and validate it. Decode failures are 400s.
pub fn parse_body<T>(body: &[u8]) -> Result<T, Box<ApiError>>
where
    T: DeserializeOwned + Validate,
{
    let request: T = serde_json::from_slice(body)
        .map_err(|e| Box::new(ApiError::bad_request(e.to_string())))?;
    request.validate()?;
    Ok(request)
}

fn missing_credentials() -> Box<ApiError> {
    Box::new(from_lib_error(&LibError::MissingCredentials))
}

/// `POST /api/profile/signup/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), Box<ApiError>> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(missing_credentials());
        }
        Ok(())
    }
}

impl From<SignupRequest> for NewAccount {
    fn from(request: SignupRequest) -> Self {
        NewAccount {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        }
    }
}

/// `POST /api/profile/login/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Box<ApiError>> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(missing_credentials());
        }
        Ok(())
    }
}
