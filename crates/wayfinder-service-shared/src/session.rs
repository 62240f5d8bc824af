//! Session transport and caller resolution.
//!
//! Tokens travel in the `session` cookie or an `Authorization: Bearer`
//! header; the cookie wins when both are present. [`CurrentIdentity`]
//! resolves the caller once per request through the identity store.

use axum::extract::FromRequestParts;
use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use wayfinder_lib::{Identity, SessionToken};

use crate::api_error::{from_lib_error, ApiError};
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

const COOKIE_ATTRIBUTES: &str = "HttpOnly; Path=/; SameSite=Lax";

/// Session token presented with the request, if any.
pub fn token_from_headers(headers: &HeaderMap) -> Option<SessionToken> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

fn cookie_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| SessionToken::new(value))
}

fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(SessionToken::new)
}

/// `Set-Cookie` value opening a session.
pub fn session_cookie(token: &SessionToken) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; {}",
        SESSION_COOKIE, token, COOKIE_ATTRIBUTES
    ))
}

/// `Set-Cookie` value clearing the session cookie.
pub fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}

/// The caller, resolved from the presented session token.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = token_from_headers(&parts.headers);
        let identity = state
            .identities()
            .resolve(token.as_ref())
            .map_err(|e| from_lib_error(&e))?;

        tracing::debug!(authenticated = identity.is_authenticated(), "resolved caller");
        Ok(Self(identity))
    }
}
