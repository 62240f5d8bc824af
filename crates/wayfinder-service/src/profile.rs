//! Profile and authentication endpoints under `/api/profile/`.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, Method, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use wayfinder_lib::{Error as LibError, NewAccount, Profile, ProfileUpdate, Session, User};
use wayfinder_service_shared::{
    ApiBody, ApiError, AppState, CurrentIdentity, LoginRequest, SignupRequest,
    expired_session_cookie, from_lib_error, parse_body, record_auth_event, session_cookie,
    token_from_headers,
};

#[derive(Debug, Serialize)]
struct ProfileResponse {
    profile: Profile,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    ok: bool,
    user: User,
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    ok: bool,
}

/// `GET` reads the caller's profile; `POST`/`PUT` merge an update into it.
///
/// Updates from anonymous callers are answered but never stored.
pub async fn profile_view(
    State(state): State<AppState>,
    method: Method,
    CurrentIdentity(identity): CurrentIdentity,
    ApiBody(body): ApiBody,
) -> Response {
    match method {
        Method::GET => Json(ProfileResponse {
            profile: identity.profile(),
        })
        .into_response(),
        Method::POST | Method::PUT => {
            let update = match parse_update(&body) {
                Ok(update) => update,
                Err(e) => return e.into_response(),
            };

            let mut profile = identity.profile();
            update.apply(&mut profile);

            let profile = match identity.user() {
                Some(user) => match state.identities().save_profile(user, profile) {
                    Ok(saved) => {
                        info!(user_id = user.id, "profile updated");
                        saved
                    }
                    Err(e) => {
                        warn!(user_id = user.id, error = %e, "failed to save profile");
                        return from_lib_error(&e).into_response();
                    }
                },
                None => profile,
            };

            Json(ProfileResponse { profile }).into_response()
        }
        _ => ApiError::method_not_allowed("method not allowed").into_response(),
    }
}

fn parse_update(body: &[u8]) -> Result<ProfileUpdate, ApiError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::bad_request(e.to_string()))?;
    ProfileUpdate::from_json(&payload).map_err(|e| from_lib_error(&e))
}

/// `POST /api/profile/signup/`: create an account and open a session.
pub async fn signup(
    State(state): State<AppState>,
    method: Method,
    ApiBody(body): ApiBody,
) -> Response {
    if method != Method::POST {
        return ApiError::method_not_allowed("POST required").into_response();
    }

    let request = match parse_body::<SignupRequest>(&body) {
        Ok(request) => request,
        Err(problem) => {
            record_auth_event("signup", "rejected");
            return (*problem).into_response();
        }
    };

    let result = state.identities().signup(NewAccount::from(request));
    session_response("signup", StatusCode::CREATED, result)
}

/// `POST /api/profile/login/`: verify credentials and open a session.
pub async fn login(
    State(state): State<AppState>,
    method: Method,
    ApiBody(body): ApiBody,
) -> Response {
    if method != Method::POST {
        return ApiError::method_not_allowed("POST required").into_response();
    }

    let request = match parse_body::<LoginRequest>(&body) {
        Ok(request) => request,
        Err(problem) => {
            record_auth_event("login", "rejected");
            return (*problem).into_response();
        }
    };

    let result = state
        .identities()
        .login(request.username.trim(), &request.password);
    session_response("login", StatusCode::OK, result)
}

fn session_response(
    event: &'static str,
    status: StatusCode,
    result: wayfinder_lib::Result<Session>,
) -> Response {
    let session = match result {
        Ok(session) => session,
        Err(e) => {
            record_auth_event(event, "rejected");
            info!(event, reason = e.reason(), "authentication rejected");
            return from_lib_error(&e).into_response();
        }
    };

    let cookie = match session_cookie(&session.token) {
        Ok(cookie) => cookie,
        Err(e) => {
            let error = LibError::StoreUnavailable {
                message: format!("unusable session token: {}", e),
            };
            return from_lib_error(&error).into_response();
        }
    };

    record_auth_event(event, "success");
    info!(event, user_id = session.user.id, "session opened");
    (
        status,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            ok: true,
            user: session.user,
        }),
    )
        .into_response()
}

/// Any method on `/api/profile/logout/`. Always answers `{"ok": true}`.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        match state.identities().logout(&token) {
            Ok(ended) => info!(ended, "logout"),
            Err(e) => warn!(error = %e, "logout failed; clearing cookie anyway"),
        }
    }
    record_auth_event("logout", "success");

    (
        [(SET_COOKIE, expired_session_cookie())],
        Json(LogoutResponse { ok: true }),
    )
        .into_response()
}
