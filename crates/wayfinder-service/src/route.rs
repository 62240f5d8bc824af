//! `/api/route/`: proxy a start/destination pair to the routing provider.

use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{info, warn};

use wayfinder_lib::{RouteRequest, RouteResult};
use wayfinder_service_shared::{
    ApiBody, ApiError, AppState, from_lib_error, record_route_failed, record_route_points,
    record_route_proxied,
};

/// Handle `/api/route/` for any method; only POST is served.
pub async fn route_proxy(
    State(state): State<AppState>,
    method: Method,
    ApiBody(body): ApiBody,
) -> Response {
    if method != Method::POST {
        return ApiError::method_not_allowed("POST required").into_response();
    }

    match proxy(&state, &body).await {
        Ok(result) => {
            let vehicle = &state.routing().config().vehicle;
            record_route_proxied(vehicle);
            record_route_points(result.len());
            info!(points = result.len(), vehicle = %vehicle, "route proxied");
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            let reason = e.reason();
            record_route_failed(reason);
            let error = from_lib_error(&e);
            if error.status().is_server_error() {
                warn!(reason, status = error.status().as_u16(), error = %e, "route request failed");
            } else {
                info!(reason, error = %e, "route request rejected");
            }
            error.into_response()
        }
    }
}

/// Body → validated pair → provider geometry → `[lat, lng]` result.
///
/// A body that is not JSON surfaces as `Error::Json` and therefore a 500.
async fn proxy(state: &AppState, body: &[u8]) -> wayfinder_lib::Result<RouteResult> {
    let payload: Value = serde_json::from_slice(body)?;
    let request = RouteRequest::from_json(&payload)?;
    let points = state.routing().fetch_path(&request).await?;
    Ok(RouteResult::from_provider(&points))
}
