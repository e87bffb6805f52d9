//! Counter endpoints.
//!
//! - `POST /write` : atomic increment, returns the post-increment value
//! - `GET  /read`  : current value, `0` when the counter was never written

pub mod response;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::Response,
};

use tikky_core::protocol::body::ValueBody;

use crate::app_state::AppState;
use crate::error::{require_method, ApiError, READ_FAILED, UPDATE_FAILED};

use self::response::json_response;

/// Key the counter lives under in the store.
pub const COUNTER_KEY: &str = "counter";

pub async fn write_counter(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, ApiError> {
    require_method(&method, Method::POST)?;

    let value = state.store().incr(COUNTER_KEY).await.map_err(|e| {
        tracing::error!(error = %e, key = COUNTER_KEY, "failed to increment counter");
        ApiError::StoreFailed(UPDATE_FAILED)
    })?;

    Ok(json_response(StatusCode::OK, &ValueBody { value }))
}

pub async fn read_counter(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, ApiError> {
    require_method(&method, Method::GET)?;

    let read = state.store().get(COUNTER_KEY).await.map_err(|e| {
        tracing::error!(error = %e, key = COUNTER_KEY, "failed to read counter");
        ApiError::StoreFailed(READ_FAILED)
    })?;

    Ok(json_response(StatusCode::OK, &ValueBody { value: read.value_or_zero() }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
