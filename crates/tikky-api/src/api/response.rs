//! Response encoding helpers.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Encode `body` as newline-terminated JSON under `status`.
///
/// If encoding fails the status still stands: the failure is logged and the
/// response goes out with an empty body.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let content_type = [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))];
    match serde_json::to_vec(body) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            (status, content_type, bytes).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, %status, "failed to encode JSON response");
            (status, content_type, Body::empty()).into_response()
        }
    }
}
