//! Request-level errors and their HTTP mapping.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use tikky_core::protocol::body::ErrorBody;

use crate::api::response::json_response;

pub const UPDATE_FAILED: &str = "Failed to update counter";
pub const READ_FAILED: &str = "Failed to read counter";

/// Everything a handler can answer with instead of success.
///
/// The `Display` text is exactly what the client sees in `{"error": ...}`;
/// store details are logged at the failure site and never end up here.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Only {expected} method is allowed")]
    MethodNotAllowed { expected: Method },

    #[error("{0}")]
    StoreFailed(&'static str),

    #[error("Redis unavailable")]
    StoreUnavailable,

    #[error("Not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::StoreFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_response(self.status(), &ErrorBody::new(self.to_string()))
    }
}

/// Reject the request unless it uses `expected`. Runs before any store call.
pub fn require_method(method: &Method, expected: Method) -> Result<(), ApiError> {
    if *method == expected {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed { expected })
    }
}
