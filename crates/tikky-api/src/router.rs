//! Axum router wiring.
//!
//! Every route accepts any method; the handlers themselves answer a wrong
//! verb with the JSON 405 body before touching the store.

use axum::{routing::any, Router};

use crate::{api, app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/write", any(api::write_counter))
        .route("/read", any(api::read_counter))
        .route("/health", any(ops::health))
        .route("/metrics", any(ops::metrics))
        .fallback(api::not_found)
        .with_state(state)
}
