//! Operational HTTP endpoints.
//!
//! - `/health`  : store liveness (503 when the probe fails)
//! - `/metrics` : Prometheus text format, never fails

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};

use tikky_core::protocol::body::HealthBody;

use crate::api::{response::json_response, COUNTER_KEY};
use crate::app_state::AppState;
use crate::error::{require_method, ApiError};
use crate::obs::metrics::{Snapshot, CONTENT_TYPE as EXPOSITION_CONTENT_TYPE, COUNTER_UNAVAILABLE};
use crate::store::CounterRead;
use crate::{SERVICE_NAME, VERSION};

pub async fn health(State(state): State<AppState>, method: Method) -> Result<Response, ApiError> {
    require_method(&method, Method::GET)?;

    state.store().ping().await.map_err(|e| {
        tracing::error!(error = %e, "health check failed: redis unreachable");
        ApiError::StoreUnavailable
    })?;

    Ok(json_response(StatusCode::OK, &HealthBody::healthy(SERVICE_NAME, VERSION)))
}

/// Best effort: a failed read exports `-1`, a failed probe exports `0`.
pub async fn metrics(State(state): State<AppState>, method: Method) -> Result<Response, ApiError> {
    require_method(&method, Method::GET)?;

    let store = state.store();
    let (read, probe) = tokio::join!(store.get(COUNTER_KEY), store.ping());

    let counter_total = match read {
        Ok(CounterRead::Found(v)) => v,
        Ok(CounterRead::Absent) => 0,
        Err(e) => {
            tracing::error!(error = %e, key = COUNTER_KEY, "failed to read counter for metrics");
            COUNTER_UNAVAILABLE
        }
    };
    let store_connected = match probe {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "redis probe failed during metrics scrape");
            false
        }
    };

    let body = Snapshot {
        counter_total,
        store_connected,
        version: VERSION,
        service: SERVICE_NAME,
    }
    .render();

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response())
}
