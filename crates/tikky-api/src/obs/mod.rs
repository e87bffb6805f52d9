//! Observability: log subscriber setup and the Prometheus text writer used
//! by `/metrics`.

pub mod logging;
pub mod metrics;
