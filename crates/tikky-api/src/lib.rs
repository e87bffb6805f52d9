//! tikky API library entry.
//!
//! Wires config, the counter store, and the HTTP handlers into a router. It
//! is consumed by the binary (`main.rs`) and by integration tests.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod obs;
pub mod ops;
pub mod router;
pub mod store;

/// Service name reported by `/health` and `/metrics`.
pub const SERVICE_NAME: &str = "tikky-api";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
