//! tikky core: wire contracts and the shared error type.
//!
//! This crate holds the RESP codec used to talk to the counter store and the
//! JSON bodies of the HTTP surface. It intentionally carries no transport or
//! runtime dependencies so it can be reused by the service, its tests, and
//! tooling alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `TikkyError`/`ParseError` so a malformed
//! store reply never takes the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, TikkyError};
