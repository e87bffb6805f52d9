//! Protocol modules (store wire + HTTP bodies).
//!
//! - `resp`: the RESP codec spoken to the counter store.
//! - `body`: JSON bodies returned by the HTTP surface.
//!
//! The RESP parser is panic-free: a malformed reply is reported as
//! `ParseError` instead of panicking or indexing past the buffer.

pub mod body;
pub mod resp;
