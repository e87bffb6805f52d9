//! JSON response bodies (stable API).

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// `{"value": <int64>}` returned by `/write` and `/read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBody {
    pub value: i64,
}

/// `{"error": "<message>"}` shared by every JSON error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody<'a> {
    pub error: Cow<'a, str>,
}

impl<'a> ErrorBody<'a> {
    pub fn new(error: impl Into<Cow<'a, str>>) -> Self {
        Self { error: error.into() }
    }
}

/// `/health` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody<'a> {
    pub status: Cow<'a, str>,
    pub service: Cow<'a, str>,
    pub redis: Cow<'a, str>,
    pub version: Cow<'a, str>,
}

impl<'a> HealthBody<'a> {
    /// Body reported while the store answers its liveness probe.
    pub fn healthy(service: &'a str, version: &'a str) -> Self {
        Self {
            status: Cow::Borrowed("healthy"),
            service: Cow::Borrowed(service),
            redis: Cow::Borrowed("connected"),
            version: Cow::Borrowed(version),
        }
    }
}
