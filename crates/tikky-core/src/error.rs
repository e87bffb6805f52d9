//! Shared error type across tikky crates.

use thiserror::Error;

/// Stable error codes, used in logs and by startup diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid configuration value or document.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Store could not be reached.
    StoreUnavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadConfig => "BAD_CONFIG",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::StoreUnavailable => "STORE_UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TikkyError>;

/// Unified error type for process-level failures (config, startup).
///
/// Request-level failures have their own type in `tikky-api`, because they
/// carry an HTTP status and a client-facing message.
#[derive(Debug, Error)]
pub enum TikkyError {
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl TikkyError {
    /// Map the error to a stable code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            TikkyError::BadConfig(_) => ClientCode::BadConfig,
            TikkyError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            TikkyError::StoreUnavailable(_) => ClientCode::StoreUnavailable,
            TikkyError::Internal(_) => ClientCode::Internal,
        }
    }
}
