//! Counter store abstraction.
//!
//! Handlers only see `CounterStore`; the process wires in `RedisStore`, tests
//! wire in doubles. All mutation happens in the store, so implementations must
//! make `incr` atomic across concurrent callers.

pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use tikky_core::protocol::resp::ParseError;

pub use redis::RedisStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a successful read. A missing key is a value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterRead {
    Found(i64),
    Absent,
}

impl CounterRead {
    /// Value to report for this read; a counter never incremented reads as zero.
    pub fn value_or_zero(self) -> i64 {
        match self {
            CounterRead::Found(v) => v,
            CounterRead::Absent => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{op} timed out")]
    Timeout { op: &'static str },
    #[error("malformed reply: {0}")]
    Protocol(#[from] ParseError),
    #[error("server error: {0}")]
    Server(String),
    #[error("unexpected {kind} reply to {cmd}")]
    UnexpectedReply { cmd: &'static str, kind: &'static str },
    #[error("stored value is not an integer: {0:?}")]
    InvalidValue(String),
    #[error("connection closed by server")]
    ConnectionClosed,
    #[error("store client closed")]
    Closed,
}

/// Capabilities the request handlers need from the external store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to `key` and return the post-increment value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    async fn get(&self, key: &str) -> StoreResult<CounterRead>;

    /// Liveness probe.
    async fn ping(&self) -> StoreResult<()>;

    /// Release connections. Called once at shutdown.
    async fn close(&self);
}
