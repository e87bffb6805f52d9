use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use tikky_core::error::{Result, TikkyError};

pub const ENV_REDIS_ADDR: &str = "REDIS_ADDR";
pub const ENV_REDIS_PASSWORD: &str = "REDIS_PASSWORD";
pub const ENV_LISTEN: &str = "TIKKY_LISTEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub redis: RedisSection,

    #[serde(default)]
    pub log: LogSection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            redis: RedisSection::default(),
            log: LogSection::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TikkyError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.redis.validate()?;
        Ok(())
    }

    /// Apply deployment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(addr) = get(ENV_REDIS_ADDR) {
            self.redis.addr = addr;
        }
        if let Some(password) = get(ENV_REDIS_PASSWORD) {
            self.redis.password = Some(password);
        }
        if let Some(listen) = get(ENV_LISTEN) {
            self.server.listen = listen;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        check_timeout("server.shutdown_timeout_ms", self.shutdown_timeout_ms)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            TikkyError::BadConfig(format!(
                "server.listen must be a valid socket address, got {:?}",
                self.listen
            ))
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSection {
    #[serde(default = "default_redis_addr")]
    pub addr: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub db: u32,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_io_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_io_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for RedisSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSection")
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("startup_timeout_ms", &self.startup_timeout_ms)
            .finish()
    }
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            addr: default_redis_addr(),
            password: None,
            db: 0,
            pool_size: default_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_io_timeout_ms(),
            write_timeout_ms: default_io_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
        }
    }
}

impl RedisSection {
    pub fn validate(&self) -> Result<()> {
        let valid_addr = self
            .addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid_addr {
            return Err(TikkyError::BadConfig(format!(
                "redis.addr must be host:port, got {:?}",
                self.addr
            )));
        }
        if !(1..=1024).contains(&self.pool_size) {
            return Err(TikkyError::BadConfig(
                "redis.pool_size must be between 1 and 1024".into(),
            ));
        }
        check_timeout("redis.connect_timeout_ms", self.connect_timeout_ms)?;
        check_timeout("redis.read_timeout_ms", self.read_timeout_ms)?;
        check_timeout("redis.write_timeout_ms", self.write_timeout_ms)?;
        check_timeout("redis.startup_timeout_ms", self.startup_timeout_ms)?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default)]
    pub format: LogFormat,
}

fn check_timeout(field: &str, ms: u64) -> Result<()> {
    if !(100..=60_000).contains(&ms) {
        return Err(TikkyError::BadConfig(format!(
            "{field} must be between 100 and 60000"
        )));
    }
    Ok(())
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
fn default_redis_addr() -> String {
    "localhost:6379".into()
}
fn default_pool_size() -> usize {
    20
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_io_timeout_ms() -> u64 {
    3000
}
fn default_startup_timeout_ms() -> u64 {
    10_000
}
