//! Service config loader (strict parsing + env overrides).

pub mod schema;

use std::{env, fs, path::Path};

use tikky_core::error::{Result, TikkyError};

pub use schema::{LogFormat, LogSection, RedisSection, ServerSection, ServiceConfig};

pub const CONFIG_PATH_ENV: &str = "TIKKY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tikky.yaml";

/// Load the process config.
///
/// The file named by `TIKKY_CONFIG` must exist. Without it, `tikky.yaml` is
/// read when present and built-in defaults are used otherwise. Environment
/// overrides are applied before validation either way.
pub fn load() -> Result<ServiceConfig> {
    match env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(&path),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH),
        Err(_) => finish(ServiceConfig::default(), process_env),
    }
}

/// Read `path`, apply process environment overrides, validate.
pub fn load_from_file(path: &str) -> Result<ServiceConfig> {
    load_from_file_with_env(path, process_env)
}

pub fn load_from_file_with_env(
    path: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServiceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| TikkyError::Internal(format!("read config {path} failed: {e}")))?;
    finish(parse_str(&s)?, lookup)
}

/// Parse and validate a document as written, without environment overrides.
pub fn load_from_str(s: &str) -> Result<ServiceConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

fn finish(mut cfg: ServiceConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<ServiceConfig> {
    cfg.apply_env(lookup);
    cfg.validate()?;
    Ok(cfg)
}

fn parse_str(s: &str) -> Result<ServiceConfig> {
    serde_yaml::from_str(s).map_err(|e| TikkyError::BadConfig(format!("invalid yaml: {e}")))
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}
