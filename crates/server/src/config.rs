use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fieldsift_core::{FetchConfig, FieldsiftError, Result};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 30;
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Server settings, read from `FIELDSIFT_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    /// Searched for site profiles before `~/.config/fieldsift/sites`.
    pub config_dir: Option<PathBuf>,
    /// Limits for every upstream fetch. Site profiles do not override these.
    pub fetch: FetchConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = parse_or(&lookup, "FIELDSIFT_ADDR", || DEFAULT_ADDR.parse().ok())?;
        let ttl_secs = parse_or(&lookup, "FIELDSIFT_CACHE_TTL_SECS", || Some(DEFAULT_CACHE_TTL_SECS))?;
        let cache_capacity = parse_or(&lookup, "FIELDSIFT_CACHE_CAPACITY", || Some(DEFAULT_CACHE_CAPACITY))?;

        let defaults = FetchConfig::default();
        let timeout_ms = parse_or(&lookup, "FIELDSIFT_TIMEOUT_MS", || Some(defaults.timeout_ms))?;
        let max_bytes = parse_or(&lookup, "FIELDSIFT_MAX_BYTES", || Some(defaults.max_bytes))?;

        Ok(Self {
            addr,
            cache_ttl: Duration::from_secs(ttl_secs),
            cache_capacity,
            config_dir: lookup("FIELDSIFT_CONFIG_DIR").filter(|v| !v.is_empty()).map(PathBuf::from),
            fetch: FetchConfig { timeout_ms, max_bytes, ..defaults },
        })
    }
}

fn parse_or<T, F, D>(lookup: &F, key: &str, default: D) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
    D: FnOnce() -> Option<T>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| FieldsiftError::ConfigError(format!("{}={}: {}", key, raw, e))),
        None => default().ok_or_else(|| FieldsiftError::ConfigError(format!("no default for {}", key))),
    }
}
