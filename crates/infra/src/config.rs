//! Configuration loading and representation.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 0;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

/// Connection settings of the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Applied with `SET LOCAL` at the start of every transaction.
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            statement_timeout_ms: None,
        }
    }

    /// Read `DATABASE_URL` and the optional `DATABASE_*` pool settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let mut config = Self::new(url);
        if let Some(v) = parse(&lookup, "DATABASE_MAX_CONNECTIONS")? {
            config.max_connections = v;
        }
        if let Some(v) = parse(&lookup, "DATABASE_MIN_CONNECTIONS")? {
            config.min_connections = v;
        }
        if let Some(v) = parse(&lookup, "DATABASE_ACQUIRE_TIMEOUT_MS")? {
            config.acquire_timeout_ms = v;
        }
        config.statement_timeout_ms = parse(&lookup, "DATABASE_STATEMENT_TIMEOUT_MS")?;

        if config.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }
        if config.min_connections > config.max_connections {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MIN_CONNECTIONS",
                value: config.min_connections.to_string(),
            });
        }
        Ok(config)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
