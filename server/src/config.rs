//! Environment-driven relay configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) and then builds one [`Config`] from the
//! process environment. Numeric settings fall back to their defaults when a
//! variable is missing or unparseable; URLs are optional and select which
//! store and ticket validator the relay runs with.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TICKET_TTL_MS: u64 = 10_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Log the outcome of loading `.env`. A missing file is normal outside
/// development and is not reported. Returns whether a warning was logged.
pub fn report_dotenv(result: &Result<PathBuf, dotenvy::Error>) -> bool {
    match result {
        Ok(path) => {
            debug!(path = %path.display(), "config: loaded .env");
            false
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            warn!(error = %e, "config: failed to load .env");
            true
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must not be blank")]
    Blank { key: &'static str },
    #[error("HEARTBEAT_INTERVAL_MS must be positive")]
    ZeroHeartbeat,
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Blank { .. } => "E_CONFIG_BLANK",
            Self::ZeroHeartbeat => "E_CONFIG_HEARTBEAT",
        }
    }
}

/// Runtime settings for one relay process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// `None` selects the in-memory element store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Base URL of the auth API that validates websocket tickets.
    pub ticket_validation_url: Option<String>,
    /// Enables the in-process ticket store and its issuing endpoint.
    pub dev_tickets: bool,
    pub ticket_ttl: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            ticket_validation_url: None,
            dev_tickets: false,
            ticket_ttl: Duration::from_millis(DEFAULT_TICKET_TTL_MS),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
        }
    }
}

impl Config {
    /// Read every setting from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL variable is set but blank, or if the
    /// heartbeat interval is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let heartbeat_ms = env_parse("HEARTBEAT_INTERVAL_MS", DEFAULT_HEARTBEAT_INTERVAL_MS);
        if heartbeat_ms == 0 {
            return Err(ConfigError::ZeroHeartbeat);
        }

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: env_url("DATABASE_URL")?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            ticket_validation_url: env_url("TICKET_VALIDATION_URL")?
                .map(|url| url.trim_end_matches('/').to_owned()),
            dev_tickets: env_parse("DEV_TICKETS", false),
            ticket_ttl: Duration::from_millis(env_parse("TICKET_TTL_MS", DEFAULT_TICKET_TTL_MS)),
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
        })
    }

    /// Whether any ticket source is configured. Without one every upgrade is refused.
    #[must_use]
    pub fn accepts_tickets(&self) -> bool {
        self.dev_tickets || self.ticket_validation_url.is_some()
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_url(key: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(v) if v.trim().is_empty() => Err(ConfigError::Blank { key }),
        Ok(v) => Ok(Some(v.trim().to_owned())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
