//! Startup configuration resolved once from the environment
//!
//! Every variable is read through a lookup function so tests can inject
//! values without touching the process environment.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::database::{ReplicaConfig, StoreConfig};
use crate::datasource::FixerConfig;
use crate::jobs::rate_sync_job::DEFAULT_STEP_TIMEOUT;
use crate::models::CurrencyCode;

pub const LOCAL_DB_PATH: &str = "RATES_LOCAL_DB_PATH";
pub const TURSO_URL: &str = "TURSO_URL";
pub const TURSO_AUTH_TOKEN: &str = "TURSO_AUTH_TOKEN";
pub const TURSO_DB_NAME: &str = "TURSO_DB_NAME";
pub const TURSO_SYNC_INTERVAL_SECS: &str = "TURSO_SYNC_INTERVAL_SECS";
pub const DATABASE_ENSURE_SCHEMA: &str = "DATABASE_ENSURE_SCHEMA";
pub const FIXERIO_KEY: &str = "FIXERIO_KEY";
pub const FIXERIO_BASE_URL: &str = "FIXERIO_BASE_URL";
pub const RATES_BASE_CURRENCY: &str = "RATES_BASE_CURRENCY";
pub const RATES_SYMBOLS: &str = "RATES_SYMBOLS";
pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const SYNC_STEP_TIMEOUT_SECS: &str = "SYNC_STEP_TIMEOUT_SECS";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything the binary needs to run one cycle
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub fixer: FixerConfig,
    /// Codes to fetch; empty means all
    pub symbols: Vec<CurrencyCode>,
    pub step_timeout: Duration,
}

impl AppConfig {
    /// Resolve from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let store = match env.optional(LOCAL_DB_PATH) {
            Some(path) => StoreConfig::Local { path },
            None => {
                let mut replica =
                    ReplicaConfig::new(env.required(TURSO_URL)?, env.required(TURSO_AUTH_TOKEN)?);
                if let Some(db_name) = env.optional(TURSO_DB_NAME) {
                    replica.db_name = db_name;
                }
                replica.sync_interval_secs =
                    env.parsed(TURSO_SYNC_INTERVAL_SECS, replica.sync_interval_secs)?;
                replica.ensure_schema = env.parsed(DATABASE_ENSURE_SCHEMA, replica.ensure_schema)?;
                StoreConfig::Replica(replica)
            }
        };

        let mut fixer = FixerConfig::new(env.required(FIXERIO_KEY)?);
        if let Some(base_url) = env.optional(FIXERIO_BASE_URL) {
            fixer.base_url = base_url;
        }
        fixer.base_currency = env.parsed(RATES_BASE_CURRENCY, fixer.base_currency)?;
        fixer.timeout_secs = env.parsed(HTTP_TIMEOUT_SECS, fixer.timeout_secs)?;

        let symbols = match env.optional(RATES_SYMBOLS) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(|code| {
                    CurrencyCode::new(code).map_err(|e| ConfigError::Invalid {
                        var: RATES_SYMBOLS,
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let step_timeout = Duration::from_secs(
            env.parsed(SYNC_STEP_TIMEOUT_SECS, DEFAULT_STEP_TIMEOUT.as_secs())?,
        );
        if step_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: SYNC_STEP_TIMEOUT_SECS,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            store,
            fixer,
            symbols,
            step_timeout,
        })
    }
}

/// Required/optional/default resolution over a lookup function
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value if set and not blank
    fn optional(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.optional(var).ok_or(ConfigError::Missing(var))
    }

    /// Parsed value, or `default` when unset. The raw value is not echoed
    /// back since some variables hold secrets.
    fn parsed<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(var) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}
