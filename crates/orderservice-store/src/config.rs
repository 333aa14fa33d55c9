//! Store configuration read from the environment.

use std::time::Duration;

use orderservice_core::concurrency::{ConcurrencyControl, DeletePolicy, RepositoryOptions};
use thiserror::Error;

/// Connection string for the order database.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Pool size.
pub const ENV_MAX_CONNECTIONS: &str = "ORDERS_DB_MAX_CONNECTIONS";
/// How long `open()` waits for a pooled connection, in milliseconds.
pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "ORDERS_DB_ACQUIRE_TIMEOUT_MS";
/// Per-statement timeout in milliseconds; `0` disables it.
pub const ENV_STATEMENT_TIMEOUT_MS: &str = "ORDERS_DB_STATEMENT_TIMEOUT_MS";
/// `none`, `optimistic` or `pessimistic`.
pub const ENV_CONCURRENCY_CONTROL: &str = "ORDERS_CONCURRENCY_CONTROL";
/// `cascade` or `reject`.
pub const ENV_DELETE_POLICY: &str = "ORDERS_DELETE_POLICY";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// An environment variable holds an unusable value.
    #[error("{var} is invalid: {message}")]
    Invalid {
        /// The offending variable.
        var: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Everything needed to build a data context and its repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `postgres://` connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// Server-side statement timeout; `None` leaves the server default.
    pub statement_timeout: Option<Duration>,
    /// Concurrency strategy and delete policy for repositories.
    pub repository: RepositoryOptions,
}

impl StoreConfig {
    /// Configuration for `database_url` with every other setting defaulted.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
            statement_timeout: Some(Duration::from_millis(DEFAULT_STATEMENT_TIMEOUT_MS)),
            repository: RepositoryOptions::default(),
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or any variable
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or any variable
    /// cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;
        let mut config = Self::new(database_url);

        if let Some(max) = parse::<u32>(&lookup, ENV_MAX_CONNECTIONS)? {
            if max == 0 {
                return Err(ConfigError::Invalid {
                    var: ENV_MAX_CONNECTIONS,
                    message: "must be at least 1".into(),
                });
            }
            config.max_connections = max;
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_ACQUIRE_TIMEOUT_MS)? {
            config.acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_STATEMENT_TIMEOUT_MS)? {
            config.statement_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(concurrency) = parse::<ConcurrencyControl>(&lookup, ENV_CONCURRENCY_CONTROL)? {
            config.repository.concurrency = concurrency;
        }
        if let Some(policy) = parse::<DeletePolicy>(&lookup, ENV_DELETE_POLICY)? {
            config.repository.delete_policy = policy;
        }

        Ok(config)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                message: e.to_string(),
            })
        })
        .transpose()
}
