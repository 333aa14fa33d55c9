//! `PostgreSQL` connection provider.

use std::str::FromStr;

use async_trait::async_trait;
use orderservice_core::context::DataContext;
use orderservice_core::error::DomainError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::SqlResultExt;
use crate::unit_of_work::PgUnitOfWork;

const POOL: &str = "connection pool";

/// Hands out pooled `PostgreSQL` connections.
///
/// Each `open()` checks out one connection exclusively; dropping it returns
/// the connection to the pool.
#[derive(Debug, Clone)]
pub struct PgDataContext {
    pool: PgPool,
}

impl PgDataContext {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and verifies it can connect.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a malformed connection string,
    /// and `DomainError::Connectivity` or `DomainError::Timeout` if the
    /// database cannot be reached.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DomainError> {
        let mut options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| DomainError::validation(POOL, format!("invalid database url: {e}")))?;
        if let Some(timeout) = config.statement_timeout {
            options = options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .for_aggregate(POOL)?;

        info!(
            max_connections = config.max_connections,
            acquire_timeout_ms = u64::try_from(config.acquire_timeout.as_millis()).unwrap_or(u64::MAX),
            "connected to order database"
        );
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Starts a caller-owned unit of work on a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Connectivity` or `DomainError::Timeout` if no
    /// connection can be acquired or the transaction cannot start.
    pub async fn begin(&self) -> Result<PgUnitOfWork, DomainError> {
        let tx = self.pool.begin().await.for_aggregate(POOL)?;
        debug!("unit of work started");
        Ok(PgUnitOfWork::new(tx))
    }
}

#[async_trait]
impl DataContext for PgDataContext {
    type Connection = PoolConnection<Postgres>;

    async fn open(&self) -> Result<Self::Connection, DomainError> {
        self.pool.acquire().await.for_aggregate(POOL)
    }
}
