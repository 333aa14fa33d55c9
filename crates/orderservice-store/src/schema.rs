//! Schema version management.
//!
//! Migrations live in the workspace `migrations/` directory and are embedded
//! at compile time. `upgrade` must run once before the repository is used.

use orderservice_core::error::DomainError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use crate::error::SqlResultExt;

const SCHEMA: &str = "schema";

/// Embedded migrations for the order tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applied and available schema versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Versions recorded as successfully applied, ascending.
    pub applied: Vec<i64>,
    /// Highest version embedded in this build.
    pub latest: Option<i64>,
}

impl SchemaStatus {
    /// Returns `true` when every embedded migration has been applied.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.applied.last().copied() == self.latest
    }
}

/// Applies every pending migration.
///
/// # Errors
///
/// Returns `DomainError::Connectivity` if a migration fails or the database
/// cannot be reached.
pub async fn upgrade(pool: &PgPool) -> Result<(), DomainError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DomainError::Connectivity {
            aggregate: SCHEMA.to_owned(),
            message: format!("migration failed: {e}"),
        })?;
    info!(latest = ?latest_version(), "order schema is up to date");
    Ok(())
}

/// Reports which migrations have been applied.
///
/// A database that has never been upgraded reports no applied versions.
///
/// # Errors
///
/// Returns `DomainError::Connectivity` if the database cannot be queried.
pub async fn status(pool: &PgPool) -> Result<SchemaStatus, DomainError> {
    let (has_table,): (bool,) = sqlx::query_as(
        r"
        SELECT EXISTS (
            SELECT 1
            FROM information_schema.tables
            WHERE table_name = '_sqlx_migrations'
        )
        ",
    )
    .fetch_one(pool)
    .await
    .for_aggregate(SCHEMA)?;

    let applied = if has_table {
        sqlx::query_scalar::<_, i64>(
            "SELECT version FROM _sqlx_migrations WHERE success ORDER BY version",
        )
        .fetch_all(pool)
        .await
        .for_aggregate(SCHEMA)?
    } else {
        Vec::new()
    };

    Ok(SchemaStatus {
        applied,
        latest: latest_version(),
    })
}

fn latest_version() -> Option<i64> {
    MIGRATOR.iter().map(|m| m.version).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_present() {
        assert!(latest_version().is_some());
    }

    #[test]
    fn test_status_is_current_only_when_latest_applied() {
        let latest = latest_version();
        let pending = SchemaStatus {
            applied: Vec::new(),
            latest,
        };
        let current = SchemaStatus {
            applied: latest.into_iter().collect(),
            latest,
        };

        assert!(!pending.is_current());
        assert!(current.is_current());
    }
}
