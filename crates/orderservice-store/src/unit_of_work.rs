//! Caller-owned unit of work.
//!
//! A `PgUnitOfWork` is an explicit transaction handed to the `*_in`
//! repository methods so several calls commit or roll back together.
//! Dropping it without `commit` rolls everything back.

use std::fmt;

use orderservice_core::error::DomainError;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::debug;

use crate::error::SqlResultExt;

const UNIT_OF_WORK: &str = "unit of work";

/// An open transaction shared by chained repository calls.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgUnitOfWork").finish_non_exhaustive()
    }
}

impl PgUnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    pub(crate) fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Commits every change made through this unit of work.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the commit fails; the transaction is then
    /// rolled back by the server.
    pub async fn commit(self) -> Result<(), DomainError> {
        self.tx.commit().await.for_aggregate(UNIT_OF_WORK)?;
        debug!("unit of work committed");
        Ok(())
    }

    /// Discards every change made through this unit of work.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the rollback cannot be sent.
    pub async fn rollback(self) -> Result<(), DomainError> {
        self.tx.rollback().await.for_aggregate(UNIT_OF_WORK)?;
        debug!("unit of work rolled back");
        Ok(())
    }
}
