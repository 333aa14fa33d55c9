//! Aggregate repository abstraction.

use async_trait::async_trait;

use crate::error::DomainError;

/// A persistable aggregate type, tagged with a stable model name.
pub trait Model: Send + Sync + 'static {
    /// Name reported when the model has no registered repository.
    const NAME: &'static str;
}

/// Filter applied to fully hydrated aggregates.
pub type Predicate<M> = dyn Fn(&M) -> bool + Send + Sync;

/// Result of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum UpdateOutcome {
    /// Every statement affected exactly the rows it targeted.
    Applied,
    /// A statement affected zero rows: the version token or identifier no
    /// longer matches what is stored.
    Conflict,
}

impl UpdateOutcome {
    /// Returns `true` if the write was applied.
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Create/read/update/delete over one aggregate type.
///
/// Each call acquires its own connection and releases it on every exit path.
#[async_trait]
pub trait Repository<M: Model>: Send + Sync {
    /// Persists a new aggregate, all or nothing. Identifier fields of `model`
    /// are assigned only on success.
    async fn create(&self, model: &mut M) -> Result<(), DomainError>;

    /// Loads every aggregate, optionally filtered by `predicate` after full
    /// hydration. Each call re-queries the store.
    async fn read(&self, predicate: Option<&Predicate<M>>) -> Result<Vec<M>, DomainError>;

    /// Loads a single aggregate by identifier.
    async fn find(&self, id: i32) -> Result<Option<M>, DomainError>;

    /// Reconciles the store with the edited in-memory aggregate. On
    /// [`UpdateOutcome::Applied`] the new version token and any newly assigned
    /// line identifiers are written back into `model`.
    async fn update(&self, model: &mut M) -> Result<UpdateOutcome, DomainError>;

    /// Removes an aggregate according to the configured delete policy.
    async fn delete(&self, model: &M) -> Result<UpdateOutcome, DomainError>;
}
