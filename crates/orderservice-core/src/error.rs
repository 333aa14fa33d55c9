//! Domain error types.
//!
//! Concurrency conflicts are not errors: they are reported through
//! [`UpdateOutcome::Conflict`](crate::repository::UpdateOutcome) so callers
//! can tell "retry" apart from a hard failure.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(i32),

    /// A storage constraint rejected a row, or the aggregate cannot be
    /// processed in its current state.
    #[error("validation error on {aggregate}: {message}")]
    Validation {
        /// Identity of the aggregate being written.
        aggregate: String,
        /// What was rejected.
        message: String,
    },

    /// A connection could not be opened or a statement could not execute.
    #[error("connectivity error on {aggregate}: {message}")]
    Connectivity {
        /// Identity of the aggregate being processed.
        aggregate: String,
        /// The underlying cause.
        message: String,
    },

    /// Connection acquisition or statement execution exceeded its timeout.
    #[error("timeout on {aggregate}: {message}")]
    Timeout {
        /// Identity of the aggregate being processed.
        aggregate: String,
        /// The underlying cause.
        message: String,
    },

    /// The operation is disabled by repository configuration.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// No repository is registered for the requested model.
    #[error("unknown model: {0}")]
    UnknownModel(&'static str),
}

impl DomainError {
    /// Shorthand for a validation error against `aggregate`.
    pub fn validation(aggregate: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Validation {
            aggregate: aggregate.to_string(),
            message: message.into(),
        }
    }

    /// Re-attributes the error to `aggregate`. Variants without an aggregate
    /// field are returned unchanged.
    #[must_use]
    pub fn with_aggregate(self, aggregate: impl std::fmt::Display) -> Self {
        match self {
            Self::Validation { message, .. } => Self::Validation {
                aggregate: aggregate.to_string(),
                message,
            },
            Self::Connectivity { message, .. } => Self::Connectivity {
                aggregate: aggregate.to_string(),
                message,
            },
            Self::Timeout { message, .. } => Self::Timeout {
                aggregate: aggregate.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Returns `true` for failures that are worth retrying unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Timeout { .. })
    }
}
