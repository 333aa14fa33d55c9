//! Concurrency-control and delete-policy configuration.
//!
//! Both are chosen when a repository is constructed; individual calls never
//! select a strategy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the header write of an update detects concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyControl {
    /// Header updated by identifier only. Last write wins.
    None,
    /// Header updated by identifier and version token. A stale token
    /// affects zero rows and the update reports a conflict.
    #[default]
    Optimistic,
    /// The whole reconciliation runs in one transaction holding row locks
    /// on the header and its lines until commit.
    Pessimistic,
}

impl ConcurrencyControl {
    /// Lowercase name as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for ConcurrencyControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "optimistic" => Ok(Self::Optimistic),
            "pessimistic" => Ok(Self::Pessimistic),
            other => Err(format!(
                "unknown concurrency control {other:?}; expected none, optimistic or pessimistic"
            )),
        }
    }
}

/// What `delete` does with an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Remove every owned line, then the header, in one transaction.
    #[default]
    Cascade,
    /// Refuse with `DomainError::Unsupported`.
    Reject,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown delete policy {other:?}; expected cascade or reject"
            )),
        }
    }
}

/// Repository-level behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryOptions {
    /// Strategy guarding the header write of `update` and `delete`.
    pub concurrency: ConcurrencyControl,
    /// Behaviour of `delete`.
    pub delete_policy: DeletePolicy,
}

impl RepositoryOptions {
    /// Options with the given strategy and the default delete policy.
    #[must_use]
    pub fn with_concurrency(concurrency: ConcurrencyControl) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }
}
