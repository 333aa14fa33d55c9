//! Classification of `sqlx` failures into `DomainError`.

use orderservice_core::error::DomainError;

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

/// SQLSTATE class for integrity constraint violations (not-null, foreign
/// key, unique, check).
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Maps a `sqlx` error to the domain taxonomy, attributing it to `aggregate`.
pub(crate) fn classify(err: &sqlx::Error, aggregate: &str) -> DomainError {
    let aggregate = aggregate.to_owned();
    match err {
        sqlx::Error::PoolTimedOut => DomainError::Timeout {
            aggregate,
            message: err.to_string(),
        },
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(QUERY_CANCELED) => DomainError::Timeout {
                aggregate,
                message: db.message().to_owned(),
            },
            Some(code) if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) => {
                DomainError::Validation {
                    aggregate,
                    message: db.message().to_owned(),
                }
            }
            _ => DomainError::Connectivity {
                aggregate,
                message: err.to_string(),
            },
        },
        _ => DomainError::Connectivity {
            aggregate,
            message: err.to_string(),
        },
    }
}

/// Attaches aggregate identity to `sqlx` results.
pub(crate) trait SqlResultExt<T> {
    fn for_aggregate(self, aggregate: &str) -> Result<T, DomainError>;
}

impl<T> SqlResultExt<T> for Result<T, sqlx::Error> {
    fn for_aggregate(self, aggregate: &str) -> Result<T, DomainError> {
        self.map_err(|err| classify(&err, aggregate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_timeout() {
        let err = classify(&sqlx::Error::PoolTimedOut, "order 1 (\"Rick\")");

        match err {
            DomainError::Timeout { aggregate, .. } => assert_eq!(aggregate, "order 1 (\"Rick\")"),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_row_not_found_is_connectivity() {
        let err = classify(&sqlx::Error::RowNotFound, "order 2 (\"Morty\")");

        assert!(matches!(err, DomainError::Connectivity { .. }));
    }

    #[test]
    fn test_pool_closed_is_connectivity_and_transient() {
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::PoolClosed);

        let err = result.for_aggregate("orders").unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("orders"));
    }
}
