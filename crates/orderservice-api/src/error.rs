//! Order Service — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orderservice_core::error::DomainError;
use orderservice_store::ConfigError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The database could not be reached or upgraded.
    #[error("database error: {0}")]
    Database(#[from] DomainError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error: a domain failure or a rejected concurrent write.
#[derive(Debug)]
pub enum ApiError {
    /// The repository failed.
    Domain(DomainError),
    /// The write targeted a version or line that is no longer stored.
    Conflict {
        /// The order whose write was rejected.
        order_id: i32,
    },
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::Conflict { order_id } => (
                StatusCode::CONFLICT,
                "concurrency_conflict",
                format!("order {order_id} was changed or removed by another writer"),
            ),
            Self::Domain(err) => {
                let (status, code) = match &err {
                    DomainError::AggregateNotFound(_) => {
                        (StatusCode::NOT_FOUND, "aggregate_not_found")
                    }
                    DomainError::Validation { .. } => {
                        (StatusCode::BAD_REQUEST, "validation_error")
                    }
                    DomainError::Connectivity { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "connectivity_error")
                    }
                    DomainError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    DomainError::Unsupported(_) => {
                        (StatusCode::METHOD_NOT_ALLOWED, "unsupported_operation")
                    }
                    DomainError::UnknownModel(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "unknown_model")
                    }
                };
                (status, code, err.to_string())
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}
