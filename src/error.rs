use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::security::AuthError;
use crate::sql::{MappingError, QueryError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Connection pool unavailable: {cause}")]
    PoolUnavailable { cause: String },

    #[error("Storage error: {cause}")]
    Storage { cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::PoolUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::Validation { message } => ("validation_error", message.clone()),
            ApiError::NotFound { message } => ("not_found", message.clone()),
            ApiError::Conflict { message } => ("conflict", message.clone()),
            ApiError::Unauthorized { message } => ("unauthorized", message.clone()),
            ApiError::Forbidden { message } => ("forbidden", message.clone()),
            ApiError::PoolUnavailable { cause } => {
                error!("Connection pool unavailable: {}", cause);
                (
                    "service_unavailable",
                    "Database temporarily unavailable".to_string(),
                )
            }
            ApiError::Storage { cause } => {
                error!("Storage failure: {}", cause);
                ("storage_error", "Database error".to_string())
            }
            ApiError::Internal(cause) => {
                error!("Internal failure: {}", cause);
                ("internal_error", "Internal server error".to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                ApiError::Conflict {
                    message: "Operation violates a uniqueness or reference constraint".to_string(),
                }
            }
            _ => ApiError::Storage {
                cause: err.to_string(),
            },
        }
    }
}

impl From<deadpool_sqlite::PoolError> for ApiError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        ApiError::PoolUnavailable {
            cause: err.to_string(),
        }
    }
}

impl From<deadpool_sqlite::InteractError> for ApiError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        ApiError::Internal(format!("Connection task failed: {}", err))
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Validation {
            message: err.to_string(),
        }
    }
}

impl From<MappingError> for ApiError {
    fn from(err: MappingError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden => ApiError::Forbidden {
                message: "Admin access required".to_string(),
            },
            AuthError::Hashing(cause) | AuthError::Signing(cause) => ApiError::Internal(cause),
            AuthError::InvalidCredentials => ApiError::Unauthorized {
                message: "Invalid username or password".to_string(),
            },
            // Callers are not told which check failed
            _ => ApiError::Unauthorized {
                message: "Authentication required".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
