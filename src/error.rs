use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    /// A multi-row write was rolled back. The cause stays reachable via `source()`.
    #[error("{op} failed")]
    Transaction {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    /// Marks a raw database failure as part of the named unit of work.
    pub fn in_transaction(self, op: &'static str) -> Self {
        match self {
            AppError::Database(source) => AppError::Transaction { op, source },
            other => other,
        }
    }

    /// Turns a unique-constraint violation into a field-level validation error.
    pub fn unique_violation_on(e: sqlx::Error, field: &str, message: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::validation(field, message)
            }
            _ => AppError::Database(e),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Transaction { .. } | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Transaction { op, source } => {
                error!(error = %source, op, "transaction rolled back");
                self.to_string()
            }
            AppError::Database(e) => {
                error!(error = %e, "database error");
                "database error".to_string()
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}
