use crate::db::errors::DbError;
use crate::identity::IdentityError;
use crate::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A backend credential or setting required by this request is not configured
    #[error("{missing} is not configured")]
    Configuration { missing: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Uploaded payload exceeds the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Object storage call failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Identity service call failed
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Storage(_) | Error::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, user-facing summary placed in the `error` field of the response body
    pub fn user_message(&self) -> String {
        match self {
            Error::Configuration { .. } => "Environment variables not configured".to_string(),
            Error::BadRequest { message } | Error::PayloadTooLarge { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Storage(_) => "Storage operation failed".to_string(),
            Error::Identity(_) => "Identity operation failed".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, constraint, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("profiles"), Some(c)) if c.contains("email") => "A profile with this email address already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Diagnostic detail placed in the `details` field. Client errors carry none.
    fn details(&self) -> Option<String> {
        match self {
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => None,
            Error::Configuration { .. } => Some(self.to_string()),
            Error::Storage(e) => Some(e.to_string()),
            Error::Identity(e) => Some(e.to_string()),
            Error::Database(e) => Some(e.backend_message()),
            Error::Other(e) => Some(format!("{e:#}")),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Database(DbError::Other(_)) | Error::Other(_) | Error::Configuration { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Storage(_) | Error::Identity(_) => {
                tracing::error!("Backend call failed: {}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = match self.details() {
            Some(details) => json!({ "error": self.user_message(), "details": details }),
            None => json!({ "error": self.user_message() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_is_server_error_with_details() {
        let err = Error::Configuration {
            missing: "supabase.service_role_key".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Environment variables not configured");
        assert_eq!(err.details().as_deref(), Some("supabase.service_role_key is not configured"));
    }

    #[test]
    fn test_client_errors_have_no_details() {
        let err = Error::BadRequest {
            message: "User ID is required".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.details().is_none());
    }

    #[test]
    fn test_database_status_mapping() {
        assert_eq!(Error::Database(DbError::NotFound).status_code(), StatusCode::NOT_FOUND);
        let fk = Error::Database(DbError::ForeignKeyViolation {
            constraint: None,
            table: Some("students".to_string()),
            message: "still referenced".to_string(),
        });
        assert_eq!(fk.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(fk.details().as_deref(), Some("still referenced"));
    }
}
