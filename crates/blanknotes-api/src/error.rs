//! API error handling
//!
//! Every failure leaves the server as `{"code": <status>, "error": ...}`
//! where `error` is a message or, for validation failures, a list of
//! `{field, error}` objects.

use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blanknotes_core::{NotesError, UniqueField};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Error envelope returned to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code
    pub code: u16,
    pub error: ErrorDetail,
}

/// Human-readable message or per-field validation failures
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
}

/// A single failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("name already exists")]
    DuplicateName,

    #[error("email already exists")]
    DuplicateEmail,

    #[error("title already exists")]
    DuplicateTitle,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed")]
    ValidationFailed(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Token(TokenError::Encoding(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateName
            | AppError::DuplicateEmail
            | AppError::DuplicateTitle
            | AppError::ValidationFailed(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = match self {
            AppError::ValidationFailed(fields) => ErrorDetail::Fields(fields),
            AppError::Internal(ref msg) | AppError::Database(ref msg) => {
                error!(error = %msg, "Request failed");
                ErrorDetail::Message("internal server error".to_string())
            }
            AppError::Token(TokenError::Encoding(ref msg)) => {
                error!(error = %msg, "Token encoding failed");
                ErrorDetail::Message("internal server error".to_string())
            }
            other => ErrorDetail::Message(other.to_string()),
        };

        let body = ApiError {
            code: status.as_u16(),
            error: detail,
        };

        (status, Json(body)).into_response()
    }
}

impl From<NotesError> for AppError {
    fn from(err: NotesError) -> Self {
        match err {
            NotesError::NotFound(what) => AppError::NotFound(what),
            NotesError::UniqueViolation(violation) => match violation.field() {
                Some(UniqueField::Name) => AppError::DuplicateName,
                Some(UniqueField::Email) => AppError::DuplicateEmail,
                Some(UniqueField::Title) => AppError::DuplicateTitle,
                None => AppError::Database(violation.to_string()),
            },
            NotesError::ValidationError(msg) => AppError::BadRequest(msg),
            NotesError::DatabaseError(msg) => AppError::Database(msg),
            NotesError::ConfigError(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            NotesError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    error: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed on the '{}' rule", e.code)),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::ValidationFailed(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blanknotes_core::UniqueViolation;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Token(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("Note".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::DuplicateEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Database("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unique_violation_normalization() {
        let err: AppError =
            NotesError::UniqueViolation(UniqueViolation::postgres("users_email_key")).into();
        assert!(matches!(err, AppError::DuplicateEmail));

        let mysql = UniqueViolation {
            code: blanknotes_core::MYSQL_DUP_ENTRY.to_string(),
            constraint: None,
            message: "Duplicate entry 'alice' for key 'users.idx_users_name'".to_string(),
        };
        let err: AppError = NotesError::UniqueViolation(mysql).into();
        assert!(matches!(err, AppError::DuplicateName));
    }

    #[test]
    fn test_envelope_shapes() {
        let message = ApiError {
            code: 404,
            error: ErrorDetail::Message("Note not found".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"code": 404, "error": "Note not found"})
        );

        let fields = ApiError {
            code: 400,
            error: ErrorDetail::Fields(vec![FieldError {
                field: "email".to_string(),
                error: "invalid email".to_string(),
            }]),
        };
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            serde_json::json!({"code": 400, "error": [{"field": "email", "error": "invalid email"}]})
        );
    }
}
