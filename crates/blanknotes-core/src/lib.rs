//! blanknotes core - domain models, storage traits, and shared types
//!
//! This crate defines the pieces shared by every layer of the service:
//! - User, note, and refresh token models
//! - Repository traits consumed by the services
//! - PostgreSQL and in-memory implementations of those traits
//! - Pagination normalization
//! - Configuration management
//! - Common error types, including backend-neutral unique-violation mapping

pub mod config;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod postgres;
pub mod repository;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use memory::MemoryStore;
pub use models::{
    NewNote, NewUser, Note, NoteAuthor, NoteChanges, NoteFilter, RefreshToken, User, UserChanges,
    UserFilter, Visibility,
};
pub use pagination::{Metadata, Page, PageRequest};
pub use postgres::PgStore;
pub use repository::{NoteRepository, RefreshTokenStore, UserRepository};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error type returned by repositories and storage backends
#[derive(Error, Debug)]
pub enum NotesError {
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint rejected a write.
    ///
    /// Carries the raw backend code so callers can normalize it with
    /// [`UniqueViolation::field`].
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(UniqueViolation),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NotesError>;

impl From<sqlx::Error> for NotesError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => NotesError::NotFound("Record".to_string()),
            sqlx::Error::Database(db_err) => {
                let violation = UniqueViolation {
                    code: db_err.code().map(|c| c.into_owned()).unwrap_or_default(),
                    constraint: db_err.constraint().map(str::to_string),
                    message: db_err.message().to_string(),
                };
                if violation.is_unique() {
                    NotesError::UniqueViolation(violation)
                } else {
                    NotesError::DatabaseError(err.to_string())
                }
            }
            _ => NotesError::DatabaseError(err.to_string()),
        }
    }
}

// ============================================================================
// Unique constraint normalization
// ============================================================================

/// PostgreSQL `unique_violation` SQLSTATE
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// MySQL `ER_DUP_ENTRY` error number
pub const MYSQL_DUP_ENTRY: &str = "1062";

/// SQLSTATE MySQL reports alongside `ER_DUP_ENTRY`
pub const MYSQL_INTEGRITY_VIOLATION: &str = "23000";

/// Raw unique-violation details as reported by the database driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueViolation {
    /// Backend error code (SQLSTATE or vendor error number)
    pub code: String,
    /// Constraint or index name, when the backend reports one
    pub constraint: Option<String>,
    /// Backend error message
    pub message: String,
}

/// The unique column a violation was raised for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Name,
    Email,
    Title,
}

impl UniqueViolation {
    /// Build a violation the way PostgreSQL reports it
    pub fn postgres(constraint: &str) -> Self {
        Self {
            code: PG_UNIQUE_VIOLATION.to_string(),
            constraint: Some(constraint.to_string()),
            message: format!(
                "duplicate key value violates unique constraint \"{constraint}\""
            ),
        }
    }

    /// Whether the code denotes a uniqueness failure on either backend.
    ///
    /// `23000` is MySQL's generic integrity SQLSTATE and also covers NOT NULL
    /// and foreign key failures, so it only counts with a duplicate-entry
    /// message.
    pub fn is_unique(&self) -> bool {
        match self.code.as_str() {
            PG_UNIQUE_VIOLATION | MYSQL_DUP_ENTRY => true,
            MYSQL_INTEGRITY_VIOLATION => self.message.starts_with("Duplicate entry"),
            _ => false,
        }
    }

    /// Index name from a MySQL `Duplicate entry 'x' for key 'users.name'`
    /// message. The key is read from the end since the entry value may
    /// itself contain quotes.
    fn mysql_key(&self) -> Option<&str> {
        let (_, rest) = self.message.rsplit_once(" for key '")?;
        rest.strip_suffix('\'').or_else(|| rest.split('\'').next())
    }

    /// Which unique column was violated.
    ///
    /// PostgreSQL names the constraint (`users_email_key`); MySQL only puts
    /// the index name into the message, so the key is parsed out of it. The
    /// duplicated value is never inspected.
    pub fn field(&self) -> Option<UniqueField> {
        if !self.is_unique() {
            return None;
        }

        let key = self
            .constraint
            .as_deref()
            .or_else(|| self.mysql_key())?
            .to_lowercase();
        let key = key.rsplit('.').next().unwrap_or_default();

        if key.contains("email") {
            Some(UniqueField::Email)
        } else if key.contains("title") {
            Some(UniqueField::Title)
        } else if key.contains("name") {
            Some(UniqueField::Name)
        } else {
            None
        }
    }
}

impl std::fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_violation_fields() {
        assert_eq!(
            UniqueViolation::postgres("users_email_key").field(),
            Some(UniqueField::Email)
        );
        assert_eq!(
            UniqueViolation::postgres("users_name_key").field(),
            Some(UniqueField::Name)
        );
        assert_eq!(
            UniqueViolation::postgres("notes_user_id_title_key").field(),
            Some(UniqueField::Title)
        );
    }

    #[test]
    fn test_mysql_violation_fields() {
        let by_number = UniqueViolation {
            code: MYSQL_DUP_ENTRY.to_string(),
            constraint: None,
            message: "Duplicate entry 'alice' for key 'users.idx_users_name'".to_string(),
        };
        assert_eq!(by_number.field(), Some(UniqueField::Name));

        let by_sqlstate = UniqueViolation {
            code: MYSQL_INTEGRITY_VIOLATION.to_string(),
            constraint: None,
            message: "Duplicate entry 'a@b.c' for key 'users.idx_users_email'".to_string(),
        };
        assert_eq!(by_sqlstate.field(), Some(UniqueField::Email));
    }

    #[test]
    fn test_mysql_entry_value_is_not_the_key() {
        let v = UniqueViolation {
            code: MYSQL_DUP_ENTRY.to_string(),
            constraint: None,
            message: "Duplicate entry 'emailfan' for key 'users.idx_users_name'".to_string(),
        };
        assert_eq!(v.field(), Some(UniqueField::Name));

        let v = UniqueViolation {
            code: MYSQL_DUP_ENTRY.to_string(),
            constraint: None,
            message: "Duplicate entry '7-my email draft' for key 'notes.idx_notes_title'"
                .to_string(),
        };
        assert_eq!(v.field(), Some(UniqueField::Title));

        let quoted = UniqueViolation {
            code: MYSQL_DUP_ENTRY.to_string(),
            constraint: None,
            message: "Duplicate entry 'o'title' for key 'users.users_name_key'".to_string(),
        };
        assert_eq!(quoted.field(), Some(UniqueField::Name));
    }

    #[test]
    fn test_mysql_generic_integrity_code() {
        let not_null = UniqueViolation {
            code: MYSQL_INTEGRITY_VIOLATION.to_string(),
            constraint: None,
            message: "Column 'name' cannot be null".to_string(),
        };
        assert!(!not_null.is_unique());
        assert_eq!(not_null.field(), None);

        let fk = UniqueViolation {
            code: MYSQL_INTEGRITY_VIOLATION.to_string(),
            constraint: None,
            message: "Cannot add or update a child row: a foreign key constraint fails"
                .to_string(),
        };
        assert!(!fk.is_unique());
    }

    #[test]
    fn test_non_unique_code_is_ignored() {
        let fk = UniqueViolation {
            code: "23503".to_string(),
            constraint: Some("notes_user_id_fkey".to_string()),
            message: "insert or update violates foreign key constraint".to_string(),
        };
        assert!(!fk.is_unique());
        assert_eq!(fk.field(), None);
    }

    #[test]
    fn test_unknown_constraint() {
        let v = UniqueViolation::postgres("something_else_key");
        assert!(v.is_unique());
        assert_eq!(v.field(), None);
    }
}
