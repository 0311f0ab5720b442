//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Database query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),
}

impl DatabaseError {
    /// Map an insert failure onto `Duplicate` when it violated a unique index.
    pub fn from_insert(error: sqlx::Error, entity: &str) -> Self {
        if is_unique_violation(&error) {
            DatabaseError::Duplicate(entity.to_string())
        } else {
            DatabaseError::Query(error)
        }
    }
}

/// Whether a sqlx error is a UNIQUE / PRIMARY KEY constraint violation.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
