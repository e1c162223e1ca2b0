use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfig(String),

    #[error("Failed to open a database connection: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("A database statement failed: {0}")]
    Statement(#[source] sqlx::Error),

    #[error("The operation was cancelled before it could commit")]
    Cancelled,

    #[error("Rolling back the transaction failed: {0}")]
    Rollback(#[source] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Whether this error belongs to the cancellation class: the caller gave
    /// up (or a timeout did it for them) rather than the statement itself
    /// being at fault. Connect/command timeouts are treated identically to an
    /// explicit cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            DbError::Cancelled => true,
            DbError::Connection(source) | DbError::Statement(source) => {
                matches!(source, sqlx::Error::PoolTimedOut)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_class_covers_explicit_and_timeout_aborts() {
        assert!(DbError::Cancelled.is_cancellation());
        assert!(DbError::Connection(sqlx::Error::PoolTimedOut).is_cancellation());
        assert!(!DbError::Statement(sqlx::Error::RowNotFound).is_cancellation());
        assert!(!DbError::ConnectionConfig("DATABASE_URL must be set.".into()).is_cancellation());
    }
}
