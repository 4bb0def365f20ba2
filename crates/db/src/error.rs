//! Error taxonomy for store access.

use thiserror::Error;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    /// Lock wait, deadlock or serialization failure. The whole unit of work
    /// was rolled back by the server.
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("timed out waiting for a database connection")]
    Timeout,

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DbError {
    /// Whether repeating the whole operation from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Connect(_)
                | DbError::TransactionConflict(_)
                | DbError::Timeout
                | DbError::Unavailable(_)
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let message = db_err.message().to_string();
            if db_err.is_unique_violation() {
                return DbError::UniqueViolation(message);
            }
            if db_err.is_foreign_key_violation() {
                return DbError::ForeignKeyViolation(message);
            }
            if db_err.is_check_violation() {
                return DbError::CheckViolation(message);
            }
            let code = db_err.code().map(|code| code.into_owned());
            match code.as_deref() {
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE) => {
                    return DbError::TransactionConflict(message);
                }
                Some(QUERY_CANCELED) => return DbError::Timeout,
                _ => {}
            }
        }

        match err {
            sqlx::Error::PoolTimedOut => DbError::Timeout,
            sqlx::Error::PoolClosed => DbError::Unavailable("pool closed".to_string()),
            sqlx::Error::Io(io) => DbError::Unavailable(io.to_string()),
            other => DbError::Query(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_retryable() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::Timeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn closed_pool_is_unavailable() {
        let err = DbError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, DbError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_row_is_not_retryable() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Query(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn constraint_violations_are_not_retryable() {
        assert!(!DbError::UniqueViolation("users_email_key".into()).is_retryable());
        assert!(!DbError::CheckViolation("books_amount_check".into()).is_retryable());
    }
}
