use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLSTATE raised by PostgreSQL when a serializable transaction cannot commit.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE raised when PostgreSQL breaks a lock cycle by aborting one participant.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE raised when a statement gives up waiting for a lock under `lock_timeout`.
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transient store error: {0}")]
    TransientStore(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// The transfer failed and aborting it failed as well. Both errors are kept.
    #[error("{source}; rollback failed: {rollback}")]
    RollbackFailure {
        source: Box<AppError>,
        rollback: Box<AppError>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds on account {account_id}: balance would be {balance}")]
    InsufficientFunds { account_id: i64, balance: i64 },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the same call may succeed if the caller simply tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientStore(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// The error that triggered the failure, looking through rollback wrapping.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::RollbackFailure { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let (conflict, classified) = match &err {
            sqlx::Error::Database(db_err) => {
                let conflict = matches!(
                    db_err.code().as_deref(),
                    Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE)
                );
                let classified = match db_err.kind() {
                    // A write referencing a missing row, e.g. an entry for an unknown account.
                    ErrorKind::ForeignKeyViolation => Some(AppError::NotFound(format!(
                        "referenced row does not exist: {}",
                        db_err.message()
                    ))),
                    ErrorKind::UniqueViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => {
                        Some(AppError::ConstraintViolation(db_err.message().to_string()))
                    }
                    _ => None,
                };
                (conflict, classified)
            }
            _ => (false, None),
        };

        if conflict {
            return AppError::TransientStore(err);
        }
        if let Some(classified) = classified {
            return classified;
        }

        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => AppError::TransientStore(err),
            other => AppError::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
