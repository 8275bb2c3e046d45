use std::path::PathBuf;

/// Why a single row could not become a stored transaction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RowError {
    #[error("{0} must be set")]
    MissingField(String),

    #[error("invalid date {value:?}: {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("invalid amount in {column}: {value:?}")]
    InvalidAmount { column: String, value: String },

    #[error("malformed row: {0}")]
    Malformed(String),
}

impl RowError {
    pub fn date(value: &str, reason: impl ToString) -> Self {
        return RowError::InvalidDate {
            value: value.to_owned(),
            reason: reason.to_string(),
        };
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be used at all; the current file has to stop.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused this one row.
    #[error("store rejected row: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => StoreError::Rejected(db.to_string()),
            sqlx::Error::RowNotFound
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::Encode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Rejected(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// A failure that stops a whole file.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),

    #[error("no parser matches {0}")]
    UnmatchedFile(PathBuf),

    #[error("error reading file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error reading csv: {0}")]
    Csv(#[from] csv_async::Error),

    #[error(transparent)]
    StoreUnavailable(StoreError),

    #[error("queue is shut down, dropped {0}")]
    QueueClosed(PathBuf),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_unavailable_is_fatal() {
        assert!(StoreError::Unavailable("gone".into()).is_fatal());
        assert!(!StoreError::Rejected("duplicate key".into()).is_fatal());
    }

    #[test]
    fn pool_errors_are_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_fatal());

        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(!err.is_fatal());
    }
}
