use thiserror::Error;

/// Failures raised by the phrase store.
///
/// Expected outcomes such as "duplicate" or "not found" are not errors; they
/// are returned as `None` by the store and as outcome enums by the service.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid allow-list column: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database path error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether the failure comes from the backing store being unavailable
    /// (busy, locked, I/O) rather than from corrupt data.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::OutOfMemory
            ),
            StoreError::Sqlite(_) => false,
            StoreError::Serde(_) => false,
            StoreError::Io(_) | StoreError::LockPoisoned | StoreError::Task(_) => true,
        }
    }

    /// Whether this is a UNIQUE / PRIMARY KEY violation. Foreign key and
    /// CHECK failures are constraint violations too, but not duplicates.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_violation_is_duplicate() {
        let err = StoreError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            None,
        ));
        assert!(err.is_unique_violation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_foreign_key_is_not_a_duplicate() {
        let err = StoreError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
            None,
        ));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_busy_is_retryable() {
        let err = StoreError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(err.is_retryable());
        assert!(!err.is_unique_violation());
        assert!(StoreError::LockPoisoned.is_retryable());
    }
}
