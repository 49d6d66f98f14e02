use thiserror::Error;
use weatherdeck_core::{AppError, DatabaseError, RusqliteErrorExt};

/// Errors from the city store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or its schema could not be created.
    #[error("City store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid city: {0}")]
    InvalidCity(String),

    /// A single read or write failed on an open store.
    #[error("Storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn invalid_city(message: impl Into<String>) -> Self {
        Self::InvalidCity(message.into())
    }

    /// Whether the caller should fall back to a session-only city list.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Wrap a rusqlite error for return from a `Connection::call` closure.
pub(crate) fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn map_tokio_rusqlite_error(err: tokio_rusqlite::Error) -> DatabaseError {
    match err {
        tokio_rusqlite::Error::Rusqlite(e) => e.into_database_error(),
        tokio_rusqlite::Error::ConnectionClosed => {
            DatabaseError::ConnectionFailed("connection closed".to_string())
        }
        other => DatabaseError::QueryFailed(other.to_string()),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::StorageUnavailable(msg),
            StoreError::InvalidCity(msg) => AppError::Other(anyhow::anyhow!("Invalid city: {}", msg)),
            StoreError::Storage(e) => AppError::Storage(map_tokio_rusqlite_error(e)),
        }
    }
}
