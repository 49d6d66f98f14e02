//! Proxy-specific error types.

use thiserror::Error;
use weatherdeck_core::{AppError, ConfigError, NetworkError, ReqwestErrorExt};

use crate::proxy::ProxyState;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Cache storage could not be opened at all.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache operation failed: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Install failed fetching {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: ProxyState,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ProxyError {
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self::Network(NetworkError::ConnectionFailed(message.into()))
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.into_network_error())
    }
}

impl From<tokio_rusqlite::Error> for ProxyError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Cache(format!("Corrupt cache entry: {}", err))
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::CacheUnavailable(msg) | ProxyError::Cache(msg) => {
                AppError::CacheUnavailable(msg)
            }
            ProxyError::Network(e) => AppError::NetworkFailure(e),
            ProxyError::InvalidUrl(e) => AppError::Config(ConfigError::Invalid(e.to_string())),
            other => AppError::Other(anyhow::anyhow!(other.to_string())),
        }
    }
}
