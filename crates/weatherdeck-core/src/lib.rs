pub mod city;
pub mod config;
pub mod error;

pub use city::City;
pub use config::{
    CacheBackend, CacheConfig, Config, DashboardConfig, ProviderConfig, ShellConfig,
    StoreConfig, ValidationResult, CITY_ID_PLACEHOLDER,
};
pub use error::{
    AppError, ConfigError, DatabaseError, NetworkError, ReqwestErrorExt, RusqliteErrorExt,
};

use anyhow::Result;

/// Initialize logging for the process.
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call more than once; only
/// the first call installs the subscriber.
pub fn init() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    tracing::info!("Weatherdeck core initialized");
    Ok(())
}
