//! Application context: every long-lived component, wired once at startup.
//!
//! Storage failures degrade instead of aborting: an unavailable city store
//! is replaced by an in-memory one for the session, an unavailable cache
//! means no proxy and no provisional forecasts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use weatherdeck_core::{AppError, CacheBackend, Config};
use weatherdeck_proxy::{
    CacheProxy, CacheStorage, HttpNetwork, MemoryCacheStorage, Network, ProxyConfig, ProxyState,
    SqliteCacheStorage,
};
use weatherdeck_store::CityStore;
use weatherdeck_weather::{ForecastEvent, ForecastFetcher};

pub struct AppContext {
    config: Arc<Config>,
    store: Arc<CityStore>,
    durable_store: bool,
    cache: Option<Arc<dyn CacheStorage>>,
    proxy: Option<Arc<CacheProxy>>,
    fetcher: ForecastFetcher,
    pub(crate) events: UnboundedReceiver<ForecastEvent>,
    root: CancellationToken,
}

impl AppContext {
    /// Open storage, build the network stack and register the cache proxy.
    ///
    /// # Errors
    /// Only when the HTTP client cannot be built or the in-memory fallback
    /// store cannot be created. Every other failure is logged and degraded.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        tracing::info!("Building application context in {}", config.data_dir.display());

        if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
            tracing::warn!("Failed to create data directory {}: {}", config.data_dir.display(), e);
        }

        let (store, durable_store) = match CityStore::open(config.store_path()).await {
            Ok(store) => (store, true),
            Err(e) => {
                let err = AppError::from(e);
                tracing::warn!("{} ({})", err.user_message(), err);
                (CityStore::in_memory().await?, false)
            }
        };

        let cache: Option<Arc<dyn CacheStorage>> = match config.cache.backend {
            CacheBackend::Memory => Some(Arc::new(MemoryCacheStorage::new())),
            CacheBackend::Sqlite => match SqliteCacheStorage::open(config.cache_path()).await {
                Ok(storage) => Some(Arc::new(storage)),
                Err(e) => {
                    let err = AppError::from(e);
                    tracing::warn!("{} ({})", err.user_message(), err);
                    None
                }
            },
        };

        let network = HttpNetwork::new(
            Duration::from_secs(config.provider.timeout_secs),
            &config.provider.user_agent,
        )?;

        Self::assemble(config, store, durable_store, Arc::new(network), cache).await
    }

    /// Wire already-opened components together.
    ///
    /// With a cache, forecast traffic goes through a [`CacheProxy`] over
    /// `network`; without one the fetcher talks to `network` directly.
    pub async fn assemble(
        config: Config,
        store: CityStore,
        durable_store: bool,
        network: Arc<dyn Network>,
        cache: Option<Arc<dyn CacheStorage>>,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let root = CancellationToken::new();
        let (tx, events) = mpsc::unbounded_channel();

        let (proxy, fetcher) = match &cache {
            Some(storage) => {
                let proxy = Arc::new(CacheProxy::new(
                    ProxyConfig::from_config(&config)?,
                    Arc::clone(storage),
                    network,
                ));
                if let Err(e) = proxy.register().await {
                    tracing::warn!("Cache proxy not active, requests go straight to the network: {}", e);
                }
                let fetcher = ForecastFetcher::new(
                    config.provider.clone(),
                    Arc::clone(&proxy) as Arc<dyn Network>,
                    tx,
                    root.clone(),
                )
                .with_cache(Arc::clone(storage), config.cache.data_cache_name.clone());
                (Some(proxy), fetcher)
            }
            None => {
                let fetcher =
                    ForecastFetcher::new(config.provider.clone(), network, tx, root.clone());
                (None, fetcher)
            }
        };

        tracing::info!(
            "Application context ready (store: {}, cache: {})",
            if durable_store { "durable" } else { "session only" },
            match proxy.as_ref().map(|p| p.state()) {
                Some(ProxyState::Activated) => "active",
                Some(_) => "inactive",
                None => "unavailable",
            }
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            durable_store,
            cache,
            proxy,
            fetcher,
            events,
            root,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CityStore {
        &self.store
    }

    /// False when running on the in-memory fallback store
    pub fn is_store_durable(&self) -> bool {
        self.durable_store
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheStorage>> {
        self.cache.as_ref()
    }

    pub fn proxy(&self) -> Option<&CacheProxy> {
        self.proxy.as_deref()
    }

    pub fn fetcher(&self) -> &ForecastFetcher {
        &self.fetcher
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancel every outstanding forecast task.
    pub fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }
        tracing::info!("Shutting down application context");
        self.root.cancel();
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
