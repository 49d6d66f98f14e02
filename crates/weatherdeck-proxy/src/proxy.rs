//! The cache proxy and its lifecycle.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//!               |
//!               +-> Redundant (any shell asset failed)
//! ```
//!
//! Only an activated proxy intercepts traffic; before that every request
//! goes straight to the network.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinSet;
use url::Url;

use crate::error::{ProxyError, ProxyResult};
use crate::http::{Request, Response};
use crate::network::Network;
use crate::storage::CacheStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// What the proxy caches and where.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Base URL shell asset paths are resolved against
    pub shell_origin: Url,
    /// Versioned shell partition name
    pub shell_cache: String,
    /// Shell asset paths, relative to `shell_origin`
    pub shell_assets: Vec<String>,
    /// Requests starting with this prefix are forecast data
    pub data_origin: String,
    /// Stable data partition name
    pub data_cache: String,
}

impl ProxyConfig {
    pub fn from_config(config: &weatherdeck_core::Config) -> ProxyResult<Self> {
        Ok(Self {
            shell_origin: Url::parse(&config.shell.origin)?,
            shell_cache: config.shell.cache_name(),
            shell_assets: config.shell.assets.clone(),
            data_origin: config.provider.data_origin.clone(),
            data_cache: config.cache.data_cache_name.clone(),
        })
    }

    /// Absolute URLs of every shell asset.
    pub fn asset_urls(&self) -> ProxyResult<Vec<String>> {
        self.shell_assets
            .iter()
            .map(|asset| Ok(self.shell_origin.join(asset)?.to_string()))
            .collect()
    }

    pub fn is_data_request(&self, url: &str) -> bool {
        url.starts_with(&self.data_origin)
    }
}

pub struct CacheProxy {
    config: ProxyConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<ProxyState>,
}

impl CacheProxy {
    pub fn new(
        config: ProxyConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            state: RwLock::new(ProxyState::Parsed),
        }
    }

    pub fn state(&self) -> ProxyState {
        *self.state.read()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn CacheStorage> {
        Arc::clone(&self.storage)
    }

    fn transition(
        &self,
        action: &'static str,
        allowed: &[ProxyState],
        next: ProxyState,
    ) -> ProxyResult<()> {
        let mut state = self.state.write();
        if !allowed.contains(&*state) {
            return Err(ProxyError::InvalidState {
                action,
                state: *state,
            });
        }
        *state = next;
        Ok(())
    }

    fn set_state(&self, next: ProxyState) {
        *self.state.write() = next;
    }

    /// Install the current shell version.
    ///
    /// Every asset is fetched concurrently; the partition is only written once
    /// all of them succeeded. A single failure leaves the storage untouched
    /// and marks this proxy `Redundant`.
    ///
    /// # Errors
    /// `ProxyError::InstallFailed` naming the first asset that failed.
    pub async fn install(&self) -> ProxyResult<()> {
        self.transition(
            "install",
            &[ProxyState::Parsed, ProxyState::Redundant],
            ProxyState::Installing,
        )?;
        tracing::info!("[CacheProxy] Install {}", self.config.shell_cache);

        match self.fetch_shell().await {
            Ok(entries) => {
                let count = entries.len();
                if let Err(e) = self.storage.put_all(&self.config.shell_cache, entries).await {
                    tracing::error!("[CacheProxy] Failed to commit app shell: {}", e);
                    self.set_state(ProxyState::Redundant);
                    return Err(e);
                }
                tracing::info!("[CacheProxy] Cached app shell ({} assets)", count);
                self.set_state(ProxyState::Installed);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[CacheProxy] Install failed: {}", e);
                self.set_state(ProxyState::Redundant);
                Err(e)
            }
        }
    }

    async fn fetch_shell(&self) -> ProxyResult<Vec<(String, Response)>> {
        let urls = self.config.asset_urls()?;
        let mut tasks = JoinSet::new();
        for url in urls {
            let network = Arc::clone(&self.network);
            tasks.spawn(async move {
                let result = network.fetch(&Request::get(url.clone())).await;
                (url, result)
            });
        }

        let mut entries = Vec::with_capacity(tasks.len());
        // Returning early drops the set, aborting fetches still in flight.
        while let Some(joined) = tasks.join_next().await {
            let (url, result) = joined.map_err(|e| ProxyError::InstallFailed {
                url: "<task>".to_string(),
                reason: e.to_string(),
            })?;
            match result {
                Ok(response) if response.is_success() => entries.push((url, response)),
                Ok(response) => {
                    return Err(ProxyError::InstallFailed {
                        url,
                        reason: format!("HTTP {}", response.status),
                    })
                }
                Err(e) => {
                    return Err(ProxyError::InstallFailed {
                        url,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(entries)
    }

    /// Promote an installed proxy and garbage-collect superseded partitions.
    ///
    /// Every partition other than the current shell and the data partition is
    /// deleted. Returns the names that were removed.
    pub async fn activate(&self) -> ProxyResult<Vec<String>> {
        self.transition("activate", &[ProxyState::Installed], ProxyState::Activating)?;
        tracing::info!("[CacheProxy] Activate");

        match self.remove_stale_partitions().await {
            Ok(removed) => {
                self.set_state(ProxyState::Activated);
                Ok(removed)
            }
            Err(e) => {
                self.set_state(ProxyState::Installed);
                Err(e)
            }
        }
    }

    async fn remove_stale_partitions(&self) -> ProxyResult<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.config.shell_cache && name != self.config.data_cache {
                tracing::info!("[CacheProxy] Removing old cache {}", name);
                self.storage.delete(&name).await?;
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// Install (unless this shell version is already cached) and activate.
    pub async fn register(&self) -> ProxyResult<ProxyState> {
        if self.state() == ProxyState::Activated {
            return Ok(ProxyState::Activated);
        }

        if self.storage.has(&self.config.shell_cache).await? {
            tracing::info!(
                "[CacheProxy] {} already installed",
                self.config.shell_cache
            );
            self.transition("install", &[ProxyState::Parsed], ProxyState::Installed)?;
        } else {
            self.install().await?;
        }

        self.activate().await?;
        Ok(self.state())
    }

    /// Serve one intercepted request.
    ///
    /// # Errors
    /// Network failures are returned as-is; the proxy never substitutes
    /// cached forecast data.
    pub async fn handle(&self, request: &Request) -> ProxyResult<Response> {
        if self.state() != ProxyState::Activated {
            return self.network.fetch(request).await;
        }

        tracing::debug!("[CacheProxy] Fetch {}", request.url);

        if self.config.is_data_request(&request.url) {
            self.fetch_and_cache(request).await
        } else {
            self.cache_first(request).await
        }
    }

    async fn fetch_and_cache(&self, request: &Request) -> ProxyResult<Response> {
        let response = self.network.fetch(request).await?;

        if response.is_success() {
            match self
                .storage
                .put(&self.config.data_cache, &request.url, &response)
                .await
            {
                Ok(()) => tracing::debug!("[CacheProxy] Fetched and cached data"),
                Err(e) => tracing::warn!("[CacheProxy] Failed to cache data response: {}", e),
            }
        }

        Ok(response)
    }

    async fn cache_first(&self, request: &Request) -> ProxyResult<Response> {
        match self.storage.match_any(&request.url).await {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => {}
            Err(e) => tracing::warn!("[CacheProxy] Cache lookup failed: {}", e),
        }
        self.network.fetch(request).await
    }
}

#[async_trait]
impl Network for CacheProxy {
    async fn fetch(&self, request: &Request) -> ProxyResult<Response> {
        self.handle(request).await
    }
}
