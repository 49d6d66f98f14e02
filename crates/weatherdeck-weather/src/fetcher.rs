//! Stale-while-revalidate forecast fetching.
//!
//! Each [`ForecastFetcher::get_forecast`] call spawns one task that reads the
//! data cache and the network concurrently. A cached forecast is delivered
//! unless that call's network read has already delivered a live result, so it
//! can never overwrite one. When the network fails the cached forecast is
//! still shown. Results go out on an unbounded channel; the receiver decides
//! what to render.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use weatherdeck_core::{City, ProviderConfig};
use weatherdeck_proxy::{CacheStorage, Network, Request};

use crate::provider::decode_forecast;
use crate::types::{Forecast, ForecastSource, WeatherError};

/// Messages delivered to the dashboard
#[derive(Debug, Clone)]
pub enum ForecastEvent {
    Ready(Forecast),
}

/// How a single fetch ended
#[derive(Debug)]
pub struct FetchOutcome {
    /// A cached forecast was delivered before the network answered
    pub provisional_delivered: bool,
    pub network: Result<(), WeatherError>,
}

/// Per-city pending network reads.
///
/// Every call gets its own token, so overlapping fetches for one city never
/// clear each other's marker.
#[derive(Debug, Default)]
pub struct InFlight {
    pending: Mutex<HashMap<String, HashSet<u64>>>,
    next_token: AtomicU64,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending network read for `key`.
    pub fn begin(&self, key: &str) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(token);
        token
    }

    /// Clear one token. Returns false if it was already cleared.
    pub fn finish(&self, key: &str, token: u64) -> bool {
        let mut pending = self.pending.lock();
        let Some(tokens) = pending.get_mut(key) else {
            return false;
        };
        let removed = tokens.remove(&token);
        if tokens.is_empty() {
            pending.remove(key);
        }
        removed
    }

    pub fn is_pending(&self, key: &str, token: u64) -> bool {
        self.pending
            .lock()
            .get(key)
            .is_some_and(|tokens| tokens.contains(&token))
    }

    /// Any network read outstanding for `key`
    pub fn any_pending(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Handle to one running fetch
#[derive(Debug)]
pub struct ForecastTask {
    key: String,
    token: u64,
    in_flight: Arc<InFlight>,
    cancel: CancellationToken,
    handle: JoinHandle<FetchOutcome>,
}

impl ForecastTask {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Abort the remaining work. Nothing more is delivered for this call.
    pub fn cancel(&self) {
        self.in_flight.finish(&self.key, self.token);
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> FetchOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.in_flight.finish(&self.key, self.token);
                let error = if e.is_cancelled() {
                    WeatherError::Cancelled
                } else {
                    tracing::error!("Forecast task for {} failed: {}", self.key, e);
                    WeatherError::Task(e.to_string())
                };
                FetchOutcome {
                    provisional_delivered: false,
                    network: Err(error),
                }
            }
        }
    }
}

/// Data partition the fetcher reads provisional forecasts from
#[derive(Clone)]
struct DataCache {
    storage: Arc<dyn CacheStorage>,
    partition: String,
}

pub struct ForecastFetcher {
    provider: ProviderConfig,
    network: Arc<dyn Network>,
    cache: Option<DataCache>,
    in_flight: Arc<InFlight>,
    events: UnboundedSender<ForecastEvent>,
    root: CancellationToken,
}

impl ForecastFetcher {
    /// Create a fetcher without cache reads.
    ///
    /// Every task's cancellation token is a child of `root`.
    pub fn new(
        provider: ProviderConfig,
        network: Arc<dyn Network>,
        events: UnboundedSender<ForecastEvent>,
        root: CancellationToken,
    ) -> Self {
        Self {
            provider,
            network,
            cache: None,
            in_flight: Arc::new(InFlight::new()),
            events,
            root,
        }
    }

    /// Serve provisional forecasts from `partition` of `storage`.
    pub fn with_cache(mut self, storage: Arc<dyn CacheStorage>, partition: impl Into<String>) -> Self {
        self.cache = Some(DataCache {
            storage,
            partition: partition.into(),
        });
        self
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn forecast_url(&self, city: &City) -> String {
        self.provider.forecast_url(&city.key)
    }

    /// Start fetching the forecast for `city`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_forecast(&self, city: &City) -> ForecastTask {
        let token = self.in_flight.begin(&city.key);
        let cancel = self.root.child_token();
        let job = FetchJob {
            city: city.clone(),
            url: self.forecast_url(city),
            token,
            network: Arc::clone(&self.network),
            cache: self.cache.clone(),
            in_flight: Arc::clone(&self.in_flight),
            events: self.events.clone(),
        };

        tracing::debug!("Fetching forecast for {} from {}", city, job.url);
        let handle = tokio::spawn(job.run(cancel.clone()));

        ForecastTask {
            key: city.key.clone(),
            token,
            in_flight: Arc::clone(&self.in_flight),
            cancel,
            handle,
        }
    }
}

struct FetchJob {
    city: City,
    url: String,
    token: u64,
    network: Arc<dyn Network>,
    cache: Option<DataCache>,
    in_flight: Arc<InFlight>,
    events: UnboundedSender<ForecastEvent>,
}

impl FetchJob {
    async fn run(self, cancel: CancellationToken) -> FetchOutcome {
        let delivered = AtomicBool::new(false);

        let network = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Forecast fetch for {} cancelled", self.city);
                Err(WeatherError::Cancelled)
            }
            network = async { tokio::join!(self.read_cache(&delivered), self.read_network()).1 } => network,
        };

        // Clears the token after a failed or cancelled network read.
        self.in_flight.finish(&self.city.key, self.token);

        FetchOutcome {
            provisional_delivered: delivered.load(Ordering::Relaxed),
            network,
        }
    }

    async fn read_cache(&self, delivered: &AtomicBool) {
        let Some(cache) = &self.cache else {
            return;
        };

        let response = match cache.storage.match_in(&cache.partition, &self.url).await {
            Ok(Some(response)) => response,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!("Cache read for {} failed: {}", self.city, e);
                return;
            }
        };

        if !self.in_flight.is_pending(&self.city.key, self.token) {
            tracing::debug!("Discarding cached forecast for {}: network already answered", self.city);
            return;
        }

        match decode_forecast(&self.city, &response.body, ForecastSource::Cache) {
            Ok(forecast) => {
                if self.deliver(forecast) {
                    delivered.store(true, Ordering::Relaxed);
                }
            }
            Err(e) => tracing::debug!("Ignoring undecodable cached forecast for {}: {}", self.city, e),
        }
    }

    async fn read_network(&self) -> Result<(), WeatherError> {
        let result = self.fetch_forecast().await;

        match &result {
            Ok(forecast) => {
                tracing::debug!("Forecast for {} created {}", self.city, forecast.created);
                self.deliver(forecast.clone());
                self.in_flight.finish(&self.city.key, self.token);
            }
            // The token stays set so a slower cache read can still show the
            // last good forecast.
            Err(e) => tracing::warn!("Failed to fetch forecast for {}: {}", self.city, e),
        }

        result.map(|_| ())
    }

    async fn fetch_forecast(&self) -> Result<Forecast, WeatherError> {
        let response = self.network.fetch(&Request::get(self.url.clone())).await?;
        if !response.is_success() {
            return Err(WeatherError::Status(response.status));
        }
        decode_forecast(&self.city, &response.body, ForecastSource::Network)
    }

    fn deliver(&self, forecast: Forecast) -> bool {
        if self.events.send(ForecastEvent::Ready(forecast)).is_err() {
            tracing::debug!("Forecast receiver gone, dropping result for {}", self.city);
            return false;
        }
        true
    }
}
