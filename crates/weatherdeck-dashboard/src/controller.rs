//! Dashboard controller: tracked cities, their fetches and their cards.

use weatherdeck_core::City;
use weatherdeck_weather::{FetchOutcome, Forecast, ForecastEvent, ForecastTask};

use crate::cards::{CardChange, CardRenderer, CardSet};
use crate::context::AppContext;

pub struct Dashboard<R: CardRenderer> {
    context: AppContext,
    renderer: R,
    cities: Vec<City>,
    cards: CardSet,
    tasks: Vec<ForecastTask>,
}

impl<R: CardRenderer> Dashboard<R> {
    pub fn new(context: AppContext, renderer: R) -> Self {
        Self {
            context,
            renderer,
            cities: Vec::new(),
            cards: CardSet::new(),
            tasks: Vec::new(),
        }
    }

    /// Load the tracked cities and start fetching their forecasts.
    ///
    /// An unreadable store counts as empty.
    pub async fn startup(&mut self) {
        let cities = match self.context.store().all().await {
            Ok(cities) => cities,
            Err(e) => {
                tracing::warn!("Failed to load cities: {}", e);
                Vec::new()
            }
        };
        self.on_cities_loaded(cities).await;
    }

    async fn on_cities_loaded(&mut self, cities: Vec<City>) {
        if cities.is_empty() {
            let city = self.context.config().dashboard.default_city.clone();
            tracing::info!("No saved cities, showing {}", city);
            self.persist(&city).await;
            self.track(city);
            return;
        }

        tracing::info!("Loaded {} cities", cities.len());
        for city in cities {
            self.track(city);
        }
    }

    /// Start tracking `city`. Returns false if its key is already tracked.
    pub async fn add_city(&mut self, city: City) -> bool {
        if self.is_tracked(&city.key) {
            tracing::info!("{} is already tracked", city);
            return false;
        }
        let persisted = city.clone();
        self.track(city);
        self.persist(&persisted).await;
        true
    }

    /// Refetch every tracked city.
    pub fn refresh(&mut self) {
        tracing::info!("Refreshing {} forecasts", self.cities.len());
        for city in &self.cities {
            self.tasks.push(self.context.fetcher().get_forecast(city));
        }
    }

    /// Stop tracking `key`: cancel its fetches, drop its card and forget it.
    pub async fn remove_city(&mut self, key: &str) -> bool {
        let tracked = self.is_tracked(key);
        self.cities.retain(|c| c.key != key);

        self.tasks.retain(|task| {
            if task.key() == key {
                task.cancel();
                false
            } else {
                true
            }
        });

        if self.cards.remove(key) {
            self.renderer.remove(key);
        }

        let stored = match self.context.store().remove(key).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Failed to remove {} from store: {}", key, e);
                false
            }
        };

        if tracked || stored {
            tracing::info!("Removed city {}", key);
        }
        tracked || stored
    }

    /// Apply one delivered forecast to the cards.
    pub fn on_forecast_ready(&mut self, forecast: Forecast) -> CardChange {
        if !self.is_tracked(&forecast.key) {
            tracing::debug!("Ignoring forecast for untracked city {}", forecast.key);
            return CardChange::Ignored;
        }

        let key = forecast.key.clone();
        let change = self.cards.apply(forecast);
        match change {
            CardChange::Ignored => {
                tracing::debug!("Ignoring stale forecast for {}", key);
            }
            CardChange::Created | CardChange::Updated => {
                if let Some(card) = self.cards.get(&key) {
                    self.renderer.render(change, card);
                }
            }
        }
        change
    }

    /// Apply every forecast already delivered, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(ForecastEvent::Ready(forecast)) = self.context.events.try_recv() {
            self.on_forecast_ready(forecast);
            applied += 1;
        }
        applied
    }

    /// Wait for every outstanding fetch and apply what it delivered.
    pub async fn settle(&mut self) -> Vec<(String, FetchOutcome)> {
        let mut outcomes = Vec::new();
        for task in std::mem::take(&mut self.tasks) {
            let key = task.key().to_string();
            outcomes.push((key, task.join().await));
            self.pump();
        }
        outcomes
    }

    /// Cancel all outstanding work.
    pub fn shutdown(&mut self) {
        self.context.shutdown();
        self.tasks.clear();
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn cards(&self) -> &CardSet {
        &self.cards
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    fn is_tracked(&self, key: &str) -> bool {
        self.cities.iter().any(|c| c.key == key)
    }

    fn track(&mut self, city: City) {
        let task = self.context.fetcher().get_forecast(&city);
        self.tasks.push(task);
        self.cities.push(city);
    }

    async fn persist(&self, city: &City) {
        if let Err(e) = self.context.store().add(city).await {
            tracing::warn!("Failed to save {}: {}", city, e);
        }
    }
}
