//! Forecasts for Weatherdeck
//!
//! Decodes the provider payload into a [`Forecast`] and fetches forecasts
//! stale-while-revalidate: a cached copy from the data partition is shown
//! while the live request is pending.

pub mod fetcher;
pub mod provider;
pub mod types;

pub use fetcher::{FetchOutcome, ForecastEvent, ForecastFetcher, ForecastTask, InFlight};
pub use provider::decode_forecast;
pub use types::*;
