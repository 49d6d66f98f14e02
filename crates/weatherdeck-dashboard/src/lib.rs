//! Dashboard for Weatherdeck
//!
//! Owns the tracked city list and turns delivered forecasts into cards.

pub mod cards;
pub mod context;
pub mod controller;

pub use cards::{day_label, CardChange, CardRenderer, CardSet, ForecastCard, TerminalRenderer};
pub use context::AppContext;
pub use controller::Dashboard;
