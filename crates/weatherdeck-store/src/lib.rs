//! Persistent list of tracked cities.
//!
//! Survives restarts in a SQLite file; falls back to an in-memory database
//! when the file cannot be opened.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{CityCursor, CityStore, SCHEMA_VERSION};
pub use weatherdeck_core::City;
