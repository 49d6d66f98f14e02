//! SQLite-based storage for tracked cities.
//!
//! One table, `cities(id, key, label)`, with a unique index on `key` and a
//! plain index on `label`. The schema is created once, on the first open of a
//! fresh database, and recorded in `PRAGMA user_version`.
//!
//! Queries run on the connection's background thread, so awaiting one never
//! blocks the event loop.

use std::collections::VecDeque;
use std::path::Path;

use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::error::{wrap_err, StoreError, StoreResult};
use weatherdeck_core::City;

/// Current schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const DEFAULT_PAGE_SIZE: usize = 32;

/// SQLite-backed city store.
pub struct CityStore {
    conn: Connection,
}

impl CityStore {
    /// Open (or create) the store at the given path.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the file cannot be opened or the
    /// schema cannot be created.
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| {
            StoreError::unavailable(format!("{}: {}", path.display(), e))
        })?;

        Self::init_schema(&conn).await.map_err(|e| {
            StoreError::unavailable(format!("{}: {}", path.display(), e))
        })?;

        tracing::info!("City store opened at {}", path.display());
        Ok(Self { conn })
    }

    /// Create an in-memory store.
    ///
    /// Used as the session-only fallback when the durable store is unavailable.
    pub async fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.call(|conn| {
            let version: i32 = conn
                .query_row("PRAGMA user_version", [], |row| row.get(0))
                .map_err(wrap_err)?;
            if version >= SCHEMA_VERSION {
                return Ok(());
            }

            tracing::info!(
                "Initializing city store schema (version {} -> {})",
                version,
                SCHEMA_VERSION
            );

            conn.execute_batch(&format!(
                r#"
                BEGIN;
                CREATE TABLE IF NOT EXISTS cities (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    key TEXT NOT NULL,
                    label TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_cities_key ON cities(key);
                CREATE INDEX IF NOT EXISTS idx_cities_label ON cities(label);

                PRAGMA user_version = {};
                COMMIT;
                "#,
                SCHEMA_VERSION
            ))
            .map_err(wrap_err)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Lazy cursor over all cities in insertion order.
    ///
    /// Rows are read a page at a time; call [`CityCursor::rewind`] to start
    /// over.
    pub fn list(&self) -> CityCursor<'_> {
        CityCursor::new(self, DEFAULT_PAGE_SIZE)
    }

    /// Collect every stored city.
    pub async fn all(&self) -> StoreResult<Vec<City>> {
        let mut cursor = self.list();
        let mut cities = Vec::new();
        while let Some(city) = cursor.next_city().await {
            cities.push(city?);
        }
        Ok(cities)
    }

    /// Insert a city, or update its label if the key is already stored.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidCity` for an empty key.
    pub async fn add(&self, city: &City) -> StoreResult<()> {
        if city.key.trim().is_empty() {
            return Err(StoreError::invalid_city("key cannot be empty"));
        }

        let (key, label) = (city.key.clone(), city.label.clone());
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO cities (key, label) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET label = excluded.label
                    "#,
                    params![key, label],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await?;

        tracing::debug!("Stored city {}", city);
        Ok(())
    }

    /// Remove a city by key. Returns whether a record was deleted.
    pub async fn remove(&self, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                conn.execute("DELETE FROM cities WHERE key = ?1", params![key])
                    .map_err(wrap_err)
            })
            .await?;
        Ok(deleted > 0)
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<City>> {
        let key = key.to_string();
        let city = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT key, label FROM cities WHERE key = ?1",
                    params![key],
                    |row| Ok(City::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .map_err(wrap_err)
            })
            .await?;
        Ok(city)
    }

    pub async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM cities", [], |row| row.get(0))
                    .map_err(wrap_err)
            })
            .await?;
        Ok(count as usize)
    }

    async fn page_after(&self, last_id: i64, limit: usize) -> StoreResult<Vec<(i64, City)>> {
        let page = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, key, label FROM cities WHERE id > ?1 ORDER BY id ASC LIMIT ?2")
                    .map_err(wrap_err)?;

                let rows = stmt
                    .query_map(params![last_id, limit as i64], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            City::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                        ))
                    })
                    .map_err(wrap_err)?;

                let mut page = Vec::new();
                for row in rows {
                    page.push(row.map_err(wrap_err)?);
                }
                Ok(page)
            })
            .await?;
        Ok(page)
    }
}

/// Restartable, paged cursor over the city table.
pub struct CityCursor<'a> {
    store: &'a CityStore,
    page_size: usize,
    last_id: i64,
    buffered: VecDeque<(i64, City)>,
    exhausted: bool,
}

impl<'a> CityCursor<'a> {
    fn new(store: &'a CityStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            last_id: 0,
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Read `page_size` rows per round trip.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Start again from the first city.
    pub fn rewind(&mut self) {
        self.last_id = 0;
        self.buffered.clear();
        self.exhausted = false;
    }

    /// The next city, or `None` once every row has been read.
    ///
    /// A failed page read is returned once and ends the cursor.
    pub async fn next_city(&mut self) -> Option<StoreResult<City>> {
        if self.buffered.is_empty() && !self.exhausted {
            if let Err(e) = self.fill().await {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffered.pop_front().map(|(_, city)| Ok(city))
    }

    async fn fill(&mut self) -> StoreResult<()> {
        let page = self.store.page_after(self.last_id, self.page_size).await?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some((id, _)) = page.last() {
            self.last_id = *id;
        }
        self.buffered.extend(page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn kyiv() -> City {
        City::new("924938", "Kyiv, UA")
    }

    async fn pragma_i32(store: &CityStore, sql: &'static str) -> i32 {
        store
            .conn
            .call(move |conn| conn.query_row(sql, [], |row| row.get(0)).map_err(wrap_err))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schema_version_recorded() {
        let store = CityStore::in_memory().await.unwrap();
        assert_eq!(pragma_i32(&store, "PRAGMA user_version").await, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_key_index_is_unique() {
        let store = CityStore::in_memory().await.unwrap();
        let unique = pragma_i32(
            &store,
            "SELECT \"unique\" FROM pragma_index_list('cities') WHERE name = 'idx_cities_key'",
        )
        .await;
        assert_eq!(unique, 1);
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = CityStore::in_memory().await.unwrap();
        store.add(&kyiv()).await.unwrap();

        let city = store.get("924938").await.unwrap().unwrap();
        assert_eq!(city.label, "Kyiv, UA");
        assert!(store.contains("924938").await.unwrap());
        assert!(!store.contains("2459115").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_same_key_twice_upserts() {
        let store = CityStore::in_memory().await.unwrap();
        store.add(&kyiv()).await.unwrap();
        store.add(&City::new("924938", "Kyiv")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("924938").await.unwrap().unwrap().label, "Kyiv");
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = CityStore::in_memory().await.unwrap();
        let result = store.add(&City::new("  ", "Nowhere")).await;
        assert!(matches!(result, Err(StoreError::InvalidCity(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order_across_upsert() {
        let store = CityStore::in_memory().await.unwrap();
        store.add(&City::new("2459115", "New York, US")).await.unwrap();
        store.add(&kyiv()).await.unwrap();
        store.add(&City::new("2459115", "New York")).await.unwrap();

        let keys: Vec<String> = store.all().await.unwrap().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["2459115", "924938"]);
    }

    #[tokio::test]
    async fn test_cursor_pages_lazily() {
        let store = CityStore::in_memory().await.unwrap();
        for i in 0..7 {
            store
                .add(&City::new(format!("k{}", i), format!("City {}", i)))
                .await
                .unwrap();
        }

        let mut cursor = store.list().with_page_size(3);
        let first = cursor.next_city().await.unwrap().unwrap();
        assert_eq!(first.key, "k0");
        assert_eq!(cursor.buffered.len(), 2);

        let mut rest = Vec::new();
        while let Some(city) = cursor.next_city().await {
            rest.push(city.unwrap());
        }
        assert_eq!(rest.len(), 6);
        assert_eq!(rest.last().unwrap().key, "k6");
    }

    #[tokio::test]
    async fn test_cursor_rewind_restarts() {
        let store = CityStore::in_memory().await.unwrap();
        store.add(&kyiv()).await.unwrap();
        store.add(&City::new("2459115", "New York, US")).await.unwrap();

        let mut cursor = store.list();
        let mut seen = 0;
        while cursor.next_city().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
        assert!(cursor.next_city().await.is_none());

        cursor.rewind();
        assert_eq!(cursor.next_city().await.unwrap().unwrap().key, "924938");
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let store = CityStore::in_memory().await.unwrap();
        assert!(store.list().next_city().await.is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = CityStore::in_memory().await.unwrap();
        store.add(&kyiv()).await.unwrap();

        assert!(store.remove("924938").await.unwrap());
        assert!(!store.remove("924938").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reopen_keeps_records_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cities.db");

        {
            let store = CityStore::open(&path).await.unwrap();
            store.add(&kyiv()).await.unwrap();
        }

        let store = CityStore::open(&path).await.unwrap();
        assert_eq!(store.all().await.unwrap(), vec![kyiv()]);
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("cities.db");

        match CityStore::open(&path).await {
            Err(e) => assert!(e.is_unavailable(), "unexpected error: {}", e),
            Ok(_) => panic!("opening inside a missing directory should fail"),
        }
    }
}
