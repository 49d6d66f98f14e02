//! SQLite-backed cache storage.
//!
//! Partitions and their entries persist across restarts so the shell and the
//! last known forecasts are available offline. Every query runs on the
//! connection's own thread; callers only await it.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use super::CacheStorage;
use crate::error::{ProxyError, ProxyResult};
use crate::http::Response;

/// Wrap a rusqlite error for return from a `Connection::call` closure.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn raw_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u16, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// One entry as stored: headers are kept as a JSON array of pairs.
struct StoredEntry {
    url: String,
    status: u16,
    headers_json: String,
    body: Bytes,
}

impl StoredEntry {
    fn encode(url: String, response: &Response) -> ProxyResult<Self> {
        Ok(Self {
            url,
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.clone(),
        })
    }

    fn decode(self) -> ProxyResult<Response> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(Response {
            url: self.url,
            status: self.status,
            headers,
            body: self.body,
        })
    }
}

const SELECT_IN_PARTITION: &str = r#"
    SELECT e.status, e.headers_json, e.body
    FROM entries e JOIN partitions p ON p.id = e.partition_id
    WHERE p.name = ?1 AND e.url = ?2
"#;

const SELECT_OLDEST_MATCH: &str = r#"
    SELECT e.status, e.headers_json, e.body
    FROM entries e JOIN partitions p ON p.id = e.partition_id
    WHERE e.url = ?1
    ORDER BY p.id ASC
    LIMIT 1
"#;

pub struct SqliteCacheStorage {
    conn: Connection,
}

impl SqliteCacheStorage {
    /// Open (or create) the cache database.
    ///
    /// # Errors
    /// Returns `ProxyError::CacheUnavailable` if the database cannot be opened
    /// or initialized.
    pub async fn open<P: AsRef<Path>>(path: P) -> ProxyResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| {
            ProxyError::CacheUnavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::init_schema(&conn).await.map_err(|e| {
            ProxyError::CacheUnavailable(format!("{}: {}", path.display(), e))
        })?;

        tracing::info!("Cache storage opened at {}", path.display());
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub async fn in_memory() -> ProxyResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> ProxyResult<()> {
        conn.call(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS partitions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS entries (
                    partition_id INTEGER NOT NULL,
                    url TEXT NOT NULL,
                    status INTEGER NOT NULL,
                    headers_json TEXT NOT NULL,
                    body BLOB NOT NULL,
                    stored_at INTEGER NOT NULL,
                    PRIMARY KEY (partition_id, url)
                );

                CREATE INDEX IF NOT EXISTS idx_entries_url ON entries(url);
                "#,
            )
            .map_err(wrap_err)
        })
        .await?;
        Ok(())
    }

    /// Look up one entry with `sql`, in `partition` or across all of them.
    async fn select_one(
        &self,
        url: &str,
        sql: &'static str,
        partition: Option<String>,
    ) -> ProxyResult<Option<Response>> {
        let url = url.to_string();
        let raw = self
            .conn
            .call(move |conn| {
                let found = match &partition {
                    Some(name) => conn.query_row(sql, params![name, url], raw_entry),
                    None => conn.query_row(sql, params![url], raw_entry),
                };
                let found = found.optional().map_err(wrap_err)?;
                Ok(found.map(|(status, headers_json, body)| StoredEntry {
                    url,
                    status,
                    headers_json,
                    body: body.into(),
                }))
            })
            .await?;

        raw.map(StoredEntry::decode).transpose()
    }

    /// Create the partition if needed and write `entries` in one transaction.
    ///
    /// Any error drops the transaction, rolling back the partition and every
    /// entry.
    async fn write(&self, name: &str, entries: Vec<StoredEntry>) -> ProxyResult<usize> {
        let name = name.to_string();
        let written = self
            .conn
            .call(move |conn| {
                let now = Utc::now().timestamp_millis();
                let tx = conn.transaction().map_err(wrap_err)?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )
                .map_err(wrap_err)?;
                let partition_id: i64 = tx
                    .query_row(
                        "SELECT id FROM partitions WHERE name = ?1",
                        params![name],
                        |row| row.get(0),
                    )
                    .map_err(wrap_err)?;

                for entry in &entries {
                    tx.execute(
                        r#"
                        INSERT OR REPLACE INTO entries
                        (partition_id, url, status, headers_json, body, stored_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        "#,
                        params![
                            partition_id,
                            entry.url,
                            entry.status,
                            entry.headers_json,
                            entry.body.as_ref(),
                            now,
                        ],
                    )
                    .map_err(wrap_err)?;
                }
                tx.commit().map_err(wrap_err)?;
                Ok(entries.len())
            })
            .await?;
        Ok(written)
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn keys(&self) -> ProxyResult<Vec<String>> {
        let names = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT name FROM partitions ORDER BY id ASC")
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(wrap_err)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(wrap_err)
            })
            .await?;
        Ok(names)
    }

    async fn has(&self, name: &str) -> ProxyResult<bool> {
        let name = name.to_string();
        let count: i64 = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM partitions WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .map_err(wrap_err)
            })
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, name: &str) -> ProxyResult<bool> {
        let name = name.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                tx.execute(
                    "DELETE FROM entries WHERE partition_id IN (SELECT id FROM partitions WHERE name = ?1)",
                    params![name],
                )
                .map_err(wrap_err)?;
                let deleted = tx
                    .execute("DELETE FROM partitions WHERE name = ?1", params![name])
                    .map_err(wrap_err)?;
                tx.commit().map_err(wrap_err)?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn match_in(&self, name: &str, url: &str) -> ProxyResult<Option<Response>> {
        self.select_one(url, SELECT_IN_PARTITION, Some(name.to_string()))
            .await
    }

    async fn match_any(&self, url: &str) -> ProxyResult<Option<Response>> {
        self.select_one(url, SELECT_OLDEST_MATCH, None).await
    }

    async fn put(&self, name: &str, url: &str, response: &Response) -> ProxyResult<()> {
        let entry = StoredEntry::encode(url.to_string(), response)?;
        self.write(name, vec![entry]).await?;
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> ProxyResult<()> {
        let entries = entries
            .into_iter()
            .map(|(url, response)| StoredEntry::encode(url, &response))
            .collect::<ProxyResult<Vec<_>>>()?;
        let count = self.write(name, entries).await?;
        tracing::debug!("Committed {} entries to {}", count, name);
        Ok(())
    }

    async fn entry_count(&self, name: &str) -> ProxyResult<usize> {
        let name = name.to_string();
        let count: i64 = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    r#"
                    SELECT COUNT(*) FROM entries e JOIN partitions p ON p.id = e.partition_id
                    WHERE p.name = ?1
                    "#,
                    params![name],
                    |row| row.get(0),
                )
                .map_err(wrap_err)
            })
            .await?;
        Ok(count as usize)
    }
}
