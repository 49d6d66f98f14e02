//! Named cache partitions keyed by request URL.
//!
//! Modelled on browser cache storage: a set of partitions, each mapping a
//! request URL to the stored response. The partition name doubles as the
//! generation tag of its entries.

mod memory;
mod sqlite;

pub use memory::MemoryCacheStorage;
pub use sqlite::SqliteCacheStorage;

use async_trait::async_trait;

use crate::error::ProxyResult;
use crate::http::Response;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Partition names, oldest first.
    async fn keys(&self) -> ProxyResult<Vec<String>>;

    async fn has(&self, name: &str) -> ProxyResult<bool>;

    /// Drop a partition and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> ProxyResult<bool>;

    /// Look up `url` in one partition.
    async fn match_in(&self, name: &str, url: &str) -> ProxyResult<Option<Response>>;

    /// Look up `url` in every partition, oldest first.
    async fn match_any(&self, url: &str) -> ProxyResult<Option<Response>>;

    /// Store one response, creating the partition if needed and replacing
    /// any previous entry for `url`.
    async fn put(&self, name: &str, url: &str, response: &Response) -> ProxyResult<()>;

    /// Store a batch atomically: either every entry is committed or none is.
    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> ProxyResult<()>;

    /// Number of entries in a partition (0 if it doesn't exist).
    async fn entry_count(&self, name: &str) -> ProxyResult<usize>;
}
