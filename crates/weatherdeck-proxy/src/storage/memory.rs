//! In-memory cache storage.
//!
//! Partitions live only as long as the process. Used when the cache backend
//! is configured as `memory` and throughout the tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheStorage;
use crate::error::ProxyResult;
use crate::http::Response;

#[derive(Debug, Default)]
struct Partition {
    name: String,
    entries: HashMap<String, Response>,
}

/// Thread-safe in-memory partitions, kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    partitions: Arc<RwLock<Vec<Partition>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_or_create<'a>(partitions: &'a mut Vec<Partition>, name: &str) -> &'a mut Partition {
    let index = match partitions.iter().position(|p| p.name == name) {
        Some(index) => index,
        None => {
            partitions.push(Partition {
                name: name.to_string(),
                entries: HashMap::new(),
            });
            partitions.len() - 1
        }
    };
    &mut partitions[index]
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> ProxyResult<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn has(&self, name: &str) -> ProxyResult<bool> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().any(|p| p.name == name))
    }

    async fn delete(&self, name: &str) -> ProxyResult<bool> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != name);
        Ok(partitions.len() != before)
    }

    async fn match_in(&self, name: &str, url: &str) -> ProxyResult<Option<Response>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.entries.get(url))
            .cloned())
    }

    async fn match_any(&self, url: &str) -> ProxyResult<Option<Response>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().find_map(|p| p.entries.get(url)).cloned())
    }

    async fn put(&self, name: &str, url: &str, response: &Response) -> ProxyResult<()> {
        let mut partitions = self.partitions.write().await;
        find_or_create(&mut partitions, name)
            .entries
            .insert(url.to_string(), response.clone());
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> ProxyResult<()> {
        // Single write lock: readers see all of the batch or none of it.
        let mut partitions = self.partitions.write().await;
        find_or_create(&mut partitions, name).entries.extend(entries);
        Ok(())
    }

    async fn entry_count(&self, name: &str) -> ProxyResult<usize> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == name)
            .map_or(0, |p| p.entries.len()))
    }
}
