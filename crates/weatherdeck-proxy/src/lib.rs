//! Request-intercepting cache in front of all outbound traffic.
//!
//! Shell assets are served cache-first from a versioned partition; forecast
//! data always goes to the network and is opportunistically cached in a
//! partition that survives shell upgrades.

pub mod error;
pub mod http;
pub mod network;
pub mod proxy;
pub mod storage;

pub use error::{ProxyError, ProxyResult};
pub use http::{Request, Response};
pub use network::{HttpNetwork, Network};
pub use proxy::{CacheProxy, ProxyConfig, ProxyState};
pub use storage::{CacheStorage, MemoryCacheStorage, SqliteCacheStorage};
