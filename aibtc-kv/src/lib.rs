//! # aibtc-kv
//!
//! A small string-keyed store with per-entry expiry. It offers no
//! transactions and no multi-key atomicity; every call may fail on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod error;
pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod retry;

pub use error::KvError;
pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
pub use retry::{RetryConfig, RetryingStore};

/// An eventually consistent key-value store with optional expiry per entry
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value, `None` if it was never written or has expired
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a value, replacing any previous one. `ttl` of `None` never expires.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Remove a value. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

pub type SharedStore = Arc<dyn KvStore>;

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        (**self).put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        (**self).delete(key).await
    }
}
