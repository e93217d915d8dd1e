use std::sync::Arc;

use aibtc_kv::{KvStore, MemoryStore, RetryingStore, SharedStore};

use crate::config::{ServiceConfig, MEMORY_STORE_URL};
use crate::error::ServiceError;
use crate::gate::SharedSecretGate;

/// Open the store named by `store_url`, with deadlines and retries on every call
pub async fn connect_store(config: &ServiceConfig) -> Result<SharedStore, ServiceError> {
    let retry = config.retry_config();

    if config.store_url == MEMORY_STORE_URL {
        log::info!("Using in-memory store");
        return Ok(Arc::new(RetryingStore::new(MemoryStore::new(), retry)));
    }

    connect_redis(&config.store_url, retry).await
}

#[cfg(feature = "redis-store")]
async fn connect_redis(url: &str, retry: aibtc_kv::RetryConfig) -> Result<SharedStore, ServiceError> {
    log::info!("Connecting to redis store");
    let store = aibtc_kv::RedisStore::connect(url).await?;
    Ok(Arc::new(RetryingStore::new(store, retry)))
}

#[cfg(not(feature = "redis-store"))]
async fn connect_redis(url: &str, _retry: aibtc_kv::RetryConfig) -> Result<SharedStore, ServiceError> {
    Err(ServiceError::Configuration(format!(
        "store url {} needs the redis-store feature",
        url
    )))
}

/// Split a `name=secret` pair
pub fn parse_shared_key(pair: &str) -> Result<(&str, &str), ServiceError> {
    match pair.split_once('=') {
        Some((name, secret)) if !name.trim().is_empty() && !secret.is_empty() => {
            Ok((name.trim(), secret))
        }
        _ => Err(ServiceError::Configuration(
            "shared keys must be given as name=secret".to_string(),
        )),
    }
}

/// Write configured shared keys into the in-memory store so a local
/// instance can be called. Other stores are provisioned out of band.
pub async fn seed_shared_keys(config: &ServiceConfig, store: &SharedStore) -> Result<(), ServiceError> {
    if config.seed_shared_keys.is_empty() {
        return Ok(());
    }
    if config.store_url != MEMORY_STORE_URL {
        log::warn!("Ignoring seeded shared keys for a persistent store");
        return Ok(());
    }

    for pair in &config.seed_shared_keys {
        let (name, secret) = parse_shared_key(pair)?;
        store.put(&SharedSecretGate::secret_key(name), secret, None).await?;
        log::info!("Seeded shared key for {}", name);
    }
    Ok(())
}
