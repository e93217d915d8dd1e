use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::{KvError, KvStore};

/// Configuration for store call deadlines and retry behavior
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Deadline for a single attempt
    pub timeout: Duration,

    /// Maximum number of retry attempts after the first one
    pub max_retries: u32,

    /// Initial backoff duration before first retry
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Factor to apply random jitter (0-1)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_retries: 2,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Executes a store operation under a deadline, retrying transient failures
///
/// # Arguments
/// * `operation` - The async operation to execute
/// * `config` - Retry configuration
///
/// # Returns
/// Result of the operation or the last error encountered
pub async fn with_retry<F, Fut, T>(mut operation: F, config: &RetryConfig) -> Result<T, KvError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KvError>>,
{
    let mut current_retry = 0;
    let mut current_backoff = config.initial_backoff;

    loop {
        let error = match tokio::time::timeout(config.timeout, operation()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(error)) => error,
            Err(_) => KvError::Timeout(config.timeout),
        };

        // Backend errors are answers, not outages
        if !error.is_transient() || current_retry >= config.max_retries {
            return Err(error);
        }

        log::warn!(
            "Store operation failed (attempt {}/{}): {}",
            current_retry + 1,
            config.max_retries + 1,
            error
        );

        let jitter_range = (current_backoff.as_millis() as f64 * config.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        tokio::time::sleep(current_backoff.saturating_add(Duration::from_millis(jitter))).await;

        current_retry += 1;

        let next_backoff_millis = current_backoff.as_millis() as f64 * config.backoff_multiplier;
        current_backoff = Duration::from_millis(
            next_backoff_millis.min(config.max_backoff.as_millis() as f64) as u64,
        );
    }
}

/// Wraps a store so every call gets a deadline and bounded retries
pub struct RetryingStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: KvStore> RetryingStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl<S: KvStore> KvStore for RetryingStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        with_retry(|| self.inner.get(key), &self.config).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        with_retry(|| self.inner.put(key, value, ttl), &self.config).await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        with_retry(|| self.inner.delete(key), &self.config).await
    }
}
