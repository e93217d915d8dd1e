use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};

use crate::{KvError, KvStore};

/// Store backed by a Redis server through one multiplexed connection
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to `url`, e.g. `redis://127.0.0.1:6379/0`
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(map_redis_error)?;
        log::info!("Connected to redis store");
        Ok(Self { connection })
    }
}

fn map_redis_error(err: RedisError) -> KvError {
    if err.is_timeout() {
        KvError::Connection(format!("timed out: {err}"))
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        KvError::Connection(err.to_string())
    } else {
        KvError::Backend(err.to_string())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut con = self.connection.clone();
        con.get::<_, Option<String>>(key).await.map_err(map_redis_error)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut con = self.connection.clone();
        match ttl {
            // Redis rejects a zero expiry
            Some(ttl) => con
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1) as usize)
                .await
                .map_err(map_redis_error),
            None => con.set::<_, _, ()>(key, value).await.map_err(map_redis_error),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut con = self.connection.clone();
        con.del::<_, ()>(key).await.map_err(map_redis_error)
    }
}
