use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;

use crate::error::CoordinationError;
use shared_pool::{PoolError, PoolManager};

/// Creates multiplexed Redis connections for the shared resource pool.
pub struct RedisManager {
    client: Client,
}

impl RedisManager {
    pub fn new(redis_url: &str) -> Result<Self, CoordinationError> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PoolManager for RedisManager {
    type Resource = MultiplexedConnection;

    async fn create(&self) -> Result<MultiplexedConnection, PoolError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PoolError::Resource(format!("redis connect failed: {}", e)))
    }

    async fn validate(&self, conn: &mut MultiplexedConnection) -> bool {
        redis::cmd("PING")
            .query_async::<_, String>(conn)
            .await
            .is_ok()
    }
}
