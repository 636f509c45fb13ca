use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoordinationError;
use crate::manager::RedisManager;
use availability_cell::SlotQueryResult;
use shared_pool::ResourcePool;

/// TTL memoization of computed slot grids. Never a source of truth: a
/// booking mutation synchronously invalidates the affected key, so
/// staleness is bounded by the TTL only between mutations.
#[async_trait]
pub trait SlotCache: Send + Sync {
    async fn get(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<SlotQueryResult>, CoordinationError>;

    async fn put(
        &self,
        result: &SlotQueryResult,
        ttl: Duration,
    ) -> Result<(), CoordinationError>;

    async fn invalidate(&self, doctor_id: Uuid, date: NaiveDate) -> Result<(), CoordinationError>;
}

pub struct RedisSlotCache {
    pool: ResourcePool<RedisManager>,
}

impl RedisSlotCache {
    pub fn new(pool: ResourcePool<RedisManager>) -> Self {
        Self { pool }
    }
}

fn cache_key(doctor_id: Uuid, date: NaiveDate) -> String {
    format!("slots:{}:{}", doctor_id, date)
}

#[async_trait]
impl SlotCache for RedisSlotCache {
    async fn get(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<SlotQueryResult>, CoordinationError> {
        let key = cache_key(doctor_id, date);
        let mut conn = self.pool.acquire().await?;
        let payload: Option<String> = conn.get(&key).await?;

        match payload {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(result) => Ok(Some(result)),
                Err(e) => {
                    warn!(key, "dropping corrupt slot cache entry: {}", e);
                    let _: () = conn.del(&key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        result: &SlotQueryResult,
        ttl: Duration,
    ) -> Result<(), CoordinationError> {
        let key = cache_key(result.doctor_id, result.date);
        let payload = serde_json::to_string(result)?;
        let ttl_secs = ttl.as_secs().max(1) as u64;

        let mut conn = self.pool.acquire().await?;
        let _: () = conn.set_ex(&key, payload, ttl_secs).await?;
        debug!(key, ttl_secs, "slot cache entry stored");
        Ok(())
    }

    async fn invalidate(&self, doctor_id: Uuid, date: NaiveDate) -> Result<(), CoordinationError> {
        let key = cache_key(doctor_id, date);
        let mut conn = self.pool.acquire().await?;
        let _: () = conn.del(&key).await?;
        debug!(key, "slot cache entry invalidated");
        Ok(())
    }
}
