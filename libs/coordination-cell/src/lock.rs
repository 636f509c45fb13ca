use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoordinationError;
use crate::manager::RedisManager;
use shared_pool::ResourcePool;

/// Compare the stored owner token before deleting, so a holder whose TTL
/// already expired cannot release a lock someone else reacquired.
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('pexpire', KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Proof of lock ownership for one critical section. Expires on its own
/// if the holder crashes; release and extend verify the token first.
#[derive(Debug, Clone)]
pub struct LockHandle {
    pub key: String,
    pub token: Uuid,
    pub ttl: Duration,
}

/// TTL-bound mutual exclusion shared across service instances through the
/// cache tier. Acquisition is non-blocking; callers own their backoff.
#[async_trait]
pub trait LockManager: Send + Sync {
    async fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockHandle>, CoordinationError>;

    /// Idempotent. Releasing an expired or reacquired lock is a no-op.
    async fn release(&self, handle: &LockHandle) -> Result<(), CoordinationError>;

    /// False when the handle's token no longer owns the key.
    async fn extend(&self, handle: &LockHandle, ttl: Duration) -> Result<bool, CoordinationError>;
}

pub struct RedisLockManager {
    pool: ResourcePool<RedisManager>,
    release_script: Script,
    extend_script: Script,
}

impl RedisLockManager {
    pub fn new(pool: ResourcePool<RedisManager>) -> Self {
        Self {
            pool,
            release_script: Script::new(RELEASE_SCRIPT),
            extend_script: Script::new(EXTEND_SCRIPT),
        }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockHandle>, CoordinationError> {
        let mut conn = self.pool.acquire().await?;
        let token = Uuid::new_v4();
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        let acquired: bool = redis::cmd("SET")
            .arg(key)
            .arg(token.to_string())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut *conn)
            .await?;

        if !acquired {
            debug!(key, "lock already held by another instance");
            return Ok(None);
        }

        Ok(Some(LockHandle { key: key.to_string(), token, ttl }))
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), CoordinationError> {
        let mut conn = self.pool.acquire().await?;
        let removed: i32 = self
            .release_script
            .key(&handle.key)
            .arg(handle.token.to_string())
            .invoke_async(&mut *conn)
            .await?;

        if removed == 0 {
            debug!(key = %handle.key, "lock already expired before release");
        }
        Ok(())
    }

    async fn extend(&self, handle: &LockHandle, ttl: Duration) -> Result<bool, CoordinationError> {
        let mut conn = self.pool.acquire().await?;
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let extended: i32 = self
            .extend_script
            .key(&handle.key)
            .arg(handle.token.to_string())
            .arg(ttl_ms)
            .invoke_async(&mut *conn)
            .await?;

        Ok(extended == 1)
    }
}
