use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("resource pool exhausted after waiting {waited_ms}ms")]
    Exhausted { waited_ms: u64 },

    #[error("failed to create pooled resource: {0}")]
    Resource(String),
}

/// Creates and health-checks the resources a pool hands out.
#[async_trait]
pub trait PoolManager: Send + Sync + 'static {
    type Resource: Send;

    async fn create(&self) -> Result<Self::Resource, PoolError>;

    /// Lightweight liveness probe. Only run on resources that have sat
    /// idle past the pool's freshness threshold.
    async fn validate(&self, resource: &mut Self::Resource) -> bool;
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub acquire_timeout: Duration,
    pub idle_after: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Duration::from_secs(5),
            idle_after: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub max_size: usize,
    pub idle: usize,
    pub in_use: usize,
}

struct IdleEntry<R> {
    resource: R,
    idle_since: Instant,
}

struct PoolInner<M: PoolManager> {
    manager: M,
    config: PoolConfig,
    idle: Mutex<VecDeque<IdleEntry<M::Resource>>>,
    permits: Arc<Semaphore>,
}

impl<M: PoolManager> PoolInner<M> {
    fn idle_queue(&self) -> MutexGuard<'_, VecDeque<IdleEntry<M::Resource>>> {
        self.idle.lock().expect("pool mutex poisoned")
    }
}

/// Bounded pool of reusable connections. The semaphore caps active plus
/// idle resources at `max_size`; broken resources are discarded and
/// replaced lazily on the next acquire, never eagerly.
pub struct ResourcePool<M: PoolManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: PoolManager> Clone for ResourcePool<M> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<M: PoolManager> ResourcePool<M> {
    pub fn new(manager: M, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_size));
        Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                idle: Mutex::new(VecDeque::new()),
                permits,
            }),
        }
    }

    /// Waits up to `acquire_timeout` for capacity, then hands out an idle
    /// resource or creates a fresh one. Exhaustion and creation failures
    /// are distinct errors; neither is retried here.
    pub async fn acquire(&self) -> Result<PooledResource<M>, PoolError> {
        let started = Instant::now();
        let waiting = self.inner.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.inner.config.acquire_timeout, waiting).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(PoolError::Resource("pool semaphore closed".to_string()))
            }
            Err(_elapsed) => {
                return Err(PoolError::Exhausted {
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        loop {
            let candidate = self.inner.idle_queue().pop_front();
            let Some(mut entry) = candidate else { break };

            if entry.idle_since.elapsed() < self.inner.config.idle_after {
                return Ok(PooledResource::new(Arc::clone(&self.inner), entry.resource, permit));
            }
            if self.inner.manager.validate(&mut entry.resource).await {
                return Ok(PooledResource::new(Arc::clone(&self.inner), entry.resource, permit));
            }
            debug!("discarding stale pooled resource that failed validation");
        }

        let resource = self.inner.manager.create().await?;
        Ok(PooledResource::new(Arc::clone(&self.inner), resource, permit))
    }

    pub fn status(&self) -> PoolStatus {
        let max_size = self.inner.config.max_size;
        let idle = self.inner.idle_queue().len();
        let free = self.inner.permits.available_permits();
        PoolStatus { max_size, idle, in_use: max_size - free }
    }
}

/// RAII handle for one pooled resource. Returned to the idle set on drop;
/// `discard` drops the resource instead when the caller saw it break.
pub struct PooledResource<M: PoolManager> {
    resource: Option<M::Resource>,
    pool: Arc<PoolInner<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: PoolManager> PooledResource<M> {
    fn new(pool: Arc<PoolInner<M>>, resource: M::Resource, permit: OwnedSemaphorePermit) -> Self {
        Self { resource: Some(resource), pool, _permit: permit }
    }

    pub fn discard(mut self) {
        self.resource = None;
    }
}

impl<M: PoolManager> std::fmt::Debug for PooledResource<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledResource")
            .field("acquired", &self.resource.is_some())
            .finish()
    }
}

impl<M: PoolManager> Deref for PooledResource<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("pooled resource already released")
    }
}

impl<M: PoolManager> DerefMut for PooledResource<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("pooled resource already released")
    }
}

impl<M: PoolManager> Drop for PooledResource<M> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool
                .idle_queue()
                .push_back(IdleEntry { resource, idle_since: Instant::now() });
        }
    }
}
