use thiserror::Error;

use shared_pool::PoolError;

#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("cache tier pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
