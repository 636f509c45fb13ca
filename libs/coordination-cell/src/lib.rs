pub mod cache;
pub mod error;
pub mod lock;
pub mod manager;

pub use cache::{RedisSlotCache, SlotCache};
pub use error::CoordinationError;
pub use lock::{LockHandle, LockManager, RedisLockManager};
pub use manager::RedisManager;
