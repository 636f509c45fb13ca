use std::env;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub database_pool: PoolSettings,
    pub cache_pool: PoolSettings,
    pub cache: CacheSettings,
    pub locks: LockSettings,
    pub policy: SchedulingPolicy,
}

/// Sizing and timeouts for one resource pool (database or cache tier).
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: usize,
    pub acquire_timeout: Duration,
    /// Connections idle longer than this are health-checked before reuse.
    pub idle_after: Duration,
    /// Per-call deadline for round-trips made on a pooled connection.
    pub call_deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub slot_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    /// TTL for the short lock taken while filling the slot cache.
    pub query_ttl: Duration,
    /// TTL for the lock held across a transactional booking write.
    pub booking_ttl: Duration,
    pub busy_retry_delay: Duration,
    pub busy_retries: u32,
}

/// Booking-window policy, injected into the scheduling service at
/// construction rather than read per call.
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    pub min_notice_hours: i64,
    pub max_days_ahead: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| {
                warn!("DATABASE_URL not set, using empty value");
                String::new()
            }),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| {
                warn!("REDIS_URL not set, using default");
                "redis://localhost:6379".to_string()
            }),
            database_pool: PoolSettings {
                max_connections: env_usize("DB_POOL_MAX_CONNECTIONS", 10),
                acquire_timeout: env_millis("DB_POOL_ACQUIRE_TIMEOUT_MS", 5_000),
                idle_after: env_millis("DB_POOL_IDLE_AFTER_MS", 30_000),
                call_deadline: env_millis("DB_CALL_DEADLINE_MS", 3_000),
            },
            cache_pool: PoolSettings {
                max_connections: env_usize("REDIS_POOL_MAX_CONNECTIONS", 10),
                acquire_timeout: env_millis("REDIS_POOL_ACQUIRE_TIMEOUT_MS", 2_000),
                idle_after: env_millis("REDIS_POOL_IDLE_AFTER_MS", 30_000),
                call_deadline: env_millis("REDIS_CALL_DEADLINE_MS", 1_000),
            },
            cache: CacheSettings {
                slot_ttl: env_millis("SLOT_CACHE_TTL_MS", 120_000),
            },
            locks: LockSettings {
                query_ttl: env_millis("QUERY_LOCK_TTL_MS", 5_000),
                booking_ttl: env_millis("BOOKING_LOCK_TTL_MS", 15_000),
                busy_retry_delay: env_millis("LOCK_BUSY_RETRY_DELAY_MS", 50),
                busy_retries: env_usize("LOCK_BUSY_RETRIES", 10) as u32,
            },
            policy: SchedulingPolicy {
                min_notice_hours: env_i64("MIN_NOTICE_HOURS", 2),
                max_days_ahead: env_i64("MAX_DAYS_AHEAD", 90),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.database_url.is_empty() && !self.redis_url.is_empty()
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!("{} is not a valid duration in ms, using default {}ms", name, default_ms);
                Duration::from_millis(default_ms)
            }
        },
        Err(_) => Duration::from_millis(default_ms),
    }
}
