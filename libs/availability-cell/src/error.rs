use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::models::BookingStatus;
use shared_pool::PoolError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("database error: {0}")]
    Database(String),

    #[error("database call exceeded {deadline_ms}ms deadline")]
    Timeout { deadline_ms: u64 },

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("slot at {start_time} on {date} is already booked")]
    SlotTaken { date: NaiveDate, start_time: NaiveTime },

    #[error("invalid booking status transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("malformed scheduling data: {0}")]
    DataIntegrity(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

impl StoreError {
    /// Transient infrastructure faults a caller may retry with backoff.
    /// Everything else is either definitive or a data error.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Pool(_) | StoreError::Timeout { .. })
    }
}
