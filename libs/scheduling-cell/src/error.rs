use thiserror::Error;
use uuid::Uuid;

use availability_cell::{BookingStatus, StoreError};
use coordination_cell::CoordinationError;
use shared_models::AppError;
use shared_pool::PoolError;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("requested slot is no longer available")]
    SlotUnavailable,

    #[error("scheduling is busy for this doctor and date")]
    LockBusy,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("booking not found: {0}")]
    NotFound(Uuid),

    #[error("invalid booking status transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

impl From<StoreError> for SchedulingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SlotTaken { .. } => SchedulingError::SlotUnavailable,
            StoreError::BookingNotFound(id) => SchedulingError::NotFound(id),
            StoreError::InvalidTransition { from, to } => {
                SchedulingError::InvalidTransition { from, to }
            }
            other => SchedulingError::Store(other),
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(error: SchedulingError) -> Self {
        match error {
            SchedulingError::SlotUnavailable => AppError::Conflict(
                "slot is no longer available, please pick another time".to_string(),
            ),
            SchedulingError::LockBusy => AppError::Busy(
                "another booking for this doctor is in progress, try again shortly".to_string(),
            ),
            SchedulingError::Validation(msg) => AppError::BadRequest(msg),
            SchedulingError::NotFound(id) => AppError::NotFound(format!("booking not found: {}", id)),
            SchedulingError::InvalidTransition { from, to } => {
                AppError::Conflict(format!("booking cannot move from {} to {}", from, to))
            }
            SchedulingError::Store(StoreError::Timeout { .. }) => {
                AppError::Timeout("scheduling backend timed out, please try again".to_string())
            }
            SchedulingError::Store(StoreError::Pool(PoolError::Exhausted { .. })) => {
                AppError::Busy("scheduling backend is saturated, try again shortly".to_string())
            }
            SchedulingError::Store(e) => AppError::Database(e.to_string()),
            SchedulingError::Coordination(e) => {
                AppError::Busy(format!("coordination tier unavailable: {}", e))
            }
        }
    }
}
