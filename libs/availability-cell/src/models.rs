// libs/availability-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::{Queryable, Selectable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Recurring weekly availability rule for a doctor. Owned by the doctor
/// management workflows; read-only here.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::availability_templates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AvailabilityTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i16, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub break_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityTemplate {
    /// Data-quality probe; malformed templates degrade to empty
    /// availability instead of failing the request.
    pub fn is_well_formed(&self) -> bool {
        self.start_time < self.end_time
            && self.slot_duration_minutes > 0
            && self.break_duration_minutes >= 0
    }
}

/// Date-specific unavailability window. A null time range blocks the
/// entire day (vacation, sick day, etc.).
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::unavailability_exceptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UnavailabilityException {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UnavailabilityException {
    pub fn is_whole_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// True when the candidate slot is fully contained in this window.
    pub fn covers(&self, slot_start: NaiveTime, slot_end: NaiveTime) -> bool {
        matches!(
            (self.start_time, self.end_time),
            (Some(start), Some(end)) if slot_start >= start && slot_end <= end
        )
    }
}

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
            BookingStatus::Rescheduled => "rescheduled",
        }
    }

    /// Forward path scheduled -> confirmed -> in_progress -> completed,
    /// with cancellation off-ramps from the first two states. Terminal
    /// states accept no further transitions.
    pub fn can_transition_to(&self, next: &BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Scheduled, BookingStatus::Confirmed)
                | (BookingStatus::Scheduled, BookingStatus::Cancelled)
                | (BookingStatus::Scheduled, BookingStatus::NoShow)
                | (BookingStatus::Scheduled, BookingStatus::Rescheduled)
                | (BookingStatus::Confirmed, BookingStatus::InProgress)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::NoShow)
                | (BookingStatus::Confirmed, BookingStatus::Rescheduled)
                | (BookingStatus::InProgress, BookingStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::NoShow
                | BookingStatus::Rescheduled
        )
    }

    /// Whether a booking in this status still occupies its slot.
    pub fn blocks_slot(&self) -> bool {
        !matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::NoShow | BookingStatus::Rescheduled
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "scheduled" => Ok(BookingStatus::Scheduled),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "no_show" => Ok(BookingStatus::NoShow),
            "rescheduled" => Ok(BookingStatus::Rescheduled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub rescheduled_to: Option<Uuid>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Candidate booking produced by the scheduling service after the slot
/// has been re-verified under the doctor+date lock.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

// ==============================================================================
// SLOT PROJECTION
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

/// Derived projection of one doctor's day. Cache-lived only, rebuilt from
/// templates, exceptions and bookings; never a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotQueryResult {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

impl SlotQueryResult {
    pub fn empty(doctor_id: Uuid, date: NaiveDate) -> Self {
        Self { doctor_id, date, slots: Vec::new() }
    }

    pub fn available_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.available)
    }

    pub fn is_start_available(&self, start_time: NaiveTime) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.start_time == start_time && slot.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_transitions_are_allowed() {
        assert!(BookingStatus::Scheduled.can_transition_to(&BookingStatus::Confirmed));
        assert!(BookingStatus::Confirmed.can_transition_to(&BookingStatus::InProgress));
        assert!(BookingStatus::InProgress.can_transition_to(&BookingStatus::Completed));
    }

    #[test]
    fn off_ramps_only_leave_early_states() {
        assert!(BookingStatus::Scheduled.can_transition_to(&BookingStatus::Cancelled));
        assert!(BookingStatus::Confirmed.can_transition_to(&BookingStatus::NoShow));
        assert!(!BookingStatus::InProgress.can_transition_to(&BookingStatus::Cancelled));
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        for terminal in [
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
            BookingStatus::Rescheduled,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(&BookingStatus::Scheduled));
            assert!(!terminal.can_transition_to(&BookingStatus::Confirmed));
        }
    }

    #[test]
    fn released_statuses_no_longer_block_their_slot() {
        assert!(BookingStatus::Scheduled.blocks_slot());
        assert!(BookingStatus::Confirmed.blocks_slot());
        assert!(!BookingStatus::Cancelled.blocks_slot());
        assert!(!BookingStatus::NoShow.blocks_slot());
        assert!(!BookingStatus::Rescheduled.blocks_slot());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            BookingStatus::Scheduled,
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
            BookingStatus::Rescheduled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
        assert!("unknown".parse::<BookingStatus>().is_err());
    }
}
