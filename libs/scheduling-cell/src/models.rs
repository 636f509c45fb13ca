// libs/scheduling-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::{Booking, BookingStatus, SlotQueryResult};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Caller-facing slot listing; only free slots are exposed.
#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<SlotView>,
}

impl From<SlotQueryResult> for SlotsResponse {
    fn from(result: SlotQueryResult) -> Self {
        let slots = result
            .available_slots()
            .map(|slot| SlotView { start_time: slot.start_time, end_time: slot.end_time })
            .collect();
        Self { doctor_id: result.doctor_id, date: result.date, slots }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookSlotRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id,
            status: booking.status,
            doctor_id: booking.doctor_id,
            patient_id: booking.patient_id,
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
        }
    }
}
