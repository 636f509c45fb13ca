// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_models::AppError;

use crate::models::{
    BookSlotRequest, BookingResponse, CancelBookingRequest, SlotsQuery, SlotsResponse,
};
use crate::services::scheduling::SchedulingService;

/// List free slots for a doctor on a date. Served cache-first; the result
/// may lag concurrent bookings by at most the cache TTL.
pub async fn get_available_slots(
    State(service): State<Arc<SchedulingService>>,
    Query(params): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let result = service.query_slots(params.doctor_id, params.date).await?;
    Ok(Json(result.into()))
}

pub async fn book_slot(
    State(service): State<Arc<SchedulingService>>,
    Json(request): Json<BookSlotRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking = service
        .book_slot(
            request.doctor_id,
            request.patient_id,
            request.date,
            request.start_time,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get_booking(
    State(service): State<Arc<SchedulingService>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = service.get_booking(booking_id).await?;
    Ok(Json(booking.into()))
}

pub async fn cancel_booking(
    State(service): State<Arc<SchedulingService>>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = service.cancel_booking(booking_id, request.reason).await?;
    Ok(Json(booking.into()))
}

pub async fn confirm_booking(
    State(service): State<Arc<SchedulingService>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = service.confirm_booking(booking_id).await?;
    Ok(Json(booking.into()))
}
