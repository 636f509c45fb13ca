// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::scheduling::SchedulingService;

pub fn scheduling_routes(service: Arc<SchedulingService>) -> Router {
    Router::new()
        .route("/slots", get(handlers::get_available_slots))
        .route("/bookings", post(handlers::book_slot))
        .route("/bookings/{booking_id}", get(handlers::get_booking))
        .route("/bookings/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/bookings/{booking_id}/confirm", post(handlers::confirm_booking))
        .with_state(service)
}
