use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::BookingService;
use availability_cell::handlers::AvailabilityState;
use availability_cell::router::availability_routes;
use availability_cell::AvailabilityService;
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    availability: Arc<AvailabilityService>,
    booking: Arc<BookingService>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest(
            "/availability",
            availability_routes(AvailabilityState {
                config: config.clone(),
                service: availability,
            }),
        )
        .nest("/appointments", appointment_routes(AppointmentState { config, booking }))
}
