use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: AppointmentState) -> Router {
    let public_routes = Router::new()
        .route("/availability/{doctor_id}", get(handlers::get_doctor_availability));

    let protected_routes = Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/patient/{patient_id}", get(handlers::get_patient_appointments))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::cancel_appointment),
        )
        .route_layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
