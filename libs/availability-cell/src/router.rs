use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AvailabilityState};

pub fn availability_routes(state: AvailabilityState) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}", get(handlers::get_availability))
        .route("/{doctor_id}/slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/{doctor_id}/schedule", put(handlers::update_schedule))
        .route(
            "/{doctor_id}/unavailable",
            post(handlers::set_unavailable_dates).delete(handlers::remove_unavailable_dates),
        )
        .route("/{doctor_id}/custom-day", put(handlers::set_custom_day))
        .route_layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
