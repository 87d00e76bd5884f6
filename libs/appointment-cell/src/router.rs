// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Core booking and lifecycle
        .route("/", post(handlers::book_appointment))
        .route("/search", get(handlers::search_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}/check-in", post(handlers::check_in_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        // Listings and reporting
        .route("/today", get(handlers::today_appointments))
        .route("/upcoming", get(handlers::upcoming_appointments))
        .route("/statistics", get(handlers::appointment_statistics))
        .route("/patients/{patient_ref}", get(handlers::get_patient_appointments))
        .route(
            "/patients/{patient_ref}/upcoming",
            get(handlers::get_patient_upcoming_appointments),
        )
        // Admin utilities
        .route("/sample-data", post(handlers::generate_sample_data))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
