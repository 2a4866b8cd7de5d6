use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/my-appointments", get(handlers::get_my_appointments))
        .route("/{appointment_id}", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/settle", post(handlers::settle_payment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn prescription_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_prescription))
        .route("/my-prescriptions", get(handlers::get_my_prescriptions))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
