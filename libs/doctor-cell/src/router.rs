use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_schedule_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_doctor_schedule))
        .route("/my-schedule", get(handlers::get_my_schedule))
        .route("/{schedule_id}", delete(handlers::delete_doctor_schedule))
        .route("/doctors/{doctor_id}/available", get(handlers::get_available_slots))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
