use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{appointment_routes, prescription_routes};
use doctor_cell::router::doctor_schedule_routes;
use schedule_cell::router::schedule_routes;
use shared_database::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Scheduling API is running!" }))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/doctor-schedules", doctor_schedule_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state))
}
