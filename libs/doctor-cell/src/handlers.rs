use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::{User, ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT};
use shared_models::error::AppError;
use shared_utils::extractor::{require_email, require_role};

use crate::models::{CreateDoctorScheduleRequest, ScheduleFilterParams};
use crate::services::AvailabilityService;

#[axum::debug_handler]
pub async fn create_doctor_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;

    let service = AvailabilityService::new(&state);
    let doctor = service.resolve_doctor(require_email(&user)?).await?;
    let binding = service.bind_doctor_to_slot(doctor.id, request.schedule_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Doctor schedule created successfully",
            "data": binding
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_my_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(params): Query<ScheduleFilterParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;

    let service = AvailabilityService::new(&state);
    let doctor = service.resolve_doctor(require_email(&user)?).await?;
    let page = service.list_my_schedule(params.into_query(doctor.id)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "My schedules retrieved successfully",
        "meta": page.meta,
        "data": page.data
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;

    let service = AvailabilityService::new(&state);
    let doctor = service.resolve_doctor(require_email(&user)?).await?;
    let binding = service.unbind(doctor.id, schedule_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor schedule deleted successfully",
        "data": binding
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(params): Query<ScheduleFilterParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT])?;

    let page = AvailabilityService::new(&state)
        .list_available_slots(params.into_query(doctor_id))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Available slots retrieved successfully",
        "meta": page.meta,
        "data": page.data
    })))
}
