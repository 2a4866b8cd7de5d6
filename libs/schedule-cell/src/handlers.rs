use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::{AppState, SlotQuery};
use shared_models::auth::{User, ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT};
use shared_models::error::AppError;
use shared_utils::extractor::{require_email, require_role};

use crate::models::{CreateScheduleRequest, SlotListParams};
use crate::services::{SlotCatalog, SlotGenerator};

#[axum::debug_handler]
pub async fn create_schedules(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &[ROLE_ADMIN])?;

    let slots = SlotGenerator::new(&state).generate_slots(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Schedules created successfully",
            "data": slots
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(params): Query<SlotListParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN, ROLE_DOCTOR])?;

    // Doctors browse the slots they have not opted into yet.
    let exclude_bound_to = if user.is_doctor() {
        let doctor = state
            .store
            .find_doctor_by_email(require_email(&user)?)
            .await?
            .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;
        Some(doctor.id)
    } else {
        None
    };

    let query = SlotQuery {
        start_from: params.start_date_time,
        end_until: params.end_date_time,
        exclude_bound_to,
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params.sort_order.unwrap_or_default(),
        pagination: params.pagination(),
    };
    let page = SlotCatalog::new(&state).list_slots(&query).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedules retrieved successfully",
        "meta": page.meta,
        "data": page.data
    })))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT])?;

    let slot = SlotCatalog::new(&state).get_slot(schedule_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule retrieved successfully",
        "data": slot
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN])?;

    let slot = SlotCatalog::new(&state).delete_slot(schedule_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule deleted successfully",
        "data": slot
    })))
}
