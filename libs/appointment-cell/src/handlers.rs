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

use crate::models::{
    AppointmentListParams, BookAppointmentRequest, CreatePrescriptionRequest, PageParams,
    SettlePaymentRequest, UpdateAppointmentStatusRequest,
};
use crate::services::{AppointmentLifecycleService, BookingCoordinator, PrescriptionService};

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &[ROLE_PATIENT])?;

    let booked = BookingCoordinator::new(&state)
        .create_appointment(require_email(&user)?, &request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Appointment booked successfully",
            "data": booked
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(params): Query<AppointmentListParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT])?;
    require_email(&user)?;

    let page = AppointmentLifecycleService::new(&state)
        .list_for_caller(&user, params.into_query())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointments retrieved successfully",
        "meta": page.meta,
        "data": page.data
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentLifecycleService::new(&state)
        .update_status(appointment_id, request.status, &user)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment status updated successfully",
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn settle_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<SettlePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN])?;

    let appointment = AppointmentLifecycleService::new(&state)
        .settle_payment(appointment_id, request.gateway_reference.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment settled successfully",
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;

    let prescription = PrescriptionService::new(&state)
        .create_prescription(require_email(&user)?, &request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Prescription created successfully",
            "data": prescription
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_my_prescriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_PATIENT])?;

    let page = PrescriptionService::new(&state)
        .list_for_patient(require_email(&user)?, (&params).into())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescriptions retrieved successfully",
        "meta": page.meta,
        "data": page.data
    })))
}
