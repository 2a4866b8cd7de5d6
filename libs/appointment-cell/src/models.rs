use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{AppointmentQuery, StoreError};
use shared_models::appointment::{AppointmentSortBy, AppointmentStatus, PaymentStatus};
use shared_models::error::AppError;
use shared_models::pagination::{Pagination, PaginationOptions, SortOrder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub schedule_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

/// Confirmation forwarded by the payment collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlePaymentRequest {
    pub gateway_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub appointment_id: Uuid,
    pub instructions: String,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListParams {
    pub status: Option<AppointmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub sort_by: Option<AppointmentSortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AppointmentListParams {
    /// Newest first unless the caller picks an order.
    pub fn into_query(self) -> AppointmentQuery {
        AppointmentQuery {
            status: self.status,
            payment_status: self.payment_status,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or(SortOrder::Desc),
            pagination: Pagination::from(&PaginationOptions {
                page: self.page,
                limit: self.limit,
            }),
            ..AppointmentQuery::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<&PageParams> for Pagination {
    fn from(params: &PageParams) -> Self {
        Pagination::from(&PaginationOptions {
            page: params.page,
            limit: params.limit,
        })
    }
}

/// Outcome of one unpaid sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub reclaimed: Vec<Uuid>,
    pub released_bindings: u64,
    pub deleted_payments: u64,
    pub deleted_prescriptions: u64,
    pub deleted_reviews: u64,
}

impl ReclaimReport {
    pub fn is_empty(&self) -> bool {
        self.reclaimed.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("Cancelled appointments cannot be paid")]
    PaymentOnCancelled,

    #[error("Prescription requires a completed appointment")]
    NotCompleted,

    #[error("Prescription already exists for this appointment")]
    PrescriptionExists,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound | AppointmentError::PatientNotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(error.to_string())
            }
            AppointmentError::SlotNotAvailable
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::PaymentOnCancelled
            | AppointmentError::NotCompleted
            | AppointmentError::PrescriptionExists => AppError::Conflict(error.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Store(e) => e.into(),
        }
    }
}
