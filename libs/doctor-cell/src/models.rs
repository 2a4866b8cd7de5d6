use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{ScheduleQuery, StoreError};
use shared_models::error::AppError;
use shared_models::pagination::{Pagination, PaginationOptions, SortOrder};
use shared_models::schedule::SlotSortBy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorScheduleRequest {
    pub schedule_id: Uuid,
}

/// Query string of the schedule listings. Window bounds apply to the slot:
/// `start_date_time >= start`, `end_date_time <= end`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleFilterParams {
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub is_booked: Option<bool>,
    pub sort_by: Option<SlotSortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ScheduleFilterParams {
    pub fn into_query(self, doctor_id: Uuid) -> ScheduleQuery {
        let pagination = Pagination::from(&PaginationOptions {
            page: self.page,
            limit: self.limit,
        });
        ScheduleQuery {
            doctor_id,
            start_from: self.start_date_time,
            end_until: self.end_date_time,
            is_booked: self.is_booked,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
            pagination,
        }
    }
}

#[derive(Error, Debug)]
pub enum DoctorScheduleError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Schedule not found")]
    SlotNotFound,

    #[error("Doctor schedule not found")]
    BindingNotFound,

    #[error("Doctor is already assigned to this schedule")]
    AlreadyBound,

    #[error("Booked schedules cannot be removed")]
    BindingBooked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DoctorScheduleError> for AppError {
    fn from(error: DoctorScheduleError) -> Self {
        match error {
            DoctorScheduleError::DoctorNotFound
            | DoctorScheduleError::SlotNotFound
            | DoctorScheduleError::BindingNotFound => AppError::NotFound(error.to_string()),
            DoctorScheduleError::AlreadyBound | DoctorScheduleError::BindingBooked => {
                AppError::Conflict(error.to_string())
            }
            DoctorScheduleError::Store(e) => e.into(),
        }
    }
}
