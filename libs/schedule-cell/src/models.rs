use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::pagination::{Pagination, PaginationOptions, SortOrder};
use shared_models::schedule::SlotSortBy;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Admin request to open slots: every day in `start_date..=end_date`, between
/// `start_time` and `end_time` (UTC, `HH:MM`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
}

/// A parsed and validated generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleWindow {
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotListParams {
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub sort_by: Option<SlotSortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SlotListParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::from(&PaginationOptions {
            page: self.page,
            limit: self.limit,
        })
    }
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schedule not found")]
    SlotNotFound,

    #[error("Schedule is booked by a doctor and cannot be removed")]
    SlotInUse,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ScheduleError> for AppError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::SlotNotFound => AppError::NotFound(error.to_string()),
            ScheduleError::SlotInUse => AppError::Conflict(error.to_string()),
            ScheduleError::Store(e) => e.into(),
        }
    }
}
