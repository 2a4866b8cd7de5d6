use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fixed-width interval of calendar time eligible for booking.
/// The range is half-open: `[start_date_time, end_date_time)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Slot {
    pub fn new(start_date_time: DateTime<Utc>, end_date_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_date_time,
            end_date_time,
            created_at: Utc::now(),
        }
    }

    pub fn width(&self) -> Duration {
        self.end_date_time - self.start_date_time
    }
}

/// Makes a generic slot bookable under one doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorSlotBinding {
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
    pub is_booked: bool,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DoctorSlotBinding {
    pub fn new(doctor_id: Uuid, slot_id: Uuid) -> Self {
        Self {
            doctor_id,
            slot_id,
            is_booked: false,
            appointment_id: None,
            created_at: Utc::now(),
        }
    }
}

/// A binding together with the slot it points at, as listed to doctors and patients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorSchedule {
    #[serde(flatten)]
    pub binding: DoctorSlotBinding,
    pub slot: Slot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotSortBy {
    #[default]
    StartDateTime,
    EndDateTime,
    CreatedAt,
}

impl SlotSortBy {
    pub fn column(&self) -> &'static str {
        match self {
            SlotSortBy::StartDateTime => "start_date_time",
            SlotSortBy::EndDateTime => "end_date_time",
            SlotSortBy::CreatedAt => "created_at",
        }
    }

    pub fn key(&self, slot: &Slot) -> DateTime<Utc> {
        match self {
            SlotSortBy::StartDateTime => slot.start_date_time,
            SlotSortBy::EndDateTime => slot.end_date_time,
            SlotSortBy::CreatedAt => slot.created_at,
        }
    }
}
