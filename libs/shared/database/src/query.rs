use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentSortBy, AppointmentStatus, PaymentStatus};
use shared_models::pagination::{Pagination, SortOrder};
use shared_models::schedule::{DoctorSlotBinding, Slot, SlotSortBy};

/// Filters for the slot catalog. Bounds are inclusive: `start >= start_from`, `end <= end_until`.
#[derive(Debug, Clone, Default)]
pub struct SlotQuery {
    pub start_from: Option<DateTime<Utc>>,
    pub end_until: Option<DateTime<Utc>>,
    /// Hide slots this doctor is already bound to.
    pub exclude_bound_to: Option<Uuid>,
    pub sort_by: SlotSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl SlotQuery {
    pub fn matches_window(&self, slot: &Slot) -> bool {
        self.start_from.map_or(true, |from| slot.start_date_time >= from)
            && self.end_until.map_or(true, |until| slot.end_date_time <= until)
    }
}

/// Filters over one doctor's bindings.
#[derive(Debug, Clone)]
pub struct ScheduleQuery {
    pub doctor_id: Uuid,
    pub start_from: Option<DateTime<Utc>>,
    pub end_until: Option<DateTime<Utc>>,
    pub is_booked: Option<bool>,
    pub sort_by: SlotSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl ScheduleQuery {
    pub fn for_doctor(doctor_id: Uuid) -> Self {
        Self {
            doctor_id,
            start_from: None,
            end_until: None,
            is_booked: None,
            sort_by: SlotSortBy::StartDateTime,
            sort_order: SortOrder::Asc,
            pagination: Pagination::default(),
        }
    }

    pub fn matches(&self, binding: &DoctorSlotBinding, slot: &Slot) -> bool {
        binding.doctor_id == self.doctor_id
            && self.is_booked.map_or(true, |booked| binding.is_booked == booked)
            && self.start_from.map_or(true, |from| slot.start_date_time >= from)
            && self.end_until.map_or(true, |until| slot.end_date_time <= until)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub sort_by: AppointmentSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.payment_status.map_or(true, |status| appointment.payment_status == status)
    }
}
