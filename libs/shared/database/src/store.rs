use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::{Appointment, AppointmentStatus, Payment, PaymentStatus, Prescription, Review};
use shared_models::pagination::{Page, Pagination};
use shared_models::people::{Doctor, Patient};
use shared_models::schedule::{DoctorSchedule, DoctorSlotBinding, Slot};

use crate::error::StoreError;
use crate::memory::InMemoryStore;
use crate::postgres::PgStore;
use crate::query::{AppointmentQuery, ScheduleQuery, SlotQuery};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Repository over the clinic's relational tables.
///
/// Reads here run outside any transaction. Every write goes through a
/// [`StoreTransaction`] obtained from [`ClinicStore::begin`]. A task holding an
/// open transaction must not call back into the store's plain reads.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    async fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<Patient>>;
    async fn find_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>>;
    async fn find_doctor_by_email(&self, email: &str) -> StoreResult<Option<Doctor>>;

    async fn find_slot(&self, slot_id: Uuid) -> StoreResult<Option<Slot>>;
    async fn list_slots(&self, query: &SlotQuery) -> StoreResult<Page<Slot>>;

    async fn find_binding(&self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<Option<DoctorSlotBinding>>;
    async fn list_doctor_schedules(&self, query: &ScheduleQuery) -> StoreResult<Page<DoctorSchedule>>;

    async fn find_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>>;
    async fn list_appointments(&self, query: &AppointmentQuery) -> StoreResult<Page<Appointment>>;
    /// Unpaid appointments created at or before `cutoff`.
    async fn find_stale_unpaid(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Appointment>>;

    async fn find_payment(&self, appointment_id: Uuid) -> StoreResult<Option<Payment>>;
    async fn find_prescription(&self, appointment_id: Uuid) -> StoreResult<Option<Prescription>>;
    async fn find_review(&self, appointment_id: Uuid) -> StoreResult<Option<Review>>;
    async fn list_patient_prescriptions(&self, patient_id: Uuid, pagination: Pagination) -> StoreResult<Page<Prescription>>;
}

/// A scoped unit of work. Nothing is visible to other callers until
/// [`StoreTransaction::commit`]; dropping the handle without committing rolls
/// every write back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Inserts the slot unless a stored slot overlaps `[start, end)`.
    async fn insert_slot_if_absent(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Option<Slot>>;
    async fn delete_slot(&mut self, slot_id: Uuid) -> StoreResult<bool>;

    async fn insert_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<DoctorSlotBinding>;
    /// Reads the binding and holds it against concurrent writers until the transaction ends.
    async fn lock_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<Option<DoctorSlotBinding>>;
    async fn lock_slot_bindings(&mut self, slot_id: Uuid) -> StoreResult<Vec<DoctorSlotBinding>>;
    async fn delete_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<bool>;
    async fn mark_binding_booked(&mut self, doctor_id: Uuid, slot_id: Uuid, appointment_id: Uuid) -> StoreResult<()>;
    /// Frees the binding only while it still references `appointment_id`.
    async fn release_binding(&mut self, doctor_id: Uuid, slot_id: Uuid, appointment_id: Uuid) -> StoreResult<bool>;

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()>;
    async fn lock_appointment(&mut self, appointment_id: Uuid) -> StoreResult<Option<Appointment>>;
    async fn update_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Appointment>;
    /// Sets the payment flag on the appointment and the status of its payment row together.
    async fn update_payment_status(
        &mut self,
        appointment_id: Uuid,
        status: PaymentStatus,
        gateway_reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<Appointment>;
    /// Locks the given appointments that are still unpaid; paid ones are left out.
    async fn lock_unpaid_appointments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<Vec<Appointment>>;

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()>;
    async fn insert_prescription(&mut self, prescription: &Prescription) -> StoreResult<()>;

    async fn delete_prescriptions(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64>;
    async fn delete_reviews(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64>;
    async fn delete_payments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64>;
    async fn delete_appointments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Picks the backing store from configuration: Postgres when `DATABASE_URL`
/// is set, the in-memory store otherwise.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn ClinicStore>> {
    if config.uses_postgres() {
        let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
        store.migrate().await?;
        info!("Connected to Postgres store");
        Ok(Arc::new(store))
    } else {
        info!("Using in-memory store");
        Ok(Arc::new(InMemoryStore::new()))
    }
}
