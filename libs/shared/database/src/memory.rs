use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus, Payment, PaymentStatus, Prescription, Review};
use shared_models::pagination::{Page, Pagination, SortOrder};
use shared_models::people::{Doctor, Patient};
use shared_models::schedule::{DoctorSchedule, DoctorSlotBinding, Slot};

use crate::error::StoreError;
use crate::query::{AppointmentQuery, ScheduleQuery, SlotQuery};
use crate::store::{ClinicStore, StoreResult, StoreTransaction};

#[derive(Debug, Default, Clone)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    slots: HashMap<Uuid, Slot>,
    slot_ranges: BTreeMap<(DateTime<Utc>, DateTime<Utc>), Uuid>,
    bindings: BTreeMap<(Uuid, Uuid), DoctorSlotBinding>,
    appointments: HashMap<Uuid, Appointment>,
    // Child rows are keyed by appointment id, which keeps them 1:1.
    payments: HashMap<Uuid, Payment>,
    prescriptions: HashMap<Uuid, Prescription>,
    reviews: HashMap<Uuid, Review>,
}

/// Process-local store. One mutex guards every table; a transaction owns the
/// guard for its whole lifetime, so transactions run strictly one at a time.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_doctor(&self, doctor: Doctor) {
        self.tables.lock().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn seed_patient(&self, patient: Patient) {
        self.tables.lock().await.patients.insert(patient.id, patient);
    }

    /// Reviews are written by the review surface; this stands in for it.
    pub async fn seed_review(&self, review: Review) {
        self.tables.lock().await.reviews.insert(review.appointment_id, review);
    }
}

fn order<T, K: Ord>(items: &mut [T], sort_order: SortOrder, key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| {
        let ordering = key(a).cmp(&key(b));
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = (*guard).clone();
        debug!("In-memory transaction opened");
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<Patient>> {
        let tables = self.tables.lock().await;
        Ok(tables.patients.values().find(|p| p.email == email && !p.is_deleted).cloned())
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        Ok(self.tables.lock().await.doctors.get(&doctor_id).cloned())
    }

    async fn find_doctor_by_email(&self, email: &str) -> StoreResult<Option<Doctor>> {
        let tables = self.tables.lock().await;
        Ok(tables.doctors.values().find(|d| d.email == email).cloned())
    }

    async fn find_slot(&self, slot_id: Uuid) -> StoreResult<Option<Slot>> {
        Ok(self.tables.lock().await.slots.get(&slot_id).cloned())
    }

    async fn list_slots(&self, query: &SlotQuery) -> StoreResult<Page<Slot>> {
        let tables = self.tables.lock().await;
        let mut slots: Vec<Slot> = tables
            .slots
            .values()
            .filter(|slot| query.matches_window(slot))
            .filter(|slot| match query.exclude_bound_to {
                Some(doctor_id) => !tables.bindings.contains_key(&(doctor_id, slot.id)),
                None => true,
            })
            .cloned()
            .collect();
        order(&mut slots, query.sort_order, |slot| (query.sort_by.key(slot), slot.id));
        Ok(Page::from_sorted(query.pagination, slots))
    }

    async fn find_binding(&self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<Option<DoctorSlotBinding>> {
        Ok(self.tables.lock().await.bindings.get(&(doctor_id, slot_id)).cloned())
    }

    async fn list_doctor_schedules(&self, query: &ScheduleQuery) -> StoreResult<Page<DoctorSchedule>> {
        let tables = self.tables.lock().await;
        let mut schedules: Vec<DoctorSchedule> = tables
            .bindings
            .values()
            .filter_map(|binding| {
                let slot = tables.slots.get(&binding.slot_id)?;
                query.matches(binding, slot).then(|| DoctorSchedule {
                    binding: binding.clone(),
                    slot: slot.clone(),
                })
            })
            .collect();
        order(&mut schedules, query.sort_order, |s| (query.sort_by.key(&s.slot), s.slot.id));
        Ok(Page::from_sorted(query.pagination, schedules))
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.tables.lock().await.appointments.get(&appointment_id).cloned())
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> StoreResult<Page<Appointment>> {
        let tables = self.tables.lock().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        order(&mut appointments, query.sort_order, |a| (query.sort_by.key(a), a.id));
        Ok(Page::from_sorted(query.pagination, appointments))
    }

    async fn find_stale_unpaid(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| a.payment_status == PaymentStatus::Unpaid && a.created_at <= cutoff)
            .cloned()
            .collect())
    }

    async fn find_payment(&self, appointment_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.tables.lock().await.payments.get(&appointment_id).cloned())
    }

    async fn find_prescription(&self, appointment_id: Uuid) -> StoreResult<Option<Prescription>> {
        Ok(self.tables.lock().await.prescriptions.get(&appointment_id).cloned())
    }

    async fn find_review(&self, appointment_id: Uuid) -> StoreResult<Option<Review>> {
        Ok(self.tables.lock().await.reviews.get(&appointment_id).cloned())
    }

    async fn list_patient_prescriptions(&self, patient_id: Uuid, pagination: Pagination) -> StoreResult<Page<Prescription>> {
        let tables = self.tables.lock().await;
        let mut prescriptions: Vec<Prescription> = tables
            .prescriptions
            .values()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect();
        order(&mut prescriptions, SortOrder::Desc, |p| (p.created_at, p.id));
        Ok(Page::from_sorted(pagination, prescriptions))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl MemoryTransaction {
    fn appointment_mut(&mut self, appointment_id: Uuid) -> StoreResult<&mut Appointment> {
        self.staged
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("appointment {}", appointment_id)))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_slot_if_absent(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Option<Slot>> {
        // Stored ranges are disjoint, so only the latest one starting before `end` can overlap.
        if let Some(((_, last_end), _)) = self.staged.slot_ranges.range(..(end, end)).next_back() {
            if *last_end > start {
                return Ok(None);
            }
        }
        let slot = Slot::new(start, end);
        self.staged.slot_ranges.insert((start, end), slot.id);
        self.staged.slots.insert(slot.id, slot.clone());
        Ok(Some(slot))
    }

    async fn delete_slot(&mut self, slot_id: Uuid) -> StoreResult<bool> {
        if self.staged.bindings.keys().any(|(_, bound_slot)| *bound_slot == slot_id) {
            return Err(StoreError::StillReferenced(format!("slot {} has doctor bindings", slot_id)));
        }
        if self.staged.appointments.values().any(|a| a.slot_id == slot_id) {
            return Err(StoreError::StillReferenced(format!("slot {} has appointments", slot_id)));
        }
        match self.staged.slots.remove(&slot_id) {
            Some(slot) => {
                self.staged.slot_ranges.remove(&(slot.start_date_time, slot.end_date_time));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<DoctorSlotBinding> {
        if !self.staged.slots.contains_key(&slot_id) {
            return Err(StoreError::RowNotFound(format!("slot {}", slot_id)));
        }
        if self.staged.bindings.contains_key(&(doctor_id, slot_id)) {
            return Err(StoreError::UniqueViolation(format!(
                "doctor_schedules ({}, {}) already exists",
                doctor_id, slot_id
            )));
        }
        let binding = DoctorSlotBinding::new(doctor_id, slot_id);
        self.staged.bindings.insert((doctor_id, slot_id), binding.clone());
        Ok(binding)
    }

    async fn lock_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<Option<DoctorSlotBinding>> {
        Ok(self.staged.bindings.get(&(doctor_id, slot_id)).cloned())
    }

    async fn lock_slot_bindings(&mut self, slot_id: Uuid) -> StoreResult<Vec<DoctorSlotBinding>> {
        Ok(self
            .staged
            .bindings
            .values()
            .filter(|b| b.slot_id == slot_id)
            .cloned()
            .collect())
    }

    async fn delete_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<bool> {
        Ok(self.staged.bindings.remove(&(doctor_id, slot_id)).is_some())
    }

    async fn mark_binding_booked(&mut self, doctor_id: Uuid, slot_id: Uuid, appointment_id: Uuid) -> StoreResult<()> {
        let binding = self
            .staged
            .bindings
            .get_mut(&(doctor_id, slot_id))
            .ok_or_else(|| StoreError::RowNotFound(format!("doctor_schedules ({}, {})", doctor_id, slot_id)))?;
        binding.is_booked = true;
        binding.appointment_id = Some(appointment_id);
        Ok(())
    }

    async fn release_binding(&mut self, doctor_id: Uuid, slot_id: Uuid, appointment_id: Uuid) -> StoreResult<bool> {
        match self.staged.bindings.get_mut(&(doctor_id, slot_id)) {
            Some(binding) if binding.appointment_id == Some(appointment_id) => {
                binding.is_booked = false;
                binding.appointment_id = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()> {
        if self.staged.appointments.contains_key(&appointment.id) {
            return Err(StoreError::UniqueViolation(format!("appointment {}", appointment.id)));
        }
        self.staged.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn lock_appointment(&mut self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.staged.appointments.get(&appointment_id).cloned())
    }

    async fn update_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        let appointment = self.appointment_mut(appointment_id)?;
        appointment.status = status;
        appointment.updated_at = at;
        Ok(appointment.clone())
    }

    async fn update_payment_status(
        &mut self,
        appointment_id: Uuid,
        status: PaymentStatus,
        gateway_reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        let payment = self
            .staged
            .payments
            .get_mut(&appointment_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("payment for appointment {}", appointment_id)))?;
        payment.status = status;
        payment.updated_at = at;
        if let Some(reference) = gateway_reference {
            payment.gateway_reference = Some(reference.to_string());
        }

        let appointment = self.appointment_mut(appointment_id)?;
        appointment.payment_status = status;
        appointment.updated_at = at;
        Ok(appointment.clone())
    }

    async fn lock_unpaid_appointments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<Vec<Appointment>> {
        Ok(appointment_ids
            .iter()
            .filter_map(|id| self.staged.appointments.get(id))
            .filter(|a| a.payment_status == PaymentStatus::Unpaid)
            .cloned()
            .collect())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        if !self.staged.appointments.contains_key(&payment.appointment_id) {
            return Err(StoreError::RowNotFound(format!("appointment {}", payment.appointment_id)));
        }
        if self.staged.payments.contains_key(&payment.appointment_id) {
            return Err(StoreError::UniqueViolation(format!(
                "payment for appointment {} already exists",
                payment.appointment_id
            )));
        }
        if self.staged.payments.values().any(|p| p.transaction_id == payment.transaction_id) {
            return Err(StoreError::UniqueViolation(format!(
                "payment transaction id {} already exists",
                payment.transaction_id
            )));
        }
        self.staged.payments.insert(payment.appointment_id, payment.clone());
        Ok(())
    }

    async fn insert_prescription(&mut self, prescription: &Prescription) -> StoreResult<()> {
        if !self.staged.appointments.contains_key(&prescription.appointment_id) {
            return Err(StoreError::RowNotFound(format!("appointment {}", prescription.appointment_id)));
        }
        if self.staged.prescriptions.contains_key(&prescription.appointment_id) {
            return Err(StoreError::UniqueViolation(format!(
                "prescription for appointment {} already exists",
                prescription.appointment_id
            )));
        }
        self.staged.prescriptions.insert(prescription.appointment_id, prescription.clone());
        Ok(())
    }

    async fn delete_prescriptions(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        Ok(appointment_ids
            .iter()
            .filter(|id| self.staged.prescriptions.remove(*id).is_some())
            .count() as u64)
    }

    async fn delete_reviews(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        Ok(appointment_ids
            .iter()
            .filter(|id| self.staged.reviews.remove(*id).is_some())
            .count() as u64)
    }

    async fn delete_payments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        Ok(appointment_ids
            .iter()
            .filter(|id| self.staged.payments.remove(*id).is_some())
            .count() as u64)
    }

    async fn delete_appointments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        for id in appointment_ids {
            let referenced = self.staged.payments.contains_key(id)
                || self.staged.prescriptions.contains_key(id)
                || self.staged.reviews.contains_key(id)
                || self.staged.bindings.values().any(|b| b.appointment_id == Some(*id));
            if referenced {
                return Err(StoreError::StillReferenced(format!("appointment {}", id)));
            }
        }
        Ok(appointment_ids
            .iter()
            .filter(|id| self.staged.appointments.remove(*id).is_some())
            .count() as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        debug!("In-memory transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            let slot = tx.insert_slot_if_absent(nine_am(), nine_am() + Duration::minutes(30)).await.unwrap();
            assert!(slot.is_some());
        }
        let page = store.list_slots(&SlotQuery::default()).await.unwrap();
        assert_eq!(page.meta.total, 0);
    }

    #[tokio::test]
    async fn committed_slot_is_visible_and_range_is_unique() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_slot_if_absent(nine_am(), nine_am() + Duration::minutes(30)).await.unwrap();
        let again = tx.insert_slot_if_absent(nine_am(), nine_am() + Duration::minutes(30)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(first.is_some());
        assert!(again.is_none());
        assert_eq!(store.list_slots(&SlotQuery::default()).await.unwrap().meta.total, 1);
    }

    #[tokio::test]
    async fn duplicate_binding_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let doctor_id = Uuid::new_v4();
        let mut tx = store.begin().await.unwrap();
        let slot = tx
            .insert_slot_if_absent(nine_am(), nine_am() + Duration::minutes(30))
            .await
            .unwrap()
            .unwrap();
        tx.insert_binding(doctor_id, slot.id).await.unwrap();
        assert_matches!(tx.insert_binding(doctor_id, slot.id).await, Err(StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn prescription_needs_an_existing_appointment() {
        let store = InMemoryStore::new();
        let appointment_id = Uuid::new_v4();
        let mut tx = store.begin().await.unwrap();
        let result = tx
            .insert_prescription(&Prescription {
                id: Uuid::new_v4(),
                appointment_id,
                doctor_id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(),
                instructions: "Rest".to_string(),
                follow_up_date: None,
                created_at: nine_am(),
            })
            .await;
        assert_matches!(result, Err(StoreError::RowNotFound(_)));
    }

    #[tokio::test]
    async fn overlapping_range_is_skipped() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_slot_if_absent(nine_am(), nine_am() + Duration::minutes(30)).await.unwrap().is_some());
        let shifted = nine_am() + Duration::minutes(15);
        assert!(tx.insert_slot_if_absent(shifted, shifted + Duration::minutes(30)).await.unwrap().is_none());
        let wider = nine_am() - Duration::minutes(30);
        assert!(tx.insert_slot_if_absent(wider, wider + Duration::minutes(45)).await.unwrap().is_none());
        let adjacent = nine_am() + Duration::minutes(30);
        assert!(tx.insert_slot_if_absent(adjacent, adjacent + Duration::minutes(30)).await.unwrap().is_some());
    }
}
