use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, ScheduleQuery, StoreError};
use shared_models::pagination::Page;
use shared_models::people::Doctor;
use shared_models::schedule::{DoctorSchedule, DoctorSlotBinding};

use crate::models::DoctorScheduleError;

/// Which slots a doctor has opted into, and whether each is booked.
pub struct AvailabilityService {
    store: Arc<dyn ClinicStore>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Resolves the doctor record behind a verified caller.
    pub async fn resolve_doctor(&self, email: &str) -> Result<Doctor, DoctorScheduleError> {
        match self.store.find_doctor_by_email(email).await? {
            Some(doctor) if !doctor.is_deleted => Ok(doctor),
            _ => Err(DoctorScheduleError::DoctorNotFound),
        }
    }

    async fn active_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorScheduleError> {
        match self.store.find_doctor(doctor_id).await? {
            Some(doctor) if !doctor.is_deleted => Ok(doctor),
            _ => Err(DoctorScheduleError::DoctorNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn bind_doctor_to_slot(
        &self,
        doctor_id: Uuid,
        schedule_id: Uuid,
    ) -> Result<DoctorSlotBinding, DoctorScheduleError> {
        self.store
            .find_slot(schedule_id)
            .await?
            .ok_or(DoctorScheduleError::SlotNotFound)?;
        self.active_doctor(doctor_id).await?;

        let mut tx = self.store.begin().await?;
        let binding = match tx.insert_binding(doctor_id, schedule_id).await {
            Ok(binding) => binding,
            Err(StoreError::UniqueViolation(_)) => return Err(DoctorScheduleError::AlreadyBound),
            Err(StoreError::RowNotFound(_)) => return Err(DoctorScheduleError::SlotNotFound),
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        info!("Doctor {} bound to slot {}", doctor_id, schedule_id);
        Ok(binding)
    }

    /// Free bindings of the doctor, slot start ascending unless asked otherwise.
    pub async fn list_available_slots(
        &self,
        mut query: ScheduleQuery,
    ) -> Result<Page<DoctorSchedule>, DoctorScheduleError> {
        self.active_doctor(query.doctor_id).await?;
        query.is_booked = Some(false);
        let page = self.store.list_doctor_schedules(&query).await?;
        debug!("Doctor {} has {} free slots", query.doctor_id, page.meta.total);
        Ok(page)
    }

    pub async fn list_my_schedule(&self, query: ScheduleQuery) -> Result<Page<DoctorSchedule>, DoctorScheduleError> {
        Ok(self.store.list_doctor_schedules(&query).await?)
    }

    /// Withdraws the doctor from a slot nobody has booked yet.
    pub async fn unbind(&self, doctor_id: Uuid, schedule_id: Uuid) -> Result<DoctorSlotBinding, DoctorScheduleError> {
        let mut tx = self.store.begin().await?;
        let binding = tx
            .lock_binding(doctor_id, schedule_id)
            .await?
            .ok_or(DoctorScheduleError::BindingNotFound)?;
        if binding.is_booked {
            warn!("Doctor {} tried to withdraw from booked slot {}", doctor_id, schedule_id);
            return Err(DoctorScheduleError::BindingBooked);
        }
        tx.delete_binding(doctor_id, schedule_id).await?;
        tx.commit().await?;

        info!("Doctor {} withdrew from slot {}", doctor_id, schedule_id);
        Ok(binding)
    }
}
