use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, StoreError};
use shared_models::appointment::{AppointmentStatus, Prescription};
use shared_models::pagination::{Page, Pagination};

use crate::models::{AppointmentError, CreatePrescriptionRequest};

pub struct PrescriptionService {
    store: Arc<dyn ClinicStore>,
}

impl PrescriptionService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// A doctor writes one prescription per completed appointment of theirs.
    #[instrument(skip(self, request), fields(appointment_id = %request.appointment_id))]
    pub async fn create_prescription(
        &self,
        doctor_email: &str,
        request: &CreatePrescriptionRequest,
    ) -> Result<Prescription, AppointmentError> {
        if request.instructions.trim().is_empty() {
            return Err(AppointmentError::Validation("instructions must not be empty".to_string()));
        }

        let doctor = self
            .store
            .find_doctor_by_email(doctor_email)
            .await?
            .filter(|d| !d.is_deleted)
            .ok_or(AppointmentError::DoctorNotFound)?;

        let mut tx = self.store.begin().await?;
        // Locked until commit.
        let appointment = tx
            .lock_appointment(request.appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.doctor_id != doctor.id {
            return Err(AppointmentError::Forbidden("This is not your appointment".to_string()));
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(AppointmentError::NotCompleted);
        }

        let prescription = Prescription {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            instructions: request.instructions.trim().to_string(),
            follow_up_date: request.follow_up_date,
            created_at: Utc::now(),
        };

        match tx.insert_prescription(&prescription).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => return Err(AppointmentError::PrescriptionExists),
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!("Prescription {} written for appointment {}", prescription.id, appointment.id);
        Ok(prescription)
    }

    pub async fn list_for_patient(
        &self,
        patient_email: &str,
        pagination: Pagination,
    ) -> Result<Page<Prescription>, AppointmentError> {
        let patient = self
            .store
            .find_patient_by_email(patient_email)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;
        Ok(self.store.list_patient_prescriptions(patient.id, pagination).await?)
    }
}
