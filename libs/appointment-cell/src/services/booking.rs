use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::{AppState, ClinicStore};
use shared_models::appointment::{Appointment, AppointmentStatus, BookedAppointment, Payment, PaymentStatus};
use shared_models::people::Doctor;

use crate::models::{AppointmentError, BookAppointmentRequest};

const TRANSACTION_SUFFIX_LEN: usize = 8;

/// Builds a payment transaction id from a prefix and the booking time.
pub type TransactionIdGenerator = fn(&str, DateTime<Utc>) -> String;

/// `<prefix><year>-<month0>-<weekday>-<hour>-<minute>-<suffix>`. The random
/// suffix keeps two bookings in the same minute apart.
pub fn generate_transaction_id(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TRANSACTION_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!(
        "{}{}-{}-{}-{}-{}-{}",
        prefix,
        at.year(),
        at.month0(),
        at.weekday().num_days_from_sunday(),
        at.hour(),
        at.minute(),
        suffix
    )
}

/// Turns a free doctor binding into an appointment with a pending payment.
pub struct BookingCoordinator {
    store: Arc<dyn ClinicStore>,
    config: SchedulingConfig,
    transaction_ids: TransactionIdGenerator,
}

impl BookingCoordinator {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), state.config.scheduling.clone())
    }

    pub fn with_store(store: Arc<dyn ClinicStore>, config: SchedulingConfig) -> Self {
        Self {
            store,
            config,
            transaction_ids: generate_transaction_id,
        }
    }

    pub fn with_transaction_ids(mut self, generator: TransactionIdGenerator) -> Self {
        self.transaction_ids = generator;
        self
    }

    async fn bookable_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        match self.store.find_doctor(doctor_id).await? {
            Some(doctor) if !doctor.is_deleted => Ok(doctor),
            _ => Err(AppointmentError::DoctorNotFound),
        }
    }

    /// Books `request.schedule_id` with `request.doctor_id` for the patient
    /// behind `patient_email`. The appointment, the binding flip and the
    /// payment row commit together or not at all.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, schedule_id = %request.schedule_id))]
    pub async fn create_appointment(
        &self,
        patient_email: &str,
        request: &BookAppointmentRequest,
    ) -> Result<BookedAppointment, AppointmentError> {
        let patient = self
            .store
            .find_patient_by_email(patient_email)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;
        let doctor = self.bookable_doctor(request.doctor_id).await?;

        match self.store.find_binding(doctor.id, request.schedule_id).await? {
            Some(binding) if !binding.is_booked => {}
            _ => return Err(AppointmentError::SlotNotAvailable),
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            slot_id: request.schedule_id,
            status: AppointmentStatus::Scheduled,
            payment_status: PaymentStatus::Unpaid,
            video_calling_id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;

        // The pre-check above ran unlocked; only this read decides.
        match tx.lock_binding(doctor.id, request.schedule_id).await? {
            Some(binding) if !binding.is_booked => {}
            _ => {
                warn!("Slot {} was taken while booking", request.schedule_id);
                return Err(AppointmentError::SlotNotAvailable);
            }
        }

        tx.insert_appointment(&appointment).await?;
        tx.mark_binding_booked(doctor.id, request.schedule_id, appointment.id).await?;

        let payment = Payment {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            amount: doctor.appointment_fee,
            transaction_id: (self.transaction_ids)(&self.config.payment_transaction_prefix, now),
            status: PaymentStatus::Unpaid,
            gateway_reference: None,
            created_at: now,
            updated_at: now,
        };
        debug!("Recording payment {} for appointment {}", payment.transaction_id, appointment.id);
        tx.insert_payment(&payment).await?;

        tx.commit().await?;

        info!(
            "Appointment {} booked: patient {} with doctor {} in slot {}",
            appointment.id, patient.id, doctor.id, request.schedule_id
        );
        Ok(BookedAppointment { appointment, payment })
    }
}
