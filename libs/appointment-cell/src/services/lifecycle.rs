use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppState, AppointmentQuery, ClinicStore};
use shared_models::appointment::{Appointment, AppointmentStatus, PaymentStatus};
use shared_models::auth::User;
use shared_models::pagination::Page;

use crate::models::AppointmentError;

/// Status changes, cancellation side effects and payment settlement.
pub struct AppointmentLifecycleService {
    store: Arc<dyn ClinicStore>,
}

impl AppointmentLifecycleService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    pub fn get_valid_transitions(current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Scheduled => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn validate_status_transition(
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !Self::get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }
        Ok(())
    }

    /// Administrators may act on any appointment, doctors only on their own.
    async fn authorize(&self, actor: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
        if actor.is_admin() {
            return Ok(());
        }
        if !actor.is_doctor() {
            return Err(AppointmentError::Forbidden(
                "Only doctors and administrators can change appointment status".to_string(),
            ));
        }

        let email = actor.email.as_deref().unwrap_or_default();
        match self.store.find_doctor_by_email(email).await? {
            Some(doctor) if !doctor.is_deleted && doctor.id == appointment.doctor_id => Ok(()),
            _ => Err(AppointmentError::Forbidden("This is not your appointment".to_string())),
        }
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        if !actor.is_admin() && !actor.is_doctor() {
            return Err(AppointmentError::Forbidden(
                "Only doctors and administrators can change appointment status".to_string(),
            ));
        }

        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        self.authorize(actor, &appointment).await?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        Self::validate_status_transition(current.status, new_status)?;

        let updated = tx.update_appointment_status(appointment_id, new_status, Utc::now()).await?;

        if new_status == AppointmentStatus::Cancelled {
            let released = tx
                .release_binding(current.doctor_id, current.slot_id, current.id)
                .await?;
            let ids = [current.id];
            let prescriptions = tx.delete_prescriptions(&ids).await?;
            let reviews = tx.delete_reviews(&ids).await?;
            debug!(
                "Cancellation of {} released binding: {}, dropped {} prescriptions and {} reviews",
                appointment_id, released, prescriptions, reviews
            );
        }

        tx.commit().await?;

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, new_status);
        Ok(updated)
    }

    /// Marks the appointment and its payment paid. Repeated confirmations are
    /// no-ops.
    #[instrument(skip(self))]
    pub async fn settle_payment(
        &self,
        appointment_id: Uuid,
        gateway_reference: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let mut tx = self.store.begin().await?;
        let appointment = tx
            .lock_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::PaymentOnCancelled);
        }
        if appointment.payment_status == PaymentStatus::Paid {
            debug!("Appointment {} already paid", appointment_id);
            return Ok(appointment);
        }

        let updated = tx
            .update_payment_status(appointment_id, PaymentStatus::Paid, gateway_reference, Utc::now())
            .await?;
        tx.commit().await?;

        info!("Payment settled for appointment {}", appointment_id);
        Ok(updated)
    }

    /// Appointments visible to the caller: patients see theirs, doctors see
    /// theirs, administrators see all.
    pub async fn list_for_caller(
        &self,
        caller: &User,
        mut query: AppointmentQuery,
    ) -> Result<Page<Appointment>, AppointmentError> {
        if caller.is_patient() {
            let email = caller.email.as_deref().unwrap_or_default();
            let patient = self
                .store
                .find_patient_by_email(email)
                .await?
                .ok_or(AppointmentError::PatientNotFound)?;
            query.patient_id = Some(patient.id);
        } else if caller.is_doctor() {
            let email = caller.email.as_deref().unwrap_or_default();
            let doctor = self
                .store
                .find_doctor_by_email(email)
                .await?
                .ok_or(AppointmentError::DoctorNotFound)?;
            query.doctor_id = Some(doctor.id);
        } else if !caller.is_admin() {
            return Err(AppointmentError::Forbidden("Unknown role".to_string()));
        }

        Ok(self.store.list_appointments(&query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn only_scheduled_appointments_move() {
        use AppointmentStatus::*;

        assert!(AppointmentLifecycleService::validate_status_transition(Scheduled, Completed).is_ok());
        assert!(AppointmentLifecycleService::validate_status_transition(Scheduled, Cancelled).is_ok());

        for (from, to) in [
            (Scheduled, Scheduled),
            (Completed, Cancelled),
            (Completed, Scheduled),
            (Cancelled, Scheduled),
            (Cancelled, Completed),
        ] {
            assert_matches!(
                AppointmentLifecycleService::validate_status_transition(from, to),
                Err(AppointmentError::InvalidStatusTransition { .. })
            );
        }
    }
}
