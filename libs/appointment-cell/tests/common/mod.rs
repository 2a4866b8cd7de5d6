#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use appointment_cell::models::BookAppointmentRequest;
use appointment_cell::services::BookingCoordinator;
use shared_config::SchedulingConfig;
use shared_database::{ClinicStore, InMemoryStore};
use shared_models::appointment::BookedAppointment;
use shared_models::auth::User;
use shared_models::people::{Doctor, Patient};
use shared_models::schedule::Slot;
use shared_utils::test_utils::TestUser;

pub const DOCTOR_EMAIL: &str = "house@clinic.test";
pub const OTHER_DOCTOR_EMAIL: &str = "wilson@clinic.test";
pub const PATIENT_EMAIL: &str = "patient@clinic.test";
pub const OTHER_PATIENT_EMAIL: &str = "second@clinic.test";
pub const FEE: f64 = 75.0;

/// One doctor bound to four consecutive slots, a second unbound doctor and
/// two patients.
pub struct Clinic {
    pub store: Arc<InMemoryStore>,
    pub doctor: Doctor,
    pub other_doctor: Doctor,
    pub patient: Patient,
    pub other_patient: Patient,
    pub slots: Vec<Slot>,
}

impl Clinic {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let doctor = Doctor::new("Dr. House", DOCTOR_EMAIL, FEE);
        let other_doctor = Doctor::new("Dr. Wilson", OTHER_DOCTOR_EMAIL, 60.0);
        let patient = Patient::new("Pat", PATIENT_EMAIL);
        let other_patient = Patient::new("Sam", OTHER_PATIENT_EMAIL);
        store.seed_doctor(doctor.clone()).await;
        store.seed_doctor(other_doctor.clone()).await;
        store.seed_patient(patient.clone()).await;
        store.seed_patient(other_patient.clone()).await;

        let base = Utc.with_ymd_and_hms(2030, 9, 2, 9, 0, 0).unwrap();
        let mut tx = store.begin().await.unwrap();
        let mut slots = Vec::new();
        for i in 0..4 {
            let start = base + Duration::minutes(30 * i);
            let slot = tx
                .insert_slot_if_absent(start, start + Duration::minutes(30))
                .await
                .unwrap()
                .unwrap();
            tx.insert_binding(doctor.id, slot.id).await.unwrap();
            slots.push(slot);
        }
        tx.commit().await.unwrap();

        Self {
            store,
            doctor,
            other_doctor,
            patient,
            other_patient,
            slots,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn ClinicStore> {
        self.store.clone()
    }

    pub fn booking(&self) -> BookingCoordinator {
        BookingCoordinator::with_store(self.dyn_store(), SchedulingConfig::default())
    }

    pub fn request(&self, slot: usize) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: self.doctor.id,
            schedule_id: self.slots[slot].id,
        }
    }

    pub async fn book(&self, slot: usize) -> BookedAppointment {
        self.booking()
            .create_appointment(PATIENT_EMAIL, &self.request(slot))
            .await
            .unwrap()
    }
}

pub fn admin() -> User {
    TestUser::admin("admin@clinic.test").to_user()
}

pub fn doctor_user(email: &str) -> User {
    TestUser::doctor(email).to_user()
}

pub fn patient_user(email: &str) -> User {
    TestUser::patient(email).to_user()
}
