use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use doctor_cell::models::DoctorScheduleError;
use doctor_cell::services::AvailabilityService;
use shared_database::{ClinicStore, InMemoryStore, ScheduleQuery};
use shared_models::people::Doctor;
use shared_models::schedule::Slot;

async fn seed_slots(store: &InMemoryStore, count: i64) -> Vec<Slot> {
    let base = Utc.with_ymd_and_hms(2030, 6, 3, 9, 0, 0).unwrap();
    let mut tx = store.begin().await.unwrap();
    let mut slots = Vec::new();
    for i in 0..count {
        let start = base + Duration::minutes(30 * i);
        slots.push(tx.insert_slot_if_absent(start, start + Duration::minutes(30)).await.unwrap().unwrap());
    }
    tx.commit().await.unwrap();
    slots
}

async fn setup() -> (Arc<InMemoryStore>, AvailabilityService, Doctor, Vec<Slot>) {
    let store = Arc::new(InMemoryStore::new());
    let doctor = Doctor::new("Dr. Grace", "grace@clinic.test", 80.0);
    store.seed_doctor(doctor.clone()).await;
    let slots = seed_slots(&store, 4).await;
    let service = AvailabilityService::with_store(store.clone());
    (store, service, doctor, slots)
}

#[tokio::test]
async fn binding_starts_free_and_is_unique() {
    let (_, service, doctor, slots) = setup().await;

    let binding = service.bind_doctor_to_slot(doctor.id, slots[0].id).await.unwrap();
    assert!(!binding.is_booked);
    assert_eq!(binding.appointment_id, None);

    assert_matches!(
        service.bind_doctor_to_slot(doctor.id, slots[0].id).await,
        Err(DoctorScheduleError::AlreadyBound)
    );
}

#[tokio::test]
async fn binding_requires_slot_and_active_doctor() {
    let (store, service, doctor, slots) = setup().await;

    assert_matches!(
        service.bind_doctor_to_slot(doctor.id, Uuid::new_v4()).await,
        Err(DoctorScheduleError::SlotNotFound)
    );
    assert_matches!(
        service.bind_doctor_to_slot(Uuid::new_v4(), slots[0].id).await,
        Err(DoctorScheduleError::DoctorNotFound)
    );

    let mut retired = Doctor::new("Dr. Gone", "gone@clinic.test", 10.0);
    retired.is_deleted = true;
    store.seed_doctor(retired.clone()).await;
    assert_matches!(
        service.bind_doctor_to_slot(retired.id, slots[0].id).await,
        Err(DoctorScheduleError::DoctorNotFound)
    );
    assert_matches!(
        service.resolve_doctor("gone@clinic.test").await,
        Err(DoctorScheduleError::DoctorNotFound)
    );
}

#[tokio::test]
async fn available_slots_hide_booked_bindings() {
    let (store, service, doctor, slots) = setup().await;
    for slot in &slots {
        service.bind_doctor_to_slot(doctor.id, slot.id).await.unwrap();
    }
    let mut tx = store.begin().await.unwrap();
    tx.mark_binding_booked(doctor.id, slots[1].id, Uuid::new_v4()).await.unwrap();
    tx.commit().await.unwrap();

    let available = service.list_available_slots(ScheduleQuery::for_doctor(doctor.id)).await.unwrap();
    assert_eq!(available.meta.total, 3);
    assert!(available.data.iter().all(|s| !s.binding.is_booked));
    assert_eq!(available.data[0].slot.id, slots[0].id);
    assert_eq!(available.data[1].slot.id, slots[2].id);

    let mut windowed = ScheduleQuery::for_doctor(doctor.id);
    windowed.start_from = Some(slots[2].start_date_time);
    let late = service.list_available_slots(windowed).await.unwrap();
    assert_eq!(late.meta.total, 2);

    let mut booked_only = ScheduleQuery::for_doctor(doctor.id);
    booked_only.is_booked = Some(true);
    let mine = service.list_my_schedule(booked_only).await.unwrap();
    assert_eq!(mine.meta.total, 1);
    assert_eq!(mine.data[0].slot.id, slots[1].id);

    let everything = service.list_my_schedule(ScheduleQuery::for_doctor(doctor.id)).await.unwrap();
    assert_eq!(everything.meta.total, 4);
}

#[tokio::test]
async fn unbind_refuses_booked_binding() {
    let (store, service, doctor, slots) = setup().await;
    service.bind_doctor_to_slot(doctor.id, slots[0].id).await.unwrap();
    service.bind_doctor_to_slot(doctor.id, slots[1].id).await.unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.mark_binding_booked(doctor.id, slots[1].id, Uuid::new_v4()).await.unwrap();
    tx.commit().await.unwrap();

    service.unbind(doctor.id, slots[0].id).await.unwrap();
    assert!(store.find_binding(doctor.id, slots[0].id).await.unwrap().is_none());

    assert_matches!(service.unbind(doctor.id, slots[1].id).await, Err(DoctorScheduleError::BindingBooked));
    assert_matches!(service.unbind(doctor.id, slots[0].id).await, Err(DoctorScheduleError::BindingNotFound));
}
