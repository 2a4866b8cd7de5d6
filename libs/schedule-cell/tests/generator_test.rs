use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};

use schedule_cell::models::{CreateScheduleRequest, ScheduleError};
use schedule_cell::services::generator::SLOT_INTERVAL_MINUTES;
use schedule_cell::services::{SlotCatalog, SlotGenerator};
use shared_config::SchedulingConfig;
use shared_database::{ClinicStore, InMemoryStore, SlotQuery};
use shared_models::people::Doctor;

fn request(start_date: &str, end_date: &str, start_time: &str, end_time: &str) -> CreateScheduleRequest {
    CreateScheduleRequest {
        start_date: start_date.to_string(),
        end_date: end_date.to_string(),
        start_time: start_time.to_string(),
        end_time: end_time.to_string(),
    }
}

fn setup() -> (Arc<InMemoryStore>, SlotGenerator) {
    let store = Arc::new(InMemoryStore::new());
    let generator = SlotGenerator::with_store(store.clone(), SchedulingConfig::default());
    (store, generator)
}

#[tokio::test]
async fn every_generated_slot_is_one_interval_wide() {
    let (_, generator) = setup();

    let slots = generator
        .generate_slots(&request("2030-03-04", "2030-03-06", "08:00", "12:00"))
        .await
        .unwrap();

    assert_eq!(slots.len(), 3 * 8);
    assert!(slots.iter().all(|slot| slot.width() == Duration::minutes(SLOT_INTERVAL_MINUTES)));
    assert!(slots.windows(2).all(|pair| pair[0].start_date_time < pair[1].start_date_time));
}

#[tokio::test]
async fn trailing_partial_interval_is_dropped() {
    let (_, generator) = setup();

    let slots = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:00", "09:45"))
        .await
        .unwrap();

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start_date_time, Utc.with_ymd_and_hms(2030, 3, 4, 9, 0, 0).unwrap());
    assert_eq!(slots[0].end_date_time, Utc.with_ymd_and_hms(2030, 3, 4, 9, 30, 0).unwrap());
}

#[tokio::test]
async fn overlapping_regeneration_creates_no_duplicates() {
    let (store, generator) = setup();

    let first = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:00", "11:00"))
        .await
        .unwrap();
    let second = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "10:00", "12:00"))
        .await
        .unwrap();

    assert_eq!(first.len(), 4);
    // 10:00 and 10:30 already exist.
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].start_date_time, Utc.with_ymd_and_hms(2030, 3, 4, 11, 0, 0).unwrap());

    let stored = store.list_slots(&SlotQuery::default()).await.unwrap();
    assert_eq!(stored.meta.total, 6);

    let again = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:00", "12:00"))
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn invalid_window_writes_nothing() {
    let (store, generator) = setup();

    let result = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "11:00", "09:00"))
        .await;

    assert_matches!(result, Err(ScheduleError::Validation(_)));
    assert_eq!(store.list_slots(&SlotQuery::default()).await.unwrap().meta.total, 0);
}

#[tokio::test]
async fn list_slots_filters_window_and_excludes_bound() {
    let (store, generator) = setup();
    let slots = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:00", "11:00"))
        .await
        .unwrap();

    let doctor = Doctor::new("Dr. Ada", "ada@clinic.test", 50.0);
    store.seed_doctor(doctor.clone()).await;
    let mut tx = store.begin().await.unwrap();
    tx.insert_binding(doctor.id, slots[0].id).await.unwrap();
    tx.commit().await.unwrap();

    let catalog = SlotCatalog::with_store(store.clone());
    let unbound = catalog
        .list_slots(&SlotQuery {
            exclude_bound_to: Some(doctor.id),
            ..SlotQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(unbound.meta.total, 3);
    assert!(unbound.data.iter().all(|slot| slot.id != slots[0].id));

    let late = catalog
        .list_slots(&SlotQuery {
            start_from: Some(Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap()),
            ..SlotQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(late.meta.total, 2);
}

#[tokio::test]
async fn delete_slot_removes_free_bindings_and_refuses_booked() {
    let (store, generator) = setup();
    let slots = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:00", "10:00"))
        .await
        .unwrap();
    let doctor = Doctor::new("Dr. Ada", "ada@clinic.test", 50.0);
    store.seed_doctor(doctor.clone()).await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_binding(doctor.id, slots[0].id).await.unwrap();
    tx.insert_binding(doctor.id, slots[1].id).await.unwrap();
    tx.mark_binding_booked(doctor.id, slots[1].id, uuid::Uuid::new_v4()).await.unwrap();
    tx.commit().await.unwrap();

    let catalog = SlotCatalog::with_store(store.clone());

    catalog.delete_slot(slots[0].id).await.unwrap();
    assert!(store.find_slot(slots[0].id).await.unwrap().is_none());
    assert!(store.find_binding(doctor.id, slots[0].id).await.unwrap().is_none());

    assert_matches!(catalog.delete_slot(slots[1].id).await, Err(ScheduleError::SlotInUse));
    assert!(store.find_slot(slots[1].id).await.unwrap().is_some());

    assert_matches!(catalog.delete_slot(slots[0].id).await, Err(ScheduleError::SlotNotFound));
}

#[tokio::test]
async fn shifted_window_never_overlaps_stored_slots() {
    let (store, generator) = setup();
    generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:00", "10:00"))
        .await
        .unwrap();

    let created = generator
        .generate_slots(&request("2030-03-04", "2030-03-04", "09:15", "10:45"))
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].start_date_time, Utc.with_ymd_and_hms(2030, 3, 4, 10, 15, 0).unwrap());

    let all = store.list_slots(&SlotQuery::default()).await.unwrap().data;
    assert_eq!(all.len(), 3);
    assert!(all
        .windows(2)
        .all(|pair| pair[0].end_date_time <= pair[1].start_date_time));
}
