mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use appointment_cell::services::{AppointmentLifecycleService, UnpaidReclaimer};
use shared_config::SchedulingConfig;
use shared_database::{AppointmentQuery, ClinicStore};
use shared_models::appointment::{AppointmentStatus, Prescription, Review};
use uuid::Uuid;

use common::Clinic;

fn reclaimer(clinic: &Clinic) -> UnpaidReclaimer {
    UnpaidReclaimer::with_store(clinic.dyn_store(), &SchedulingConfig::default())
}

#[tokio::test]
async fn stale_unpaid_appointments_are_reclaimed() {
    let clinic = Clinic::new().await;
    let stale = clinic.book(0).await;
    let id = stale.appointment.id;
    clinic
        .store
        .seed_review(Review {
            id: Uuid::new_v4(),
            appointment_id: id,
            doctor_id: clinic.doctor.id,
            patient_id: clinic.patient.id,
            rating: 2.0,
            comment: Some("never showed".to_string()),
            created_at: Utc::now(),
        })
        .await;
    let mut tx = clinic.store.begin().await.unwrap();
    tx.insert_prescription(&Prescription {
        id: Uuid::new_v4(),
        appointment_id: id,
        doctor_id: clinic.doctor.id,
        patient_id: clinic.patient.id,
        instructions: "none".to_string(),
        follow_up_date: None,
        created_at: Utc::now(),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let report = reclaimer(&clinic)
        .sweep_at(Utc::now() + Duration::minutes(31))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.reclaimed, vec![id]);
    assert_eq!(report.released_bindings, 1);
    assert_eq!(report.deleted_payments, 1);
    assert_eq!(report.deleted_prescriptions, 1);
    assert_eq!(report.deleted_reviews, 1);

    assert!(clinic.store.find_appointment(id).await.unwrap().is_none());
    assert!(clinic.store.find_payment(id).await.unwrap().is_none());
    assert!(clinic.store.find_prescription(id).await.unwrap().is_none());
    assert!(clinic.store.find_review(id).await.unwrap().is_none());

    let binding = clinic
        .store
        .find_binding(clinic.doctor.id, clinic.slots[0].id)
        .await
        .unwrap()
        .unwrap();
    assert!(!binding.is_booked);
    assert_eq!(binding.appointment_id, None);
}

#[tokio::test]
async fn young_and_paid_appointments_are_untouched() {
    let clinic = Clinic::new().await;
    let young = clinic.book(0).await;
    let paid = clinic.book(1).await;
    AppointmentLifecycleService::with_store(clinic.dyn_store())
        .settle_payment(paid.appointment.id, None)
        .await
        .unwrap();

    let sweeper = reclaimer(&clinic);

    let report = sweeper.sweep_at(Utc::now() + Duration::minutes(5)).await.unwrap().unwrap();
    assert!(report.is_empty());
    assert!(clinic.store.find_appointment(young.appointment.id).await.unwrap().is_some());

    let report = sweeper.sweep_at(Utc::now() + Duration::hours(2)).await.unwrap().unwrap();
    assert_eq!(report.reclaimed, vec![young.appointment.id]);
    assert!(clinic.store.find_appointment(paid.appointment.id).await.unwrap().is_some());
    let binding = clinic
        .store
        .find_binding(clinic.doctor.id, clinic.slots[1].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(binding.appointment_id, Some(paid.appointment.id));
}

#[tokio::test]
async fn reclaim_only_releases_the_binding_it_held() {
    let clinic = Clinic::new().await;
    let lifecycle = AppointmentLifecycleService::with_store(clinic.dyn_store());
    let abandoned = clinic.book(0).await;

    // Cancelling frees the slot; a paying patient takes it before the sweep.
    lifecycle
        .update_status(abandoned.appointment.id, AppointmentStatus::Cancelled, &common::admin())
        .await
        .unwrap();
    let rebooked = clinic.book(0).await;
    lifecycle.settle_payment(rebooked.appointment.id, None).await.unwrap();

    let report = reclaimer(&clinic)
        .sweep_at(Utc::now() + Duration::minutes(31))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.reclaimed, vec![abandoned.appointment.id]);
    assert_eq!(report.released_bindings, 0);

    let binding = clinic
        .store
        .find_binding(clinic.doctor.id, clinic.slots[0].id)
        .await
        .unwrap()
        .unwrap();
    assert!(binding.is_booked);
    assert_eq!(binding.appointment_id, Some(rebooked.appointment.id));

    let remaining = clinic.store.list_appointments(&AppointmentQuery::default()).await.unwrap();
    assert_eq!(remaining.meta.total, 1);
}

#[tokio::test]
async fn overlapping_sweep_is_skipped() {
    let clinic = Clinic::new().await;
    clinic.book(0).await;
    let sweeper = reclaimer(&clinic);
    let later = Utc::now() + Duration::hours(1);

    // An open transaction parks the first sweep on the store.
    let held = clinic.store.begin().await.unwrap();

    let (first, second) = tokio::join!(sweeper.sweep_at(later), async {
        tokio::task::yield_now().await;
        let outcome = sweeper.sweep_at(later).await;
        drop(held);
        outcome
    });

    assert_eq!(second.unwrap(), None);
    assert_eq!(first.unwrap().unwrap().reclaimed.len(), 1);
}

#[tokio::test]
async fn spawned_reclaimer_sweeps_and_shuts_down() {
    let clinic = Clinic::new().await;
    let booked = clinic.book(0).await;
    let config = SchedulingConfig {
        unpaid_grace_minutes: 0,
        reclaim_interval_seconds: 1,
        ..SchedulingConfig::default()
    };
    let handle = Arc::new(UnpaidReclaimer::with_store(clinic.dyn_store(), &config)).spawn();

    let mut reclaimed = false;
    for _ in 0..200 {
        if clinic.store.find_appointment(booked.appointment.id).await.unwrap().is_none() {
            reclaimed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.shutdown().await;

    assert!(reclaimed);
}

#[tokio::test]
async fn shutdown_waits_for_the_running_sweep() {
    let clinic = Clinic::new().await;
    let booked = clinic.book(0).await;
    let config = SchedulingConfig {
        unpaid_grace_minutes: 0,
        reclaim_interval_seconds: 60,
        ..SchedulingConfig::default()
    };

    // The first tick fires at once and its sweep parks behind this transaction.
    let held = clinic.store.begin().await.unwrap();
    let handle = Arc::new(UnpaidReclaimer::with_store(clinic.dyn_store(), &config)).spawn();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut shutdown = tokio::spawn(handle.shutdown());
    assert!(tokio::time::timeout(std::time::Duration::from_millis(50), &mut shutdown)
        .await
        .is_err());

    drop(held);
    shutdown.await.unwrap();

    assert!(clinic.store.find_appointment(booked.appointment.id).await.unwrap().is_none());
}
