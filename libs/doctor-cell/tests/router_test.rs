use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use doctor_cell::router::doctor_schedule_routes;
use shared_database::{AppState, ClinicStore, InMemoryStore};
use shared_models::people::Doctor;
use shared_models::schedule::Slot;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn create_test_app() -> (Router, Arc<InMemoryStore>, TestConfig, Doctor, Slot) {
    let config = TestConfig::default();
    let (state, store) = AppState::in_memory(config.to_arc());

    let doctor = Doctor::new("Dr. Grace", "grace@clinic.test", 80.0);
    store.seed_doctor(doctor.clone()).await;
    let start = Utc.with_ymd_and_hms(2030, 6, 3, 9, 0, 0).unwrap();
    let mut tx = store.begin().await.unwrap();
    let slot = tx
        .insert_slot_if_absent(start, start + Duration::minutes(30))
        .await
        .unwrap()
        .unwrap();
    tx.commit().await.unwrap();

    (doctor_schedule_routes(Arc::new(state)), store, config, doctor, slot)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn bind_request(auth: String, schedule_id: uuid::Uuid) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "schedule_id": schedule_id }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn doctor_binds_and_sees_schedule() {
    let (app, _, config, doctor, slot) = create_test_app().await;
    let caller = TestUser::doctor("grace@clinic.test");

    let response = app
        .clone()
        .oneshot(bind_request(JwtTestUtils::bearer(&caller, &config), slot.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["doctor_id"], doctor.id.to_string());
    assert_eq!(json["data"]["is_booked"], false);

    let response = app
        .clone()
        .oneshot(bind_request(JwtTestUtils::bearer(&caller, &config), slot.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let request = Request::builder()
        .method("GET")
        .uri("/my-schedule?is_booked=false")
        .header(header::AUTHORIZATION, JwtTestUtils::bearer(&caller, &config))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["meta"]["total"], 1);
    assert_eq!(json["data"][0]["slot"]["id"], slot.id.to_string());
}

#[tokio::test]
async fn patient_cannot_bind_but_can_browse_availability() {
    let (app, _, config, doctor, slot) = create_test_app().await;
    let patient = TestUser::patient("pat@clinic.test");
    let caller = TestUser::doctor("grace@clinic.test");

    let response = app
        .clone()
        .oneshot(bind_request(JwtTestUtils::bearer(&patient, &config), slot.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.clone()
        .oneshot(bind_request(JwtTestUtils::bearer(&caller, &config), slot.id))
        .await
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/doctors/{}/available", doctor.id))
        .header(header::AUTHORIZATION, JwtTestUtils::bearer(&patient, &config))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["meta"]["total"], 1);
}

#[tokio::test]
async fn doctor_withdraws_free_binding() {
    let (app, store, config, doctor, slot) = create_test_app().await;
    let caller = TestUser::doctor("grace@clinic.test");

    app.clone()
        .oneshot(bind_request(JwtTestUtils::bearer(&caller, &config), slot.id))
        .await
        .unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/{}", slot.id))
        .header(header::AUTHORIZATION, JwtTestUtils::bearer(&caller, &config))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.find_binding(doctor.id, slot.id).await.unwrap().is_none());
}
