//! REST surface tests
//!
//! Drives the axum router directly with tower's oneshot, backed by the
//! programmable mock backend, and checks the engine-to-HTTP error mapping.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use fwmp_common::events::EventBus;
use fwmp_common::models::{TaskImages, TaskStatus};
use fwmp_tf::api::{create_router, AppState};
use fwmp_tf::catalog::CatalogManager;
use fwmp_tf::task::SessionManager;
use helpers::*;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn router_for(mock: &Arc<MockBackend>) -> axum::Router {
    let events = EventBus::new(64);
    let sessions = Arc::new(SessionManager::new(
        mock.clone(),
        mock.clone(),
        mock.clone(),
        mock.clone(),
        events.clone(),
    ));
    let catalogs = Arc::new(CatalogManager::new(mock.clone(), mock.clone(), events.clone()));
    create_router(AppState {
        sessions,
        catalogs,
        events,
        port: 0,
    })
}

fn task_id(mock: &Arc<MockBackend>) -> Uuid {
    mock.task.lock().unwrap().as_ref().unwrap().id
}

fn multipart_image(field_name: &str) -> (String, Vec<u8>) {
    let boundary = "fwmp-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field_name}\"; \
             filename=\"site.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (
        format!("multipart/form-data; boundary={boundary}"),
        body,
    )
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_the_module() {
    let mock = MockBackend::new(task_detail(
        vec![],
        TaskImages::default(),
        vec![],
        TaskStatus::InProgress,
    ));
    let app = router_for(&mock);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fwmp-tf");
}

#[tokio::test]
async fn load_task_returns_slots_and_completion() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(2))],
        TaskImages {
            before: vec![server_media("https://s.example/b.jpg")],
            after: vec![],
        },
        vec![],
        TaskStatus::InProgress,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/load"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "in-progress");
    assert_eq!(body["completion"]["total_slots"], 2);
    assert_eq!(body["completion"]["before_count"], 1);
    assert_eq!(body["slots"][0]["before"]["state"], "uploaded");
    assert_eq!(body["slots"][1]["before"]["state"], "empty");
}

#[tokio::test]
async fn upload_endpoint_fulfills_a_slot_and_conflicts_when_occupied() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages::default(),
        vec![],
        TaskStatus::InProgress,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);
    let (content_type, body) = multipart_image("file");

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/slots/0/0/before/upload"))
                .header(header::CONTENT_TYPE, content_type.clone())
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    assert_eq!(first["media"]["existing"], true);

    // The slot now holds media; a second upload maps to 409
    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/slots/0/0/before/upload"))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unsupported_media_maps_to_415() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages::default(),
        vec![],
        TaskStatus::InProgress,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);

    let boundary = "fwmp-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
         filename=\"notes.pdf\"\r\nContent-Type: application/pdf\r\n\r\nhello\r\n--{boundary}--\r\n"
    );
    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/slots/0/0/before/upload"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn invalid_phase_maps_to_400() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages::default(),
        vec![],
        TaskStatus::InProgress,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);
    let (content_type, body) = multipart_image("file");

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/slots/0/0/during/upload"))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn close_drops_the_session_and_reload_works() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages::default(),
        vec![],
        TaskStatus::InProgress,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/load"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/close"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "closed");

    // A fresh load builds a new session from the reader
    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/load"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn confirm_without_armed_delete_maps_to_409() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages::default(),
        vec![],
        TaskStatus::InProgress,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/delete/confirm"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn denied_location_maps_to_403() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages::default(),
        vec![],
        TaskStatus::Assigned,
    ));
    let id = task_id(&mock);
    let app = router_for(&mock);

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/tasks/{id}/start"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"location_denied":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Location permission denied");
}
