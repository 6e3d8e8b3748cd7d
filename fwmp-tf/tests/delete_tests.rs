//! Deletion orchestration tests
//!
//! Two-phase arm/confirm flow, precondition checks, and bit-for-bit
//! rollback of failed deletes.

mod helpers;

use fwmp_common::models::{Phase, SlotKey, TaskImages, TaskStatus};
use fwmp_tf::clients::{EntityType, ResourceKind};
use fwmp_tf::error::Error;
use fwmp_tf::fulfillment::store::SlotMediaState;
use helpers::*;
use std::sync::atomic::Ordering;

fn seeded_mock() -> std::sync::Arc<MockBackend> {
    MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages {
            before: vec![server_media("https://s.example/existing.jpg")],
            after: vec![],
        },
        vec![],
        TaskStatus::InProgress,
    ))
}

#[tokio::test]
async fn armed_delete_confirms_and_empties_the_slot() {
    let mock = seeded_mock();
    let (session, _events) = load_session(&mock).await;
    let slot = SlotKey::new(0, 0);

    // Arming has no slot-state side effects
    session.request_delete(slot, Phase::Before).await.unwrap();
    assert!(session
        .slot_state(slot, Phase::Before)
        .await
        .unwrap()
        .is_uploaded());
    assert_eq!(mock.delete_calls.load(Ordering::SeqCst), 0);

    session.confirm_delete().await.unwrap();
    assert_eq!(
        session.slot_state(slot, Phase::Before).await.unwrap(),
        SlotMediaState::Empty
    );
    assert_eq!(mock.delete_calls.load(Ordering::SeqCst), 1);

    // The request carried the stored media identity
    let requests = mock.delete_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].entity_type, EntityType::Task);
    assert_eq!(requests[0].resource_kind, ResourceKind::Media);
    assert!(requests[0].image_id.is_some());
    assert_eq!(requests[0].delete_token.as_deref(), Some("server-tok"));
}

#[tokio::test]
async fn empty_slot_has_nothing_to_delete() {
    let mock = seeded_mock();
    let (session, _events) = load_session(&mock).await;

    let err = session
        .request_delete(SlotKey::new(0, 0), Phase::After)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NothingToDelete { .. }));
    assert_eq!(mock.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirm_without_arming_is_rejected() {
    let mock = seeded_mock();
    let (session, _events) = load_session(&mock).await;

    let err = session.confirm_delete().await.unwrap_err();
    assert!(matches!(err, Error::NotArmed));
    assert_eq!(mock.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_disarms_the_staged_delete() {
    let mock = seeded_mock();
    let (session, _events) = load_session(&mock).await;
    let slot = SlotKey::new(0, 0);

    session.request_delete(slot, Phase::Before).await.unwrap();
    assert!(session.cancel_delete().await);
    assert!(session.armed_delete().await.is_none());

    let err = session.confirm_delete().await.unwrap_err();
    assert!(matches!(err, Error::NotArmed));
    assert!(session
        .slot_state(slot, Phase::Before)
        .await
        .unwrap()
        .is_uploaded());
}

#[tokio::test]
async fn second_request_replaces_the_armed_target() {
    let mock = MockBackend::new(task_detail(
        vec![reference(Some(1))],
        TaskImages {
            before: vec![server_media("https://s.example/b.jpg")],
            after: vec![server_media("https://s.example/a.jpg")],
        },
        vec![],
        TaskStatus::InProgress,
    ));
    let (session, _events) = load_session(&mock).await;
    let slot = SlotKey::new(0, 0);

    session.request_delete(slot, Phase::Before).await.unwrap();
    session.request_delete(slot, Phase::After).await.unwrap();

    session.confirm_delete().await.unwrap();

    // The after phase was deleted; before is untouched
    assert_eq!(
        session.slot_state(slot, Phase::After).await.unwrap(),
        SlotMediaState::Empty
    );
    assert!(session
        .slot_state(slot, Phase::Before)
        .await
        .unwrap()
        .is_uploaded());
}

#[tokio::test]
async fn failed_delete_restores_the_original_descriptor() {
    let mock = seeded_mock();
    let (session, _events) = load_session(&mock).await;
    let slot = SlotKey::new(0, 0);

    let before_state = session.slot_state(slot, Phase::Before).await.unwrap();
    mock.fail_deletes.store(true, Ordering::SeqCst);

    session.request_delete(slot, Phase::Before).await.unwrap();
    let err = session.confirm_delete().await.unwrap_err();
    assert!(matches!(err, Error::DeleteFailed(_)));

    // Rollback is bit-for-bit: the state equals the pre-delete state
    let after_state = session.slot_state(slot, Phase::Before).await.unwrap();
    assert_eq!(after_state, before_state);

    // Never left in deleting, and a fresh arm/confirm works after the
    // backend recovers
    mock.fail_deletes.store(false, Ordering::SeqCst);
    session.request_delete(slot, Phase::Before).await.unwrap();
    session.confirm_delete().await.unwrap();
    assert_eq!(
        session.slot_state(slot, Phase::Before).await.unwrap(),
        SlotMediaState::Empty
    );
}

#[tokio::test]
async fn slot_is_busy_while_delete_is_in_flight() {
    let mock = seeded_mock();
    let (session, _events) = load_session(&mock).await;
    let gate = mock.hold_deletes();
    let slot = SlotKey::new(0, 0);

    session.request_delete(slot, Phase::Before).await.unwrap();
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.confirm_delete().await })
    };
    wait_for_delete_calls(&mock, 1).await;

    // An upload for the same slot+phase must not race the delete
    let err = session
        .upload(slot, Phase::Before, image_file("racer.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SlotBusy { .. }));
    assert_eq!(mock.upload_calls.load(Ordering::SeqCst), 0);

    gate.notify_one();
    pending.await.unwrap().expect("delete completes");
    assert_eq!(
        session.slot_state(slot, Phase::Before).await.unwrap(),
        SlotMediaState::Empty
    );
}
