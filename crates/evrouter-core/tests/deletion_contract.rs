//! Contract Test: Deletions
//!
//! This test verifies that deletions are observed but never forwarded.
//!
//! Constraints verified:
//! - No delivery for a delete, valid or malformed
//! - The cursor does not move
//! - The checkpoint callback is not invoked
//!
//! If this test fails, downstream history is being rewritten.

mod common;

use common::*;
use evrouter_core::RouterEvent;
use evrouter_core::traits::{ChangeNotification, Payload};

#[tokio::test]
async fn delete_is_logged_only() {
    let destination = MockDestination::new();
    let recorder = CheckpointRecorder::new();
    let (router, mut events) = router_for(&destination);
    let router = router
        .resume_from("10")
        .with_checkpoint(recorder.callback());

    router.on_delete(&event_payload("gone", "99"));

    assert_eq!(destination.deliver_call_count(), 0);
    assert_eq!(router.position().await.as_deref(), Some("10"));
    assert!(recorder.tokens().is_empty());

    let events = drain_events(&mut events);
    assert_eq!(
        events,
        vec![RouterEvent::Deleted {
            name: "gone".to_string(),
            namespace: "default".to_string(),
        }]
    );
}

#[tokio::test]
async fn malformed_delete_is_ignored() {
    let destination = MockDestination::new();
    let (router, mut events) = router_for(&destination);

    router.on_delete(&Payload::Null);
    router.on_delete(&serde_json::json!(42));

    assert_eq!(destination.deliver_call_count(), 0);
    assert_eq!(router.position().await, None);
    assert!(drain_events(&mut events).is_empty());
}

#[tokio::test]
async fn dispatched_delete_does_not_affect_later_creates() {
    let destination = MockDestination::new();
    let (router, _events) = router_for(&destination);

    router
        .dispatch(ChangeNotification::Deleted(event_payload("x", "900")))
        .await;
    router
        .dispatch(ChangeNotification::Created(event_payload("y", "5")))
        .await;

    assert_eq!(destination.deliver_call_count(), 1);
    assert_eq!(router.position().await.as_deref(), Some("5"));
}
