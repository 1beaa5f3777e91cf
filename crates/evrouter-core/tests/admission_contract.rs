//! Contract Test: Admission
//!
//! This test verifies that the router forwards a record only when its
//! position token is strictly newer than the cursor.
//!
//! Constraints verified:
//! - Older and equal tokens are skipped
//! - Newer tokens are delivered and advance the cursor
//! - Empty tokens are never admitted
//! - Numeric tokens compare by magnitude, whatever their length
//! - The checkpoint callback sees exactly the advanced tokens
//!
//! If this test fails, the router can replay history or lose events.

mod common;

use common::*;
use evrouter_core::{EventRouter, RouterConfig, RouterEvent, TokenOrdering, Verb};

#[tokio::test]
async fn older_and_equal_tokens_are_skipped() {
    let destination = MockDestination::new();
    let (router, _events) = router_for(&destination);
    let router = router.resume_from("100");

    router.on_create(&event_payload("old", "99")).await;
    router.on_create(&event_payload("same", "100")).await;

    assert_eq!(destination.deliver_call_count(), 0);
    assert_eq!(router.position().await.as_deref(), Some("100"));

    router.on_create(&event_payload("new", "101")).await;

    let delivered = destination.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].verb, Verb::Added);
    assert_eq!(delivered[0].event.metadata.name, "new");
    assert_eq!(router.position().await.as_deref(), Some("101"));
}

#[tokio::test]
async fn first_record_is_admitted_when_cursor_is_unset() {
    let destination = MockDestination::new();
    let (router, _events) = router_for(&destination);

    assert_eq!(router.position().await, None);

    router.on_create(&event_payload("first", "7")).await;

    assert_eq!(destination.deliver_call_count(), 1);
    assert_eq!(router.position().await.as_deref(), Some("7"));
}

#[tokio::test]
async fn empty_token_is_never_admitted() {
    let destination = MockDestination::new();
    let (router, mut events) = router_for(&destination);

    router.on_create(&event_payload("unpositioned", "")).await;

    assert_eq!(destination.deliver_call_count(), 0);
    assert_eq!(router.position().await, None);
    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, RouterEvent::Skipped { .. })));
}

#[tokio::test]
async fn numeric_tokens_compare_by_magnitude() {
    let destination = MockDestination::new();
    let (router, _events) = router_for(&destination);
    let router = router.resume_from("99");

    // "100" sorts before "99" as a string, but is newer
    router.on_create(&event_payload("a", "100")).await;
    assert_eq!(destination.deliver_call_count(), 1);

    // Beyond u64
    router
        .on_create(&event_payload("b", "184467440737095516160"))
        .await;
    assert_eq!(destination.deliver_call_count(), 2);
    assert_eq!(
        router.position().await.as_deref(),
        Some("184467440737095516160")
    );
}

#[tokio::test]
async fn lexical_ordering_compares_strings() {
    let destination = MockDestination::new();
    let config = RouterConfig::new().with_token_ordering(TokenOrdering::Lexical);
    let (router, _events) = EventRouter::new(
        Box::new(MockDestination::sharing_counters_with(&destination)),
        &config,
    )
    .expect("router construction succeeds");
    let router = router.resume_from("b");

    router.on_create(&event_payload("x", "a")).await;
    router.on_create(&event_payload("y", "c")).await;

    let delivered = destination.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event.metadata.name, "y");
}

#[tokio::test]
async fn opaque_tokens_still_gate_under_numeric_ordering() {
    let destination = MockDestination::new();
    let (router, _events) = router_for(&destination);
    let router = router.resume_from("abc");

    router.on_create(&event_payload("older", "abb")).await;
    router.on_create(&event_payload("same", "abc")).await;
    router.on_create(&event_payload("newer", "abd")).await;

    let delivered = destination.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event.metadata.name, "newer");
    assert_eq!(router.position().await.as_deref(), Some("abd"));
}

#[tokio::test]
async fn checkpoint_callback_sees_each_advance() {
    let destination = MockDestination::new();
    let recorder = CheckpointRecorder::new();
    let (router, _events) = router_for(&destination);
    let router = router.with_checkpoint(recorder.callback());

    router.on_create(&event_payload("a", "1")).await;
    router.on_create(&event_payload("b", "1")).await;
    router.on_create(&event_payload("c", "3")).await;
    router.on_create(&event_payload("d", "2")).await;

    assert_eq!(recorder.tokens(), vec!["1".to_string(), "3".to_string()]);
}
