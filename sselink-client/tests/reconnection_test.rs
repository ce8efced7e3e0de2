//! Reconnection integration tests
//!
//! Drives the connection state machine with a scripted connector: backoff
//! pacing, retry ceilings, and the non-retryable short-circuit.

mod common;

use common::{ConnectScript, FakeConnector, StreamStep};
use serde_json::json;
use sselink_client::{
    ConnectionState, ErrorKind, LinkBuilder, RetryPolicy, SubscriptionEvent, JITTER_MS,
};
use sselink_core::{Error, Frame, Operation};
use std::time::Duration;

fn link_with(
    connector: std::sync::Arc<FakeConnector>,
    retry: RetryPolicy,
) -> sselink_client::SubscriptionLink {
    LinkBuilder::new("https://gateway.local/graphql/stream")
        .retry(retry)
        .connector(connector)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_network_failures_then_success_with_backoff() {
    let connector = FakeConnector::new(vec![
        ConnectScript::Refuse(Error::Http("connection refused".to_string())),
        ConnectScript::Refuse(Error::Http("connection refused".to_string())),
        ConnectScript::Refuse(Error::Http("connection refused".to_string())),
        ConnectScript::Accept(vec![
            StreamStep::Frame(Frame::Next(json!({"data": {"n": 1}}))),
            StreamStep::Hang,
        ]),
    ]);

    let retry = RetryPolicy::default()
        .with_attempts(3)
        .with_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(1000));
    let link = link_with(connector.clone(), retry);

    let (handle, mut events) = link
        .subscribe_stream(Operation::subscription("subscription { tick }"))
        .unwrap();

    // The first thing the consumer sees is data — reconnection was invisible
    match events.next_event().await {
        Some(SubscriptionEvent::Next(payload)) => assert_eq!(payload["data"]["n"], json!(1)),
        other => panic!("expected data event, got {:?}", other),
    }

    let times = connector.connect_times();
    assert_eq!(times.len(), 4, "initial connect plus three retries");

    // Gaps follow the doubling schedule, each padded by at most the jitter
    let expected = [100u64, 200, 400];
    for (window, base) in times.windows(2).zip(expected) {
        let gap = window[1] - window[0];
        assert!(gap >= Duration::from_millis(base), "gap {:?} below {}ms", gap, base);
        assert!(
            gap <= Duration::from_millis(base + JITTER_MS),
            "gap {:?} above {}ms plus jitter",
            gap,
            base
        );
    }

    assert_eq!(handle.state(), ConnectionState::Connected);
    handle.unsubscribe();
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_short_circuits() {
    let connector = FakeConnector::new(vec![ConnectScript::Refuse(Error::HandshakeStatus {
        status: 401,
    })]);
    let link = link_with(connector.clone(), RetryPolicy::default());

    let (handle, mut events) = link
        .subscribe_stream(Operation::subscription("subscription { tick }"))
        .unwrap();

    match events.next_event().await {
        Some(SubscriptionEvent::Error(error)) => {
            assert_eq!(error.kind, ErrorKind::Auth);
            assert!(!error.retryable);
            assert_eq!(error.status, Some(401));
        }
        other => panic!("expected terminal error, got {:?}", other),
    }
    // Terminal means terminal: the stream ends with no further events
    assert!(events.next_event().await.is_none());

    assert_eq!(connector.connect_count(), 1, "zero reconnection attempts");
    assert_eq!(handle.state(), ConnectionState::Failed);
    assert_eq!(link.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhaustion_surfaces_error() {
    let connector = FakeConnector::new(vec![
        ConnectScript::Refuse(Error::Http("refused".to_string())),
        ConnectScript::Refuse(Error::Http("refused".to_string())),
        ConnectScript::Refuse(Error::Http("refused".to_string())),
    ]);
    let retry = RetryPolicy::default()
        .with_attempts(2)
        .with_delay(Duration::from_millis(10));
    let link = link_with(connector.clone(), retry);

    let (handle, mut events) = link
        .subscribe_stream(Operation::subscription("subscription { tick }"))
        .unwrap();

    match events.next_event().await {
        Some(SubscriptionEvent::Error(error)) => assert_eq!(error.kind, ErrorKind::Network),
        other => panic!("expected terminal error, got {:?}", other),
    }
    assert!(events.next_event().await.is_none());

    assert_eq!(connector.connect_count(), 3, "initial connect plus two retries");
    assert_eq!(handle.state(), ConnectionState::Failed);
    assert_eq!(link.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_frame_triggers_invisible_reconnect() {
    let connector = FakeConnector::new(vec![
        ConnectScript::Accept(vec![StreamStep::Frame(Frame::Error(
            json!({"message": "shard restarting"}),
        ))]),
        ConnectScript::Accept(vec![
            StreamStep::Frame(Frame::Next(json!({"data": {"n": 2}}))),
            StreamStep::Hang,
        ]),
    ]);
    let retry = RetryPolicy::default().with_delay(Duration::from_millis(10));
    let link = link_with(connector.clone(), retry);

    let (handle, mut events) = link
        .subscribe_stream(Operation::subscription("subscription { tick }"))
        .unwrap();

    match events.next_event().await {
        Some(SubscriptionEvent::Next(payload)) => assert_eq!(payload["data"]["n"], json!(2)),
        other => panic!("expected data after invisible reconnect, got {:?}", other),
    }

    assert_eq!(connector.connect_count(), 2);
    // The recovered failure is visible through introspection only
    let infos = link.subscriptions();
    assert_eq!(infos.len(), 1);
    let error = infos[0].last_error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Server);

    handle.unsubscribe();
}

#[tokio::test(start_paused = true)]
async fn test_parse_fault_is_retryable() {
    let connector = FakeConnector::new(vec![
        ConnectScript::Accept(vec![StreamStep::Fail(Error::Parse(
            "malformed next payload".to_string(),
        ))]),
        ConnectScript::Accept(vec![
            StreamStep::Frame(Frame::Next(json!({"data": {"ok": true}}))),
            StreamStep::Hang,
        ]),
    ]);
    let retry = RetryPolicy::default().with_delay(Duration::from_millis(10));
    let link = link_with(connector.clone(), retry);

    let (handle, mut events) = link
        .subscribe_stream(Operation::subscription("subscription { tick }"))
        .unwrap();

    match events.next_event().await {
        Some(SubscriptionEvent::Next(_)) => {}
        other => panic!("expected data after parse-fault reconnect, got {:?}", other),
    }
    assert_eq!(connector.connect_count(), 2);

    handle.unsubscribe();
}

#[tokio::test(start_paused = true)]
async fn test_attempt_counter_resets_after_successful_connect() {
    // Two separate outages; each stays within the 2-attempt budget only if
    // the counter resets on the successful connect between them.
    let connector = FakeConnector::new(vec![
        ConnectScript::Refuse(Error::Http("refused".to_string())),
        ConnectScript::Refuse(Error::Http("refused".to_string())),
        ConnectScript::Accept(vec![
            StreamStep::Frame(Frame::Next(json!({"data": {"n": 1}}))),
            // Stream drops without completion: a retryable network fault
        ]),
        ConnectScript::Refuse(Error::Http("refused".to_string())),
        ConnectScript::Refuse(Error::Http("refused".to_string())),
        ConnectScript::Accept(vec![
            StreamStep::Frame(Frame::Next(json!({"data": {"n": 2}}))),
            StreamStep::Hang,
        ]),
    ]);
    let retry = RetryPolicy::default()
        .with_attempts(3)
        .with_delay(Duration::from_millis(10));
    let link = link_with(connector.clone(), retry);

    let (handle, mut events) = link
        .subscribe_stream(Operation::subscription("subscription { tick }"))
        .unwrap();

    for expected in [1, 2] {
        match events.next_event().await {
            Some(SubscriptionEvent::Next(payload)) => {
                assert_eq!(payload["data"]["n"], json!(expected));
            }
            other => panic!("expected data event {}, got {:?}", expected, other),
        }
    }

    assert_eq!(connector.connect_count(), 6);
    assert_eq!(handle.state(), ConnectionState::Connected);
    handle.unsubscribe();
}
