mod support;

use domain::FieldValue;
use pulse_ingest::{SessionConfig, SessionController, SessionShared, SessionState};
use pulse_storage::InMemoryMetricWriter;
use pulse_telemetry::metrics;
use std::sync::Arc;
use std::time::Duration;
use support::{
    Attempt, EventLog, ScriptedConnector, Step, ack, complete, data, keep_alive, remote_error,
    trace,
};
use tokio::time::Instant;

struct Harness {
    controller: SessionController,
    writer: Arc<InMemoryMetricWriter>,
    log: EventLog,
    shared: Arc<SessionShared>,
}

fn harness(attempts: Vec<Attempt>) -> Harness {
    let shared = Arc::new(SessionShared::new());
    let connector = ScriptedConnector::new(shared.clone(), attempts);
    let log = connector.log();
    let writer = Arc::new(InMemoryMetricWriter::new("power"));
    let controller = SessionController::new(
        Arc::new(connector),
        writer.clone(),
        SessionConfig::new("home-1"),
        shared.clone(),
    );
    Harness {
        controller,
        writer,
        log,
        shared,
    }
}

async fn run_to_end(harness: &Harness) {
    tokio::time::timeout(Duration::from_secs(3600), harness.controller.run())
        .await
        .expect("controller did not finish");
}

fn powers(writer: &InMemoryMetricWriter) -> Vec<f64> {
    writer
        .points()
        .iter()
        .map(|point| match point.field("powerConsumption") {
            Some(FieldValue::F64(value)) => *value,
            other => panic!("unexpected field {other:?}"),
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn feed_silence_after_data_resubscribes_on_same_channel() {
    let harness = harness(vec![Attempt::Connect(vec![
        ack(),
        data(1, 100.0),
        data(1, 200.0),
        Step::Silence,
        data(2, 300.0),
        complete(2),
    ])]);

    let before = metrics().snapshot();
    let started = Instant::now();
    run_to_end(&harness).await;
    let after = metrics().snapshot();

    assert!(after.resubscribes >= before.resubscribes + 1);
    assert!(after.samples_decoded >= before.samples_decoded + 3);
    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "stop:1",
            "start:2",
            "connection_terminate",
            "close",
        ]
    );
    assert_eq!(powers(&harness.writer), vec![100.0, 200.0, 300.0]);
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(harness.shared.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn matching_complete_ends_subscription_without_stop() {
    let harness = harness(vec![Attempt::Connect(vec![
        ack(),
        data(1, 1500.0),
        complete(1),
    ])]);

    run_to_end(&harness).await;

    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connection_terminate",
            "close",
        ]
    );
    assert_eq!(harness.writer.len(), 1);
    assert_eq!(
        harness.writer.lines(),
        vec!["power powerConsumption=1500.000000 1714557600000".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn keep_alive_only_feed_counts_as_no_data_and_reconnects() {
    let harness = harness(vec![
        Attempt::Connect(vec![ack(), keep_alive(), keep_alive(), Step::Silence]),
        Attempt::Connect(vec![ack(), data(2, 10.0), complete(2)]),
    ]);

    run_to_end(&harness).await;

    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connect",
            "connection_init",
            "start:2",
            "connection_terminate",
            "close",
        ]
    );
    assert_eq!(powers(&harness.writer), vec![10.0]);
}

#[tokio::test(start_paused = true)]
async fn remote_close_reconnects_with_next_id() {
    let harness = harness(vec![
        Attempt::Connect(vec![ack(), data(1, 1.0), Step::Close]),
        Attempt::Connect(vec![ack(), data(2, 2.0), complete(2)]),
    ]);

    let before = metrics().snapshot();
    run_to_end(&harness).await;

    assert!(metrics().snapshot().reconnects >= before.reconnects + 1);

    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connect",
            "connection_init",
            "start:2",
            "connection_terminate",
            "close",
        ]
    );
    assert_eq!(powers(&harness.writer), vec![1.0, 2.0]);
}

#[tokio::test(start_paused = true)]
async fn malformed_data_aborts_attempt_only() {
    let missing_power = Step::Message(
        r#"{"type":"data","id":"1","payload":{"data":{"liveMeasurement":{"timestamp":"2024-05-01T12:00:00Z"}}}}"#
            .to_string(),
    );
    let harness = harness(vec![
        Attempt::Connect(vec![ack(), data(1, 5.0), missing_power]),
        Attempt::Connect(vec![ack(), Step::Message("not json".to_string())]),
        Attempt::Connect(vec![ack(), data(3, 6.0), complete(3)]),
    ]);

    run_to_end(&harness).await;

    let trace = trace(&harness.log);
    assert_eq!(trace.iter().filter(|event| *event == "connect").count(), 3);
    assert!(trace.contains(&"start:3".to_string()));
    assert!(!trace.iter().any(|event| event.starts_with("stop")));
    assert_eq!(powers(&harness.writer), vec![5.0, 6.0]);
}

#[tokio::test(start_paused = true)]
async fn remote_error_for_current_subscription_reconnects() {
    let harness = harness(vec![
        Attempt::Connect(vec![ack(), remote_error(1)]),
        Attempt::Connect(vec![ack(), complete(2)]),
    ]);

    run_to_end(&harness).await;

    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connect",
            "connection_init",
            "start:2",
            "connection_terminate",
            "close",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn envelopes_for_other_subscriptions_are_ignored() {
    let harness = harness(vec![Attempt::Connect(vec![
        ack(),
        data(7, 70.0),
        remote_error(7),
        complete(7),
        ack(),
        Step::Message(r#"{"type":"next","id":"1"}"#.to_string()),
        data(1, 10.0),
        complete(1),
    ])]);

    run_to_end(&harness).await;

    assert_eq!(powers(&harness.writer), vec![10.0]);
    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connection_terminate",
            "close",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn hanging_connect_times_out_and_retries() {
    let harness = harness(vec![
        Attempt::Hang,
        Attempt::Connect(vec![ack(), complete(1)]),
    ]);

    let started = Instant::now();
    run_to_end(&harness).await;

    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connection_terminate",
            "close",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn remote_close_during_handshake_reconnects_before_allocating_id() {
    let harness = harness(vec![
        Attempt::Connect(vec![Step::Close]),
        Attempt::Connect(vec![ack(), complete(1)]),
    ]);

    run_to_end(&harness).await;

    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "connect",
            "connection_init",
            "start:1",
            "connection_terminate",
            "close",
        ]
    );
    assert_eq!(harness.shared.last_subscription_id(), 1);
}

#[tokio::test(start_paused = true)]
async fn soft_exit_before_run_opens_no_channel() {
    let harness = harness(vec![Attempt::Connect(vec![ack()])]);
    harness.shared.begin_soft_exit();

    run_to_end(&harness).await;

    assert!(trace(&harness.log).is_empty());
    assert_eq!(harness.shared.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn hard_cancel_abandons_connection_immediately() {
    let harness = harness(vec![Attempt::Connect(vec![ack(), data(1, 1.0)])]);
    let shared = harness.shared.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        shared.cancel();
    });

    let started = Instant::now();
    run_to_end(&harness).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(
        trace(&harness.log),
        vec!["connect", "connection_init", "start:1"]
    );
    assert_eq!(harness.shared.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn state_transitions_are_published_in_order() {
    let harness = harness(vec![Attempt::Connect(vec![
        ack(),
        data(1, 100.0),
        data(1, 200.0),
        Step::Silence,
        data(2, 300.0),
        complete(2),
    ])]);
    let mut states = harness.shared.watch_state();
    let shared = harness.shared.clone();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            seen.push(state);
            match state {
                // 连接关闭后不再重连
                SessionState::Closing => shared.begin_soft_exit(),
                SessionState::Closed => break,
                _ => {}
            }
        }
        seen
    });

    run_to_end(&harness).await;
    let seen = observer.await.unwrap();

    assert_eq!(
        seen,
        vec![
            SessionState::Connecting,
            SessionState::HandshakeSent,
            SessionState::AwaitingHandshakeAck,
            SessionState::Subscribed,
            SessionState::StoppingForResubscribe,
            SessionState::Subscribed,
            SessionState::Closing,
            SessionState::Closed,
        ]
    );
    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "stop:1",
            "start:2",
            "connection_terminate",
            "close",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_for_ended_subscription_is_skipped() {
    let stale = Step::Message(
        r#"{"type":"data","id":"7","payload":{"data":{"liveMeasurement":{"timestamp":"2024-05-01T12:00:00Z"}}}}"#
            .to_string(),
    );
    let harness = harness(vec![Attempt::Connect(vec![ack(), stale, data(1, 4.0), complete(1)])]);

    let before = metrics().snapshot();
    run_to_end(&harness).await;

    assert!(metrics().snapshot().decode_failures >= before.decode_failures + 1);
    assert_eq!(
        trace(&harness.log),
        vec![
            "connect",
            "connection_init",
            "start:1",
            "connection_terminate",
            "close",
        ]
    );
    assert_eq!(powers(&harness.writer), vec![4.0]);
}
