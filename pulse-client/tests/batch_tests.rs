//! Batching engine behavior against a mock collection endpoint.

use pretty_assertions::assert_eq;
use pulse_client::{BatchConfig, BatchConsumer, Consumer, IngestError};
use pulse_types::{EventKind, EventRecord, Properties, SubEvent};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(client_id: &str, event: &str) -> EventRecord {
    EventRecord::single(
        client_id,
        SubEvent {
            kind: EventKind::Track,
            name: event.into(),
            time: 1_700_000_000_000,
            time_free: false,
            properties: Properties::new(),
        },
    )
}

fn consumer(server: &MockServer, batch_size: usize, cache_capacity: usize) -> BatchConsumer {
    let mut config = BatchConfig::new(server.uri());
    config.batch_size = batch_size;
    config.cache_capacity = cache_capacity;
    // Plain JSON bodies so tests can inspect them.
    config.compress = false;
    BatchConsumer::with_config(config).unwrap()
}

fn accepted() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 0 }))
}

async fn mount_accepted(server: &MockServer) {
    Mock::given(method("POST"))
        .respond_with(accepted())
        .mount(server)
        .await;
}

async fn mount_failing(server: &MockServer) {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

async fn request_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// --- Accumulation ---

#[tokio::test]
async fn no_delivery_below_batch_size() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 5, 10);

    for i in 0..3 {
        consumer.add(record("c1", &format!("e{i}"))).await.unwrap();
    }

    assert_eq!(server.received_requests().await.unwrap().len(), 0);
    assert_eq!(consumer.buffered().await, 3);

    consumer.flush().await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(consumer.buffered().await, 0);
    assert_eq!(consumer.cached(), 0);
}

#[tokio::test]
async fn reaching_batch_size_triggers_flush_and_empties_buffer() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    consumer.add(record("c1", "e1")).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 0);

    consumer.add(record("c1", "e2")).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(consumer.buffered().await, 0);
}

#[tokio::test]
async fn flush_on_empty_state_is_idempotent_noop() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    for _ in 0..3 {
        consumer.flush().await.unwrap();
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

// --- FIFO and bounded loss ---

#[tokio::test]
async fn oldest_batch_is_delivered_first() {
    let server = MockServer::start().await;
    mount_failing(&server).await;
    let consumer = consumer(&server, 1, 10);

    assert!(consumer.add(record("c1", "e1")).await.is_err());
    assert!(consumer.add(record("c1", "e2")).await.is_err());
    assert_eq!(consumer.cached(), 2);

    server.reset().await;
    mount_accepted(&server).await;

    consumer.flush().await.unwrap();
    assert_eq!(consumer.cached(), 1);
    consumer.flush().await.unwrap();
    assert_eq!(consumer.cached(), 0);

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["event_list"][0]["event"], "e1");
    assert_eq!(bodies[1]["event_list"][0]["event"], "e2");
}

#[tokio::test]
async fn capacity_overflow_drops_oldest_batch() {
    let server = MockServer::start().await;
    mount_failing(&server).await;
    let consumer = consumer(&server, 1, 1);

    assert!(consumer.add(record("c1", "e1")).await.is_err());
    assert!(consumer.add(record("c1", "e2")).await.is_err());
    // Capacity 1: the older batch was evicted, only the newer remains.
    assert_eq!(consumer.cached(), 1);

    server.reset().await;
    mount_accepted(&server).await;
    consumer.flush().await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["event_list"][0]["event"], "e2");
}

// --- Retry and rejection ---

#[tokio::test]
async fn retry_budget_is_three_attempts() {
    let server = MockServer::start().await;
    mount_failing(&server).await;
    let consumer = consumer(&server, 1, 10);

    let err = consumer.add(record("c1", "e1")).await.unwrap_err();
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    match err {
        IngestError::RetriesExhausted { attempts, status } => {
            assert_eq!(attempts, 3);
            assert_eq!(status.as_u16(), 500);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    // The batch stays queued for a later flush.
    assert_eq!(consumer.cached(), 1);
}

#[tokio::test]
async fn server_rejection_is_terminal_without_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 7 })))
        .mount(&server)
        .await;
    let consumer = consumer(&server, 1, 10);

    let err = consumer.add(record("c1", "e1")).await.unwrap_err();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(matches!(err, IngestError::Rejected { code: 7 }));
}

// --- Grouping ---

#[tokio::test]
async fn same_client_records_merge_into_one_request() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    consumer.add(record("c1", "e1")).await.unwrap();
    consumer.add(record("c1", "e2")).await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["client_id"], "c1");
    let events = bodies[0]["event_list"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "e1");
    assert_eq!(events[1]["event"], "e2");
}

#[tokio::test]
async fn distinct_clients_get_one_request_each() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    consumer.add(record("c1", "e1")).await.unwrap();
    consumer.add(record("c2", "e2")).await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(consumer.cached(), 0);
}

// --- Drain scenario ---

#[tokio::test]
async fn three_adds_flush_then_close_delivers_everything() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    consumer.add(record("c1", "e1")).await.unwrap();
    consumer.add(record("c1", "e2")).await.unwrap();
    consumer.add(record("c1", "e3")).await.unwrap();
    assert_eq!(consumer.buffered().await, 1);

    consumer.close().await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["event_list"].as_array().unwrap().len(), 2);
    assert_eq!(bodies[1]["event_list"].as_array().unwrap().len(), 1);
    assert_eq!(bodies[1]["event_list"][0]["event"], "e3");
}

// --- Close semantics ---

#[tokio::test]
async fn add_after_close_is_an_error() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    consumer.close().await.unwrap();
    let err = consumer.add(record("c1", "e1")).await.unwrap_err();
    assert!(matches!(err, IngestError::Closed));
}

#[tokio::test]
async fn close_is_idempotent() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;
    let consumer = consumer(&server, 2, 10);

    consumer.close().await.unwrap();
    consumer.close().await.unwrap();
}

#[tokio::test]
async fn drain_tolerates_transport_errors_only_while_backlog_shrinks() {
    let server = MockServer::start().await;
    mount_failing(&server).await;
    let consumer = consumer(&server, 5, 10);

    for i in 0..3 {
        consumer.add(record("c1", &format!("e{i}"))).await.unwrap();
    }
    assert_eq!(consumer.buffered().await, 3);
    assert_eq!(consumer.cached(), 0);

    // The first drain iteration promotes the buffer into one cached batch,
    // shrinking the backlog, so its delivery failure is swallowed. The
    // second iteration makes no progress and its error propagates.
    let err = consumer.close().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
    assert_eq!(consumer.cached(), 1);
}

#[tokio::test]
async fn close_reports_undeliverable_backlog() {
    let server = MockServer::start().await;
    mount_failing(&server).await;
    let consumer = consumer(&server, 1, 10);

    assert!(consumer.add(record("c1", "e1")).await.is_err());
    let err = consumer.close().await.unwrap_err();
    assert!(err.is_transport());
}

// --- Background scheduler ---

#[tokio::test]
async fn scheduler_flushes_without_producer_calls() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;

    let mut config = BatchConfig::new(server.uri());
    config.batch_size = 100;
    config.compress = false;
    config.auto_flush = true;
    config.flush_interval = std::time::Duration::from_millis(100);
    let consumer = BatchConsumer::with_config(config).unwrap();

    consumer.add(record("c1", "e1")).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 0);

    tokio::time::sleep(std::time::Duration::from_millis(350)).await;
    assert!(!server.received_requests().await.unwrap().is_empty());
    assert_eq!(consumer.buffered().await, 0);
    assert_eq!(consumer.cached(), 0);

    consumer.close().await.unwrap();
}

#[tokio::test]
async fn scheduler_stops_on_close() {
    let server = MockServer::start().await;
    mount_accepted(&server).await;

    let mut config = BatchConfig::new(server.uri());
    config.auto_flush = true;
    config.flush_interval = std::time::Duration::from_millis(50);
    let consumer = BatchConsumer::with_config(config).unwrap();

    consumer.close().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
