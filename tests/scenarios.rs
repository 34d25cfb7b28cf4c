// SPDX-License-Identifier: MIT

//! End-to-end scenarios for the delivery worker, driven entirely through its
//! public surface (`core::enqueue`, `DeliveryWorker::run`, the store traits) --
//! the same seam the HTTP boundary and a production deployment use.

use std::sync::Arc;
use std::time::Duration;

use agent_relay_core::core::presence::{fast_path_channel, PresenceEvent};
use agent_relay_core::core::store::{AgentDirectory, MessageStore, PresenceStore};
use agent_relay_core::core::{self, Agent, AgentId, AgentStatus, DeliveryWorker, MessageStatus, RetryScheduler};
use agent_relay_core::db::memory::InMemoryStore;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent(status: AgentStatus, webhook_url: String) -> Agent {
    Agent {
        id: AgentId::new(),
        name: "tester".into(),
        description: String::new(),
        status,
        webhook_url,
        secret: "test-secret".into(),
        api_key_hash: "unused".into(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

/// Polls `store.get(id)` until `pred` holds or `timeout` elapses, returning the
/// last observed message. Stands in for a virtual clock: every scenario below
/// scales its ladder/poll intervals down to milliseconds so real wall time can
/// stand in for the elapsed-time checkpoints each scenario describes.
async fn wait_for(
    store: &InMemoryStore,
    id: &agent_relay_core::core::MessageId,
    timeout: Duration,
    pred: impl Fn(&agent_relay_core::core::Message) -> bool,
) -> agent_relay_core::core::Message {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(msg) = MessageStore::get(store, id).await.unwrap() {
            if pred(&msg) {
                return msg;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for message {id} to satisfy the predicate");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn happy_path_delivers_on_first_attempt() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let recipient = agent(AgentStatus::Online, format!("{}/hook", mock.uri()));
    let recipient_id = recipient.id.clone();
    store.seed_agent(recipient);

    let msg = core::enqueue(
        store.as_ref(),
        AgentId::new(),
        recipient_id,
        json!({"x": 1}),
    )
    .await
    .unwrap();

    let shutdown = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store.clone(),
        store.clone(),
        reqwest::Client::new(),
        RetryScheduler::new(vec![1], 5),
        Duration::from_millis(20),
        shutdown.clone(),
    );
    let handle = tokio::spawn(worker.run(None));

    let delivered = wait_for(&store, &msg.id, Duration::from_secs(2), |m| {
        matches!(m.status, MessageStatus::Delivered)
    })
    .await;

    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(delivered.retry_count, 0);
    assert!(delivered.delivered_at.is_some());
    assert_eq!(mock.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn offline_recipient_is_delivered_promptly_once_a_presence_event_fires() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let recipient = agent(AgentStatus::Offline, format!("{}/hook", mock.uri()));
    let recipient_id = recipient.id.clone();
    store.seed_agent(recipient);

    let msg = core::enqueue(
        store.as_ref(),
        AgentId::new(),
        recipient_id.clone(),
        json!({"x": 1}),
    )
    .await
    .unwrap();

    let shutdown = CancellationToken::new();
    // A long poll interval makes the fast path the only plausible source of the
    // delivery that follows shortly after the presence event below.
    let worker = DeliveryWorker::new(
        store.clone(),
        store.clone(),
        reqwest::Client::new(),
        RetryScheduler::default(),
        Duration::from_secs(5),
        shutdown.clone(),
    );
    let (tx, rx) = fast_path_channel();
    let handle = tokio::spawn(worker.run(Some(rx)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let still_queued = MessageStore::get(&store, &msg.id).await.unwrap().unwrap();
    assert!(matches!(still_queued.status, MessageStatus::Queued));
    assert_eq!(mock.received_requests().await.unwrap().len(), 0);

    AgentDirectory::update_agent_status(store.as_ref(), &recipient_id, AgentStatus::Online)
        .await
        .unwrap();
    tx.notify(PresenceEvent {
        agent_id: recipient_id,
        status: AgentStatus::Online,
    });

    let delivered = wait_for(&store, &msg.id, Duration::from_secs(2), |m| {
        matches!(m.status, MessageStatus::Delivered)
    })
    .await;

    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(delivered.retry_count, 0);
}

#[tokio::test]
async fn transient_failures_exhaust_the_ladder_into_failed() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let recipient = agent(AgentStatus::Online, format!("{}/hook", mock.uri()));
    let recipient_id = recipient.id.clone();
    store.seed_agent(recipient);

    let msg = core::enqueue(store.as_ref(), AgentId::new(), recipient_id, json!({}))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store.clone(),
        store.clone(),
        reqwest::Client::new(),
        RetryScheduler::new(vec![0, 0, 0], 3),
        Duration::from_millis(10),
        shutdown.clone(),
    );
    let handle = tokio::spawn(worker.run(None));

    let failed = wait_for(&store, &msg.id, Duration::from_secs(5), |m| {
        matches!(m.status, MessageStatus::Failed)
    })
    .await;

    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(failed.retry_count, 3);
    assert!(failed.error.as_deref().unwrap_or("").contains("503"));
}

#[tokio::test]
async fn hard_reject_fails_without_bumping_retry_count_or_retrying() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let recipient = agent(AgentStatus::Online, format!("{}/hook", mock.uri()));
    let recipient_id = recipient.id.clone();
    store.seed_agent(recipient);

    let msg = core::enqueue(store.as_ref(), AgentId::new(), recipient_id, json!({}))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store.clone(),
        store.clone(),
        reqwest::Client::new(),
        RetryScheduler::new(vec![1], 5),
        Duration::from_millis(10),
        shutdown.clone(),
    );
    let handle = tokio::spawn(worker.run(None));

    let failed = wait_for(&store, &msg.id, Duration::from_secs(2), |m| {
        matches!(m.status, MessageStatus::Failed)
    })
    .await;
    assert_eq!(failed.retry_count, 0);
    assert!(failed.error.as_deref().unwrap_or("").contains("404"));

    // Give the poller several more opportunities; a terminal outcome must never
    // be retried regardless of how long it waits.
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(mock.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_recipient_fails_immediately() {
    let store = Arc::new(InMemoryStore::new());
    // No agent is ever seeded for this id.
    let msg = core::enqueue(store.as_ref(), AgentId::new(), AgentId::new(), json!({}))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let worker = DeliveryWorker::new(
        store.clone(),
        store.clone(),
        reqwest::Client::new(),
        RetryScheduler::default(),
        Duration::from_millis(10),
        shutdown.clone(),
    );
    let handle = tokio::spawn(worker.run(None));

    let failed = wait_for(&store, &msg.id, Duration::from_secs(2), |m| {
        matches!(m.status, MessageStatus::Failed)
    })
    .await;

    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(failed.retry_count, 0);
    assert_eq!(failed.error.as_deref(), Some("recipient not found"));
}

#[tokio::test]
async fn without_a_fast_path_channel_delivery_waits_for_the_next_poll() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let recipient = agent(AgentStatus::Offline, format!("{}/hook", mock.uri()));
    let recipient_id = recipient.id.clone();
    store.seed_agent(recipient);

    let msg = core::enqueue(
        store.as_ref(),
        AgentId::new(),
        recipient_id.clone(),
        json!({}),
    )
    .await
    .unwrap();

    let shutdown = CancellationToken::new();
    let poll_interval = Duration::from_millis(150);
    let worker = DeliveryWorker::new(
        store.clone(),
        store.clone(),
        reqwest::Client::new(),
        RetryScheduler::default(),
        poll_interval,
        shutdown.clone(),
    );
    // `run(None)`: no fast-path channel wired up at all.
    let handle = tokio::spawn(worker.run(None));

    tokio::time::sleep(Duration::from_millis(50)).await;
    AgentDirectory::update_agent_status(store.as_ref(), &recipient_id, AgentStatus::Online)
        .await
        .unwrap();
    // No notify() call -- delivery can only happen once the next poll tick scans
    // the queue and finds the recipient online.
    assert_eq!(mock.received_requests().await.unwrap().len(), 0);

    let delivered = wait_for(&store, &msg.id, Duration::from_secs(2), |m| {
        matches!(m.status, MessageStatus::Delivered)
    })
    .await;

    shutdown.cancel();
    handle.await.unwrap();
    assert_eq!(delivered.retry_count, 0);
}

#[tokio::test]
async fn two_workers_racing_on_the_same_message_deliver_it_exactly_once() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let recipient = agent(AgentStatus::Online, format!("{}/hook", mock.uri()));
    let recipient_id = recipient.id.clone();
    store.seed_agent(recipient);

    let msg = core::enqueue(store.as_ref(), AgentId::new(), recipient_id, json!({}))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let message_store: Arc<dyn MessageStore> = store.clone();
    let presence_store: Arc<dyn PresenceStore> = store.clone();

    let worker_a = DeliveryWorker::new(
        message_store.clone(),
        presence_store.clone(),
        reqwest::Client::new(),
        RetryScheduler::new(vec![1], 5),
        Duration::from_millis(5),
        shutdown.clone(),
    );
    let worker_b = DeliveryWorker::new(
        message_store,
        presence_store,
        reqwest::Client::new(),
        RetryScheduler::new(vec![1], 5),
        Duration::from_millis(5),
        shutdown.clone(),
    );
    let handle_a = tokio::spawn(worker_a.run(None));
    let handle_b = tokio::spawn(worker_b.run(None));

    let delivered = wait_for(&store, &msg.id, Duration::from_secs(2), |m| {
        matches!(m.status, MessageStatus::Delivered)
    })
    .await;

    // Give the loser of the race a further chance to observe a stale write.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    handle_a.await.unwrap();
    handle_b.await.unwrap();

    assert_eq!(delivered.retry_count, 0);
    assert_eq!(
        mock.received_requests().await.unwrap().len(),
        1,
        "exactly one dispatch attempt should have reached the recipient"
    );
}
