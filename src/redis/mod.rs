// SPDX-License-Identifier: MIT

use std::time::Duration;

use futures::StreamExt;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use crate::core::presence::{FastPathSender, PresenceEvent};
use crate::error::{Error, Result};

/// Channel presence-change events are published/subscribed on. A single fixed
/// channel is enough here -- the fast path carries no data that needs
/// partitioning across shards.
pub const PRESENCE_CHANNEL: &str = "agent_relay.presence";

const MIN_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// Publishes a presence-change event for other processes' fast paths to pick up.
/// Called by the HTTP boundary's status-update handler; failures are the caller's
/// to log and swallow -- publishing is always best-effort.
pub async fn publish_presence_event(dsn: &str, event: &PresenceEvent) -> Result<()> {
    let client = redis::Client::open(dsn)?;
    let mut conn = client.get_tokio_connection_manager().await?;
    let payload = serde_json::to_string(event)
        .map_err(|e| Error::Generic(format!("failed to serialize presence event: {e}")))?;
    let _: i64 = conn.publish(PRESENCE_CHANNEL, payload).await?;
    Ok(())
}

/// Forwards presence-change events from Redis pub/sub into the in-process
/// fast-path channel, so the delivery worker sees presence flips published by
/// other processes, not just the one handling the HTTP request. Runs until
/// `shutdown` fires; reconnects with capped exponential backoff on any failure,
/// since a subscriber outage must never be allowed to affect message delivery --
/// only the latency of the first retry after a presence change.
pub async fn run_subscriber(dsn: String, tx: FastPathSender, shutdown: CancellationToken) {
    let mut backoff = MIN_RECONNECT_BACKOFF;
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        match subscribe_once(&dsn, &tx, &shutdown).await {
            Ok(()) => return,
            Err(e) => {
                tracing::warn!("presence redis subscriber disconnected: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(MAX_RECONNECT_BACKOFF);
            }
        }
    }
}

async fn subscribe_once(
    dsn: &str,
    tx: &FastPathSender,
    shutdown: &CancellationToken,
) -> Result<()> {
    let client = redis::Client::open(dsn)?;
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(PRESENCE_CHANNEL).await?;
    let mut stream = pubsub.on_message();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            msg = stream.next() => {
                let Some(msg) = msg else {
                    return Err(Error::Generic("presence pub/sub stream ended".into()));
                };
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("malformed presence pub/sub payload: {e}");
                        continue;
                    }
                };
                match serde_json::from_str::<PresenceEvent>(&payload) {
                    Ok(event) => tx.notify(event),
                    Err(e) => tracing::warn!("failed to parse presence event: {e}"),
                }
            }
        }
    }
}
