// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::dispatch;
use super::message::Message;
use super::presence::{FastPathReceiver, PresenceEvent};
use super::retry::RetryScheduler;
use super::store::{MessageStore, PresenceStore};
use super::types::AgentStatus;
use crate::error::Result;

/// Periodically scans the queue for due messages, and also accepts targeted
/// flushes triggered by presence changes. Both paths funnel through
/// [`process_message`](Self::process_message) so they can never diverge on the
/// retry-budget rule.
pub struct DeliveryWorker {
    store: Arc<dyn MessageStore>,
    presence: Arc<dyn PresenceStore>,
    client: reqwest::Client,
    scheduler: RetryScheduler,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<dyn MessageStore>,
        presence: Arc<dyn PresenceStore>,
        client: reqwest::Client,
        scheduler: RetryScheduler,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            presence,
            client,
            scheduler,
            poll_interval,
            shutdown,
        }
    }

    /// Runs until `shutdown` fires. `fast_path` is `None` when `fast_path_enabled`
    /// is false or no channel was wired up -- the loop then degrades to pure
    /// polling, which is the entire point of the fast path being advisory.
    pub async fn run(self, fast_path: Option<FastPathReceiver>) {
        let mut fast_path = fast_path;
        // `interval`, not a freshly constructed `sleep` per iteration: a burst of
        // fast-path events must never push the next scheduled scan back out.
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(poll_interval_secs = self.poll_interval.as_secs(), "delivery worker starting");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("delivery worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
                event = Self::recv_fast_path(&mut fast_path) => {
                    if let Some(event) = event {
                        self.handle_presence_event(event).await;
                    }
                }
            }
        }
    }

    /// Awaits the next fast-path event, or never resolves if the channel is absent
    /// or has been permanently closed -- `tokio::select!` then simply never picks
    /// this branch and the poll loop carries the system on its own.
    async fn recv_fast_path(rx: &mut Option<FastPathReceiver>) -> Option<PresenceEvent> {
        match rx {
            Some(r) => match r.recv().await {
                Some(event) => Some(event),
                None => {
                    tracing::warn!("fast-path channel closed; falling back to polling only");
                    *rx = None;
                    futures::future::pending().await
                }
            },
            None => futures::future::pending().await,
        }
    }

    async fn handle_presence_event(&self, event: PresenceEvent) {
        if matches!(event.status, AgentStatus::Online) {
            self.flush_agent(&event.agent_id).await;
        }
    }

    async fn tick(&self) {
        let now = Utc::now();
        let messages = match self.store.list_queued().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("delivery worker: queue scan failed: {e}");
                return;
            }
        };
        for msg in messages {
            if let Err(e) = self.process_message(msg, now, false).await {
                tracing::error!("delivery worker: error processing message: {e}");
            }
        }
    }

    #[tracing::instrument(skip_all, fields(agent = %agent_id))]
    async fn flush_agent(&self, agent_id: &super::types::AgentId) {
        let now = Utc::now();
        match self.store.list_queued_for(agent_id).await {
            Ok(messages) => {
                for msg in messages {
                    if let Err(e) = self.process_message(msg, now, true).await {
                        tracing::error!("fast-path flush: error processing message: {e}");
                    }
                }
            }
            Err(e) => tracing::warn!("fast-path flush: failed to list queue: {e}"),
        }
    }

    /// One message's worth of delivery logic. `force` is set by the fast path: it
    /// skips the ladder's `is_due` gate (the message is due immediately regardless
    /// of its position on the ladder) but still respects the retry budget and
    /// presence.
    #[tracing::instrument(skip_all, fields(msg_id = %msg.id, to = %msg.to_agent))]
    async fn process_message(&self, mut msg: Message, now: DateTime<Utc>, force: bool) -> Result<()> {
        let recipient = match self.presence.get(&msg.to_agent).await? {
            Some(agent) => agent,
            None => {
                let expected = msg.retry_count;
                self.scheduler.mark_recipient_missing(&mut msg, now);
                return self.try_update(&msg, expected).await;
            }
        };

        if recipient.status != AgentStatus::Online {
            return Ok(());
        }

        if self.scheduler.attempts_exhausted(&msg) {
            let expected = msg.retry_count;
            self.scheduler.mark_exhausted(&mut msg, now);
            return self.try_update(&msg, expected).await;
        }

        if force {
            msg.last_attempt_at = None;
        } else if !self.scheduler.is_due(&msg, now) {
            return Ok(());
        }

        let expected = msg.retry_count;
        let outcome = dispatch::dispatch(&self.client, &msg, &recipient).await;
        self.scheduler.apply_outcome(&mut msg, outcome, now);
        self.try_update(&msg, expected).await
    }

    async fn try_update(&self, msg: &Message, expected_retry_count: u32) -> Result<()> {
        if !self.store.update(msg, expected_retry_count).await? {
            tracing::debug!(msg_id = %msg.id, "lost the race on a conditional update, discarding");
        }
        Ok(())
    }
}
