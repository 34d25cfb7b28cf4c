// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::types::{AgentId, AgentStatus};

/// The record carried on the best-effort presence-change bus. Opaque to
/// everything except its two fields -- the in-process channel and the optional
/// Redis pub/sub forwarder both move this same type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub agent_id: AgentId,
    pub status: AgentStatus,
}

/// Capacity of the in-process fast-path channel. Deliberately small: the fast path
/// is advisory, so a burst of presence changes beyond this bound simply falls back
/// to the poll loop for the overflowed agents rather than applying backpressure
/// anywhere that matters.
const FAST_PATH_CHANNEL_CAPACITY: usize = 256;

pub fn fast_path_channel() -> (FastPathSender, FastPathReceiver) {
    let (tx, rx) = mpsc::channel(FAST_PATH_CHANNEL_CAPACITY);
    (FastPathSender(tx), FastPathReceiver(rx))
}

/// Cloneable handle fed by the HTTP boundary (and, when configured, the Redis
/// subscriber). `notify` never fails loudly -- a full or closed channel is logged
/// and swallowed, per the fast path's "purely advisory" contract.
#[derive(Clone)]
pub struct FastPathSender(mpsc::Sender<PresenceEvent>);

impl FastPathSender {
    pub fn notify(&self, event: PresenceEvent) {
        if let Err(e) = self.0.try_send(event) {
            tracing::warn!("fast-path channel dropped a presence event: {e}");
        }
    }
}

pub struct FastPathReceiver(mpsc::Receiver<PresenceEvent>);

impl FastPathReceiver {
    pub async fn recv(&mut self) -> Option<PresenceEvent> {
        self.0.recv().await
    }
}
