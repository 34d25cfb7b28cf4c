// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::message::{Agent, Message};
use super::types::{AgentId, AgentStatus, MessageId};
use crate::error::Result;

/// The durable queue the rest of the core agrees on. A Postgres/SQLite-backed
/// implementation (production) and an in-memory implementation (tests, and a
/// no-database fallback) are interchangeable behind this trait -- the worker and
/// the HTTP boundary never know which one they're talking to.
///
/// `update` is the linchpin of the concurrency model: it is conditional on the
/// caller's observed `retry_count`, so two workers racing on the same message
/// can never both believe they won.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, msg: Message) -> Result<()>;
    async fn get(&self, id: &MessageId) -> Result<Option<Message>>;
    async fn list_queued(&self) -> Result<Vec<Message>>;
    async fn list_queued_for(&self, to_agent: &AgentId) -> Result<Vec<Message>>;

    /// Persists `msg`'s mutable fields iff the stored row is still `queued` with
    /// `retry_count == expected_retry_count`. Returns whether the write applied; a
    /// losing writer must discard its outcome rather than retry the write -- the
    /// message has already been advanced by a peer.
    async fn update(&self, msg: &Message, expected_retry_count: u32) -> Result<bool>;
}

/// Read-only from the core's perspective. Presence writes happen only through
/// the HTTP boundary's status-update handler.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn get(&self, id: &AgentId) -> Result<Option<Agent>>;
}

/// The agent-registration side of the same backend, used only by the HTTP
/// boundary (registration, status updates, public lookups) -- the delivery core
/// never reaches for anything beyond [`PresenceStore::get`]. Extending
/// `PresenceStore` rather than duplicating `get` keeps one backend implementation
/// per storage technology instead of two half-overlapping ones.
#[async_trait]
pub trait AgentDirectory: PresenceStore {
    async fn insert_agent(&self, agent: Agent) -> Result<()>;
    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>>;
    async fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> Result<Option<Agent>>;
}
