// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::types::{AgentId, AgentStatus, MessageId, MessageStatus};

/// The durable unit the relay moves between agents. `status` only ever moves
/// forward: `queued` to `delivered` or `failed`, both terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from_agent: AgentId,
    pub to_agent: AgentId,
    pub content: Json,
    pub status: MessageStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Message {
    pub fn new_queued(from_agent: AgentId, to_agent: AgentId, content: Json) -> Self {
        Self {
            id: MessageId::new(),
            from_agent,
            to_agent,
            content,
            status: MessageStatus::Queued,
            retry_count: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
            delivered_at: None,
            error: None,
        }
    }

    /// `base(msg)` from the retry scheduler's definition: the instant attempts are
    /// measured from, which is the last attempt if there was one, else enqueue time.
    pub fn retry_base(&self) -> DateTime<Utc> {
        self.last_attempt_at.unwrap_or(self.created_at)
    }
}

/// The presence-view projection of an agent that the core reads. Registration fields
/// (name, description, api key) live alongside it for the HTTP boundary's benefit but
/// are not consulted by the delivery subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    pub status: AgentStatus,
    pub webhook_url: String,
    pub secret: String,
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
