// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::message::{Agent, Message};
use crate::core::store::{AgentDirectory, MessageStore, PresenceStore};
use crate::core::types::{AgentId, AgentStatus, MessageId, MessageStatus};
use crate::error::Result;

/// The no-database fallback and deterministic test double. Guards each table
/// behind its own [`Mutex`] so the conditional-update discipline is exercised
/// for real rather than assumed away -- multiple workers sharing one
/// `InMemoryStore` race exactly the way they would against Postgres.
#[derive(Default)]
pub struct InMemoryStore {
    messages: Mutex<HashMap<String, Message>>,
    agents: Mutex<HashMap<String, Agent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_agent(&self, agent: Agent) {
        self.agents.lock().expect("agents mutex poisoned").insert(agent.id.0.clone(), agent);
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert(&self, msg: Message) -> Result<()> {
        self.messages
            .lock()
            .expect("messages mutex poisoned")
            .insert(msg.id.0.clone(), msg);
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self
            .messages
            .lock()
            .expect("messages mutex poisoned")
            .get(&id.0)
            .cloned())
    }

    async fn list_queued(&self) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .expect("messages mutex poisoned")
            .values()
            .filter(|m| matches!(m.status, MessageStatus::Queued))
            .cloned()
            .collect())
    }

    async fn list_queued_for(&self, to_agent: &AgentId) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .expect("messages mutex poisoned")
            .values()
            .filter(|m| matches!(m.status, MessageStatus::Queued) && m.to_agent == *to_agent)
            .cloned()
            .collect())
    }

    async fn update(&self, msg: &Message, expected_retry_count: u32) -> Result<bool> {
        let mut guard = self.messages.lock().expect("messages mutex poisoned");
        let Some(current) = guard.get(&msg.id.0) else {
            return Ok(false);
        };
        if !matches!(current.status, MessageStatus::Queued) || current.retry_count != expected_retry_count {
            return Ok(false);
        }
        guard.insert(msg.id.0.clone(), msg.clone());
        Ok(true)
    }
}

#[async_trait]
impl PresenceStore for InMemoryStore {
    async fn get(&self, id: &AgentId) -> Result<Option<Agent>> {
        Ok(self
            .agents
            .lock()
            .expect("agents mutex poisoned")
            .get(&id.0)
            .cloned())
    }
}

#[async_trait]
impl AgentDirectory for InMemoryStore {
    async fn insert_agent(&self, agent: Agent) -> Result<()> {
        self.seed_agent(agent);
        Ok(())
    }

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>> {
        Ok(self.agents.lock().expect("agents mutex poisoned").get(&id.0).cloned())
    }

    async fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> Result<Option<Agent>> {
        let mut guard = self.agents.lock().expect("agents mutex poisoned");
        let Some(agent) = guard.get_mut(&id.0) else {
            return Ok(None);
        };
        agent.status = status;
        agent.updated_at = chrono::Utc::now();
        Ok(Some(agent.clone()))
    }
}
