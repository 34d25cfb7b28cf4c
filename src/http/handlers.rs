// SPDX-License-Identifier: MIT

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::store::AgentDirectory;
use crate::core::{self, Agent, AgentId, AgentStatus, MessageId, MessageStatus, PresenceEvent};
use crate::error::{Error, Result};
use crate::http::auth;
use crate::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub webhook_url: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterAgentResponse {
    pub id: String,
    pub api_key: String,
    pub secret: String,
}

/// `POST /api/agents/register`. Minimal registration endpoint, implemented only
/// so the core has a real caller to register agents with.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<Json<RegisterAgentResponse>> {
    let api_key = auth::generate_api_key();
    let agent = Agent {
        id: AgentId::new(),
        name: req.name,
        description: req.description,
        status: AgentStatus::Offline,
        webhook_url: req.webhook_url,
        secret: auth::generate_webhook_secret(),
        api_key_hash: auth::hash_api_key(&api_key),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    state.agents.insert_agent(agent.clone()).await?;

    Ok(Json(RegisterAgentResponse {
        id: agent.id.0,
        api_key,
        secret: agent.secret,
    }))
}

#[derive(Debug, Serialize)]
pub struct PublicAgent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: AgentStatus,
}

impl From<Agent> for PublicAgent {
    fn from(a: Agent) -> Self {
        Self {
            id: a.id.0,
            name: a.name,
            description: a.description,
            status: a.status,
        }
    }
}

/// `GET /api/agents/:id`. Unauthenticated public lookup -- no secrets leave this
/// handler.
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicAgent>> {
    let agent = state
        .agents
        .get_agent(&AgentId(id.clone()))
        .await?
        .ok_or_else(|| Error::NotFound(format!("agent {id}")))?;
    Ok(Json(agent.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AgentStatus,
}

/// `PUT /api/agents/:id/status`. On an `offline -> online` transition, notifies
/// the fast path -- both the in-process channel and, when configured, the Redis
/// pub/sub channel other processes subscribe to.
pub async fn update_agent_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<PublicAgent>> {
    let agent_id = AgentId(id);
    let existing = state
        .agents
        .get_agent(&agent_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;
    auth::authenticate(&headers, &existing)?;

    let was_offline = matches!(existing.status, AgentStatus::Offline);

    let updated = state
        .agents
        .update_agent_status(&agent_id, req.status)
        .await?
        .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;

    if was_offline && matches!(req.status, AgentStatus::Online) {
        let event = PresenceEvent {
            agent_id: agent_id.clone(),
            status: AgentStatus::Online,
        };
        state.fast_path.notify(event.clone());

        if let Some(dsn) = &state.redis_dsn {
            if let Err(e) = crate::redis::publish_presence_event(dsn, &event).await {
                tracing::warn!("failed to publish presence event to redis: {e}");
            }
        }
    }

    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub from_agent: String,
    pub to_agent: String,
    pub content: JsonValue,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: String,
    pub status: MessageStatus,
}

/// `POST /api/messages/send`. Authenticates as `from_agent`, then calls
/// `core::enqueue` and returns immediately with `status = queued` -- delivery
/// happens out of band on the worker's schedule.
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    if !state.rate_limiter.check(&auth::bearer_token(&headers).unwrap_or_default()) {
        return Err(Error::RateLimited);
    }

    let from_id = AgentId(req.from_agent);
    let sender = state
        .agents
        .get_agent(&from_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("agent {from_id}")))?;
    auth::authenticate(&headers, &sender)?;

    let msg = core::enqueue(
        state.messages.as_ref(),
        from_id,
        AgentId(req.to_agent),
        req.content,
    )
    .await?;

    Ok(Json(SendMessageResponse {
        message_id: msg.id.0,
        status: msg.status,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageStatusResponse {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub status: MessageStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// `GET /api/messages/:id`. Only the sender or recipient may read a message's
/// status.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageStatusResponse>> {
    let msg = state
        .messages
        .get(&MessageId(id.clone()))
        .await?
        .ok_or_else(|| Error::NotFound(format!("message {id}")))?;

    let token = auth::bearer_token(&headers)?;
    let caller_hash = auth::hash_api_key(&token);

    let mut is_participant = false;
    for participant in [&msg.from_agent, &msg.to_agent] {
        if let Some(agent) = state.agents.get_agent(participant).await? {
            if agent.api_key_hash == caller_hash {
                is_participant = true;
                break;
            }
        }
    }
    if !is_participant {
        return Err(Error::Unauthorized);
    }

    Ok(Json(MessageStatusResponse {
        id: msg.id.0,
        from_agent: msg.from_agent.0,
        to_agent: msg.to_agent.0,
        status: msg.status,
        retry_count: msg.retry_count,
        created_at: msg.created_at,
        last_attempt_at: msg.last_attempt_at,
        delivered_at: msg.delivered_at,
        error: msg.error,
    }))
}
