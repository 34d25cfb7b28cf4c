// SPDX-License-Identifier: MIT

use serde_json::Value as Json;

use super::message::Message;
use super::store::MessageStore;
use super::types::AgentId;
use crate::error::Result;

/// Admits a new message in `queued` state. Deliberately does not check recipient
/// existence or presence -- dispatch time does that instead, decoupling
/// admission from presence.
pub async fn enqueue(
    store: &dyn MessageStore,
    from_agent: AgentId,
    to_agent: AgentId,
    content: Json,
) -> Result<Message> {
    let msg = Message::new_queued(from_agent, to_agent, content);
    store.insert(msg.clone()).await?;
    Ok(msg)
}
