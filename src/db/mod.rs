// SPDX-License-Identifier: MIT

pub mod memory;
pub mod models;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, Schema,
};

use crate::core::message::{Agent, Message};
use crate::core::store::{AgentDirectory, MessageStore, PresenceStore};
use crate::core::types::{AgentId, AgentStatus, MessageId};
use crate::error::Result;
use models::{agent, message};

/// Opens the configured database connection and makes sure `messages`/`agents`
/// exist. There's no standalone migration crate here: like a project bootstrapping
/// off `sea_orm::Schema` before it grows a migrations directory, the tables are
/// derived straight from the entities so the schema can never drift from the
/// structs the rest of the crate compiles against.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    ensure_schema(&db).await?;
    Ok(db)
}

async fn ensure_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut agents_stmt = schema.create_table_from_entity(agent::Entity);
    agents_stmt.if_not_exists();
    db.execute(backend.build(&agents_stmt)).await?;

    let mut messages_stmt = schema.create_table_from_entity(message::Entity);
    messages_stmt.if_not_exists();
    db.execute(backend.build(&messages_stmt)).await?;

    for stmt in schema.create_index_from_entity(message::Entity) {
        let mut stmt = stmt;
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    Ok(())
}

/// The production [`MessageStore`]/[`PresenceStore`] implementation, backed by a
/// single SeaORM connection (Postgres in a real deployment, SQLite for local runs).
#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for SeaOrmStore {
    async fn insert(&self, msg: Message) -> Result<()> {
        message::Model::from_domain(&msg).insert(&self.db).await?;
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<Option<Message>> {
        let row = message::Entity::find_by_id(id.0.clone())
            .one(&self.db)
            .await?;
        Ok(row.map(message::Model::into_domain))
    }

    async fn list_queued(&self) -> Result<Vec<Message>> {
        let rows = message::Entity::find()
            .filter(message::Column::Status.eq(message::MessageStatus::Queued))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(message::Model::into_domain).collect())
    }

    async fn list_queued_for(&self, to_agent: &AgentId) -> Result<Vec<Message>> {
        let rows = message::Entity::find()
            .filter(message::Column::Status.eq(message::MessageStatus::Queued))
            .filter(message::Column::ToAgent.eq(to_agent.0.clone()))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(message::Model::into_domain).collect())
    }

    /// Conditional on the database side, not in Rust: `UPDATE messages SET ... WHERE
    /// id = $1 AND status = 'queued' AND retry_count = $2`. A plain `find_by_id` then
    /// `ActiveModel::update` would check the condition in Rust and then issue an
    /// unconditional write keyed only on `id`, which is a check-then-act race between
    /// two workers reading the same row before either writes -- the filter has to ride
    /// along with the `UPDATE` statement itself for the database to arbitrate the race.
    async fn update(&self, msg: &Message, expected_retry_count: u32) -> Result<bool> {
        let mut active = message::Model::from_domain(msg);
        active.id = ActiveValue::NotSet;

        let result = message::Entity::update_many()
            .set(active)
            .filter(message::Column::Id.eq(msg.id.0.clone()))
            .filter(message::Column::Status.eq(message::MessageStatus::Queued))
            .filter(message::Column::RetryCount.eq(expected_retry_count as i32))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl PresenceStore for SeaOrmStore {
    async fn get(&self, id: &AgentId) -> Result<Option<Agent>> {
        let row = agent::Entity::find_by_id(id.0.clone()).one(&self.db).await?;
        Ok(row.map(agent::Model::into_domain))
    }
}

/// Agent registration/lookup used by the HTTP boundary, which needs more than
/// the narrow [`PresenceStore::get`] the delivery core relies on.
#[async_trait]
impl AgentDirectory for SeaOrmStore {
    async fn insert_agent(&self, agent: Agent) -> Result<()> {
        agent::Model::from_domain(&agent).insert(&self.db).await?;
        Ok(())
    }

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>> {
        let row = agent::Entity::find_by_id(id.0.clone()).one(&self.db).await?;
        Ok(row.map(agent::Model::into_domain))
    }

    async fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> Result<Option<Agent>> {
        let Some(existing) = agent::Entity::find_by_id(id.0.clone()).one(&self.db).await? else {
            return Ok(None);
        };
        let mut active: agent::ActiveModel = existing.into();
        active.status = sea_orm::ActiveValue::Set(match status {
            AgentStatus::Online => agent::AgentStatus::Online,
            AgentStatus::Offline => agent::AgentStatus::Offline,
        });
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now());
        let updated = active.update(&self.db).await?;
        Ok(Some(updated.into_domain()))
    }
}

impl SeaOrmStore {
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MessageStatus;
    use serde_json::json;

    async fn store() -> SeaOrmStore {
        let conn = connect("sqlite::memory:").await.unwrap();
        SeaOrmStore::new(conn)
    }

    #[tokio::test]
    async fn conditional_update_rejects_stale_retry_count() {
        let store = store().await;
        let mut msg = Message::new_queued(AgentId::new(), AgentId::new(), json!({}));
        MessageStore::insert(&store, msg.clone()).await.unwrap();

        msg.retry_count = 1;
        // Claims the write was against retry_count=5, but the stored row is still 0.
        assert!(!store.update(&msg, 5).await.unwrap());

        assert!(store.update(&msg, 0).await.unwrap());
        let stored = MessageStore::get(&store, &msg.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn conditional_update_rejects_once_terminal() {
        let store = store().await;
        let mut msg = Message::new_queued(AgentId::new(), AgentId::new(), json!({}));
        MessageStore::insert(&store, msg.clone()).await.unwrap();

        msg.status = MessageStatus::Delivered;
        assert!(store.update(&msg, 0).await.unwrap());

        // A second writer racing on the same observed retry_count must lose now
        // that the row is terminal -- the `Status = Queued` filter in the `UPDATE`
        // statement itself is what rejects it, not a Rust-side check.
        let mut racer = msg.clone();
        racer.status = MessageStatus::Failed;
        assert!(!store.update(&racer, 0).await.unwrap());
    }
}
