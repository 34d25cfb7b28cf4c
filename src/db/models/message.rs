// SPDX-License-Identifier: MIT

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub from_agent: String,
    #[sea_orm(indexed)]
    pub to_agent: String,
    pub content: Json,
    pub status: MessageStatus,
    pub retry_count: i32,
    pub created_at: DateTimeUtc,
    pub last_attempt_at: Option<DateTimeUtc>,
    pub delivered_at: Option<DateTimeUtc>,
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_domain(self) -> crate::core::Message {
        crate::core::Message {
            id: crate::core::MessageId(self.id),
            from_agent: crate::core::AgentId(self.from_agent),
            to_agent: crate::core::AgentId(self.to_agent),
            content: self.content,
            status: match self.status {
                MessageStatus::Queued => crate::core::MessageStatus::Queued,
                MessageStatus::Delivered => crate::core::MessageStatus::Delivered,
                MessageStatus::Failed => crate::core::MessageStatus::Failed,
            },
            retry_count: self.retry_count.max(0) as u32,
            created_at: self.created_at,
            last_attempt_at: self.last_attempt_at,
            delivered_at: self.delivered_at,
            error: self.error,
        }
    }

    pub fn from_domain(msg: &crate::core::Message) -> ActiveModel {
        ActiveModel {
            id: sea_orm::ActiveValue::Set(msg.id.0.clone()),
            from_agent: sea_orm::ActiveValue::Set(msg.from_agent.0.clone()),
            to_agent: sea_orm::ActiveValue::Set(msg.to_agent.0.clone()),
            content: sea_orm::ActiveValue::Set(msg.content.clone()),
            status: sea_orm::ActiveValue::Set(match msg.status {
                crate::core::MessageStatus::Queued => MessageStatus::Queued,
                crate::core::MessageStatus::Delivered => MessageStatus::Delivered,
                crate::core::MessageStatus::Failed => MessageStatus::Failed,
            }),
            retry_count: sea_orm::ActiveValue::Set(msg.retry_count as i32),
            created_at: sea_orm::ActiveValue::Set(msg.created_at),
            last_attempt_at: sea_orm::ActiveValue::Set(msg.last_attempt_at),
            delivered_at: sea_orm::ActiveValue::Set(msg.delivered_at),
            error: sea_orm::ActiveValue::Set(msg.error.clone()),
        }
    }
}
