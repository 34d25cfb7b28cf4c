// SPDX-License-Identifier: MIT

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "offline")]
    Offline,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub webhook_url: String,
    pub secret: String,
    pub api_key_hash: String,
    pub status: AgentStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_domain(self) -> crate::core::Agent {
        crate::core::Agent {
            id: crate::core::AgentId(self.id),
            name: self.name,
            description: self.description,
            status: match self.status {
                AgentStatus::Online => crate::core::AgentStatus::Online,
                AgentStatus::Offline => crate::core::AgentStatus::Offline,
            },
            webhook_url: self.webhook_url,
            secret: self.secret,
            api_key_hash: self.api_key_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn from_domain(agent: &crate::core::Agent) -> ActiveModel {
        ActiveModel {
            id: sea_orm::ActiveValue::Set(agent.id.0.clone()),
            name: sea_orm::ActiveValue::Set(agent.name.clone()),
            description: sea_orm::ActiveValue::Set(agent.description.clone()),
            webhook_url: sea_orm::ActiveValue::Set(agent.webhook_url.clone()),
            secret: sea_orm::ActiveValue::Set(agent.secret.clone()),
            api_key_hash: sea_orm::ActiveValue::Set(agent.api_key_hash.clone()),
            status: sea_orm::ActiveValue::Set(match agent.status {
                crate::core::AgentStatus::Online => AgentStatus::Online,
                crate::core::AgentStatus::Offline => AgentStatus::Offline,
            }),
            created_at: sea_orm::ActiveValue::Set(agent.created_at),
            updated_at: sea_orm::ActiveValue::Set(agent.updated_at),
        }
    }
}
