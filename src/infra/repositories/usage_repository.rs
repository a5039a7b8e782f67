//! Assistant usage log persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::usage_log::{self, Entity as UsageEntity};
use crate::domain::{UsageLog, UsageRecord};
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn record(&self, record: UsageRecord) -> AppResult<UsageLog>;

    /// Logs created at or after `since`; `user_id = None` covers every user
    async fn list_since(&self, user_id: Option<Uuid>, since: DateTime<Utc>) -> AppResult<Vec<UsageLog>>;
}

pub struct UsageStore {
    db: DatabaseConnection,
}

impl UsageStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageRepository for UsageStore {
    async fn record(&self, record: UsageRecord) -> AppResult<UsageLog> {
        let model = usage_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(record.user_id),
            team_id: Set(record.team_id),
            model: Set(record.model),
            prompt_tokens: Set(record.prompt_tokens),
            completion_tokens: Set(record.completion_tokens),
            tool_calls: Set(record.tool_calls),
            rounds: Set(record.rounds),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        Ok(UsageLog::from(model))
    }

    async fn list_since(&self, user_id: Option<Uuid>, since: DateTime<Utc>) -> AppResult<Vec<UsageLog>> {
        let mut query = UsageEntity::find().filter(usage_log::Column::CreatedAt.gte(since));
        if let Some(user_id) = user_id {
            query = query.filter(usage_log::Column::UserId.eq(user_id));
        }

        let models = query
            .order_by_desc(usage_log::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(UsageLog::from).collect())
    }
}
