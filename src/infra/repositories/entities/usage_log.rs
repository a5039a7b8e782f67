//! Assistant usage log entity.

use sea_orm::entity::prelude::*;

use crate::domain::{UsageLog, UsageRecord};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ai_usage_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub model: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub tool_calls: i32,
    pub rounds: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UsageLog {
    fn from(model: Model) -> Self {
        UsageLog {
            id: model.id,
            record: UsageRecord {
                user_id: model.user_id,
                team_id: model.team_id,
                model: model.model,
                prompt_tokens: model.prompt_tokens,
                completion_tokens: model.completion_tokens,
                tool_calls: model.tool_calls,
                rounds: model.rounds,
            },
            created_at: model.created_at,
        }
    }
}
