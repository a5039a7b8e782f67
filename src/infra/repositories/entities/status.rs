//! Workflow status entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Status, StatusCategory};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "statuses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub category: String,
    pub color: String,
    pub position: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Status {
    fn from(model: Model) -> Self {
        Status {
            id: model.id,
            team_id: model.team_id,
            name: model.name,
            category: model.category.parse().unwrap_or(StatusCategory::Backlog),
            color: model.color,
            position: model.position,
            created_at: model.created_at,
        }
    }
}
