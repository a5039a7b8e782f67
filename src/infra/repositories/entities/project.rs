//! Project entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Project, ProjectStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub lead_id: Option<Uuid>,
    pub target_date: Option<Date>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub archived_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Project {
    fn from(model: Model) -> Self {
        Project {
            id: model.id,
            team_id: model.team_id,
            name: model.name,
            description: model.description,
            status: model.status.parse().unwrap_or(ProjectStatus::Planned),
            lead_id: model.lead_id,
            target_date: model.target_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
            archived_at: model.archived_at,
        }
    }
}
