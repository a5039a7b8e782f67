//! Issue entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Issue, Priority};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub team_id: Uuid,
    pub project_id: Uuid,
    pub number: i32,
    pub title: String,
    pub description: Option<String>,
    pub status_id: Uuid,
    pub priority: String,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub due_date: Option<Date>,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Issue {
    fn from(model: Model) -> Self {
        Issue {
            id: model.id,
            team_id: model.team_id,
            project_id: model.project_id,
            number: model.number,
            title: model.title,
            description: model.description,
            status_id: model.status_id,
            priority: model.priority.parse().unwrap_or(Priority::None),
            assignee_id: model.assignee_id,
            reporter_id: model.reporter_id,
            due_date: model.due_date,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
