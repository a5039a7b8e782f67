//! Team membership join table.

use sea_orm::entity::prelude::*;

use crate::domain::{TeamMember, TeamRole};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "team_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub team_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TeamMember {
    fn from(model: Model) -> Self {
        TeamMember {
            team_id: model.team_id,
            user_id: model.user_id,
            // Unknown values only appear through manual edits; treat as least privilege.
            role: model.role.parse().unwrap_or(TeamRole::Viewer),
            joined_at: model.joined_at,
        }
    }
}
