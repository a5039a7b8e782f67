//! Label entity.

use sea_orm::entity::prelude::*;

use crate::domain::Label;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "labels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Label {
    fn from(model: Model) -> Self {
        Label {
            id: model.id,
            team_id: model.team_id,
            name: model.name,
            color: model.color,
            created_at: model.created_at,
        }
    }
}
