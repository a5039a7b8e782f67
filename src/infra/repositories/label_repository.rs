//! Label persistence.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::label::{self, Entity as LabelEntity};
use crate::domain::Label;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LabelRepository: Send + Sync {
    async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Label>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Label>>;

    async fn find_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<Label>>;

    /// Case-insensitive lookup within a team
    async fn find_by_name(&self, team_id: Uuid, name: &str) -> AppResult<Option<Label>>;

    async fn create(&self, team_id: Uuid, name: String, color: String) -> AppResult<Label>;

    async fn update(&self, id: Uuid, name: Option<String>, color: Option<String>) -> AppResult<Label>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct LabelStore {
    db: DatabaseConnection,
}

impl LabelStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LabelRepository for LabelStore {
    async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Label>> {
        let models = LabelEntity::find()
            .filter(label::Column::TeamId.eq(team_id))
            .order_by_asc(label::Column::Name)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Label::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Label>> {
        let result = LabelEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Label::from))
    }

    async fn find_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<Label>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = LabelEntity::find()
            .filter(label::Column::Id.is_in(ids))
            .order_by_asc(label::Column::Name)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Label::from).collect())
    }

    async fn find_by_name(&self, team_id: Uuid, name: &str) -> AppResult<Option<Label>> {
        let result = LabelEntity::find()
            .filter(label::Column::TeamId.eq(team_id))
            .filter(Expr::expr(Func::lower(Expr::col(label::Column::Name))).eq(name.to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(result.map(Label::from))
    }

    async fn create(&self, team_id: Uuid, name: String, color: String) -> AppResult<Label> {
        let model = label::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            name: Set(name),
            color: Set(color),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        Ok(Label::from(model))
    }

    async fn update(&self, id: Uuid, name: Option<String>, color: Option<String>) -> AppResult<Label> {
        let mut active: label::ActiveModel = LabelEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?
            .into();

        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(color) = color {
            active.color = Set(color);
        }

        let model = active.update(&self.db).await?;
        Ok(Label::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = LabelEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_name_filters_in_sql() {
        let team_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![label::Model {
                id: Uuid::new_v4(),
                team_id,
                name: "Bug".to_string(),
                color: "#FF0000".to_string(),
                created_at: Utc::now(),
            }]])
            .into_connection();

        let store = LabelStore::new(db.clone());
        let found = store.find_by_name(team_id, "BUG").await.unwrap();
        assert_eq!(found.map(|l| l.name), Some("Bug".to_string()));

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("LOWER("));
        assert!(log.contains("\"bug\""));
        assert!(!log.contains("\"BUG\""));
    }

    #[tokio::test]
    async fn test_find_by_name_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<label::Model>::new()])
            .into_connection();

        let store = LabelStore::new(db);
        assert!(store.find_by_name(Uuid::new_v4(), "docs").await.unwrap().is_none());
    }
}
