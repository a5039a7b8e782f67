//! Workflow status persistence.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::status::{self, Entity as StatusEntity};
use crate::domain::{NewStatus, Status, StatusPatch};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Team statuses ordered by position
    async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Status>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Status>>;

    async fn create(&self, new: NewStatus) -> AppResult<Status>;

    async fn update(&self, id: Uuid, patch: StatusPatch) -> AppResult<Status>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub(crate) async fn insert_status<C: ConnectionTrait>(conn: &C, new: NewStatus) -> AppResult<Status> {
    let model = status::ActiveModel {
        id: Set(Uuid::new_v4()),
        team_id: Set(new.team_id),
        name: Set(new.name),
        category: Set(new.category.as_str().to_string()),
        color: Set(new.color),
        position: Set(new.position),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(Status::from(model))
}

pub(crate) async fn statuses_of_team<C: ConnectionTrait>(
    conn: &C,
    team_id: Uuid,
) -> AppResult<Vec<Status>> {
    let models = StatusEntity::find()
        .filter(status::Column::TeamId.eq(team_id))
        .order_by_asc(status::Column::Position)
        .order_by_asc(status::Column::CreatedAt)
        .all(conn)
        .await?;

    Ok(models.into_iter().map(Status::from).collect())
}

pub struct StatusStore {
    db: DatabaseConnection,
}

impl StatusStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StatusRepository for StatusStore {
    async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Status>> {
        statuses_of_team(&self.db, team_id).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Status>> {
        let result = StatusEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Status::from))
    }

    async fn create(&self, new: NewStatus) -> AppResult<Status> {
        insert_status(&self.db, new).await
    }

    async fn update(&self, id: Uuid, patch: StatusPatch) -> AppResult<Status> {
        let mut active: status::ActiveModel = StatusEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?
            .into();

        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(color) = patch.color {
            active.color = Set(color);
        }
        if let Some(position) = patch.position {
            active.position = Set(position);
        }

        let model = active.update(&self.db).await?;
        Ok(Status::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = StatusEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
