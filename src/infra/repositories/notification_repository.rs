//! Notification persistence. Every query is scoped to the recipient.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use super::entities::notification::{self, Entity as NotificationEntity};
use crate::domain::{NewNotification, Notification};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Newest first, with the total count
    async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<Notification>, u64)>;

    async fn unread_count(&self, user_id: Uuid) -> AppResult<u64>;

    async fn create(&self, new: NewNotification) -> AppResult<Notification>;

    /// Fails with `NotFound` when the notification belongs to someone else
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification>;

    /// Returns the number of rows changed
    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64>;

    async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()>;
}

pub struct NotificationStore {
    db: DatabaseConnection,
}

impl NotificationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for NotificationStore {
    async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<Notification>, u64)> {
        let mut query = NotificationEntity::find().filter(notification::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notification::Column::ReadAt.is_null());
        }

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_desc(notification::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok((models.into_iter().map(Notification::from).collect(), total))
    }

    async fn unread_count(&self, user_id: Uuid) -> AppResult<u64> {
        Ok(NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::ReadAt.is_null())
            .count(&self.db)
            .await?)
    }

    async fn create(&self, new: NewNotification) -> AppResult<Notification> {
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            kind: Set(new.kind.as_str().to_string()),
            title: Set(new.title),
            body: Set(new.body),
            link: Set(new.link),
            read_at: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        Ok(Notification::from(model))
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        let model = NotificationEntity::find_by_id(id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if model.read_at.is_some() {
            return Ok(Notification::from(model));
        }

        let mut active: notification::ActiveModel = model.into();
        active.read_at = Set(Some(Utc::now()));
        let model = active.update(&self.db).await?;
        Ok(Notification::from(model))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = NotificationEntity::update_many()
            .col_expr(notification::Column::ReadAt, Expr::value(Utc::now()))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::ReadAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = NotificationEntity::delete_many()
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
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

    fn row(user_id: Uuid, read: bool) -> notification::Model {
        notification::Model {
            id: Uuid::new_v4(),
            user_id,
            kind: "issue_assigned".to_string(),
            title: "You were assigned #5".to_string(),
            body: "No description".to_string(),
            link: None,
            read_at: read.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mark_read_of_foreign_notification_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()])
            .into_connection();
        let owner = Uuid::new_v4();

        let store = NotificationStore::new(db.clone());
        let result = store.mark_read(Uuid::new_v4(), owner).await;
        assert!(matches!(result, Err(AppError::NotFound)));

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("\\\"user_id\\\" = $2"));
        assert!(log.contains(&owner.to_string()));
    }

    #[tokio::test]
    async fn test_mark_read_keeps_existing_timestamp() {
        let owner = Uuid::new_v4();
        let already = row(owner, true);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![already.clone()]])
            .into_connection();

        let store = NotificationStore::new(db);
        let notification = store.mark_read(already.id, owner).await.unwrap();
        assert_eq!(notification.read_at, already.read_at);
    }
}
