//! Comment persistence.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::comment::{self, Entity as CommentEntity};
use crate::domain::Comment;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments of an issue, oldest first
    async fn list_by_issue(&self, issue_id: Uuid) -> AppResult<Vec<Comment>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Comment>>;

    async fn create(&self, issue_id: Uuid, author_id: Uuid, body: String) -> AppResult<Comment>;

    async fn update(&self, id: Uuid, body: String) -> AppResult<Comment>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct CommentStore {
    db: DatabaseConnection,
}

impl CommentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentRepository for CommentStore {
    async fn list_by_issue(&self, issue_id: Uuid) -> AppResult<Vec<Comment>> {
        let models = CommentEntity::find()
            .filter(comment::Column::IssueId.eq(issue_id))
            .order_by_asc(comment::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Comment::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let result = CommentEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Comment::from))
    }

    async fn create(&self, issue_id: Uuid, author_id: Uuid, body: String) -> AppResult<Comment> {
        let now = Utc::now();
        let model = comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            issue_id: Set(issue_id),
            author_id: Set(author_id),
            body: Set(body),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        Ok(Comment::from(model))
    }

    async fn update(&self, id: Uuid, body: String) -> AppResult<Comment> {
        let mut active: comment::ActiveModel = CommentEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?
            .into();
        active.body = Set(body);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Comment::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = CommentEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
