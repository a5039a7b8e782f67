//! Project persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{extension::postgres::PgExpr, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::contains_pattern;
use super::entities::project::{self, Entity as ProjectEntity};
use crate::domain::{NewProject, Project, ProjectPatch, ProjectStatus};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn list_by_team(&self, team_id: Uuid, include_archived: bool) -> AppResult<Vec<Project>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Project>>;

    async fn create(&self, new: NewProject) -> AppResult<Project>;

    async fn update(&self, id: Uuid, patch: ProjectPatch) -> AppResult<Project>;

    /// `Some` archives at that instant, `None` unarchives
    async fn set_archived(&self, id: Uuid, archived_at: Option<DateTime<Utc>>) -> AppResult<Project>;

    /// Hard delete; issues cascade
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Case-insensitive name match across the given teams
    async fn search(&self, team_ids: Vec<Uuid>, query: String, limit: u64) -> AppResult<Vec<Project>>;
}

pub struct ProjectStore {
    db: DatabaseConnection,
}

impl ProjectStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(&self, id: Uuid) -> AppResult<project::Model> {
        ProjectEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl ProjectRepository for ProjectStore {
    async fn list_by_team(&self, team_id: Uuid, include_archived: bool) -> AppResult<Vec<Project>> {
        let mut query = ProjectEntity::find().filter(project::Column::TeamId.eq(team_id));
        if !include_archived {
            query = query.filter(project::Column::ArchivedAt.is_null());
        }

        let models = query
            .order_by_desc(project::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Project::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Project>> {
        let result = ProjectEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Project::from))
    }

    async fn create(&self, new: NewProject) -> AppResult<Project> {
        let now = Utc::now();
        let model = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(new.team_id),
            name: Set(new.name),
            description: Set(new.description),
            status: Set(ProjectStatus::Planned.as_str().to_string()),
            lead_id: Set(new.lead_id),
            target_date: Set(new.target_date),
            created_at: Set(now),
            updated_at: Set(now),
            archived_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        Ok(Project::from(model))
    }

    async fn update(&self, id: Uuid, patch: ProjectPatch) -> AppResult<Project> {
        let mut active: project::ActiveModel = self.find_model(id).await?.into();

        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(lead_id) = patch.lead_id {
            active.lead_id = Set(lead_id);
        }
        if let Some(target_date) = patch.target_date {
            active.target_date = Set(target_date);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Project::from(model))
    }

    async fn set_archived(&self, id: Uuid, archived_at: Option<DateTime<Utc>>) -> AppResult<Project> {
        let mut active: project::ActiveModel = self.find_model(id).await?.into();
        active.archived_at = Set(archived_at);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Project::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = ProjectEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn search(&self, team_ids: Vec<Uuid>, query: String, limit: u64) -> AppResult<Vec<Project>> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = ProjectEntity::find()
            .filter(project::Column::TeamId.is_in(team_ids))
            .filter(Expr::col(project::Column::Name).ilike(contains_pattern(&query)))
            .order_by_desc(project::Column::UpdatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Project::from).collect())
    }
}
