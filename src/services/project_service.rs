//! Project service.

use async_trait::async_trait;
use chrono::Utc;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{require_project, require_team};
use crate::domain::{Actor, NewProject, Project, ProjectPatch, TeamRole};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// Project creation input
#[derive(Debug, Clone, Default)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub lead_id: Option<Uuid>,
    pub target_date: Option<chrono::NaiveDate>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn list(&self, actor: &Actor, team_id: Uuid, include_archived: bool) -> AppResult<Vec<Project>>;

    async fn get(&self, actor: &Actor, project_id: Uuid) -> AppResult<Project>;

    async fn create(&self, actor: &Actor, team_id: Uuid, input: CreateProject) -> AppResult<Project>;

    async fn update(&self, actor: &Actor, project_id: Uuid, patch: ProjectPatch) -> AppResult<Project>;

    async fn archive(&self, actor: &Actor, project_id: Uuid) -> AppResult<Project>;

    async fn unarchive(&self, actor: &Actor, project_id: Uuid) -> AppResult<Project>;

    /// Delete a project and its issues
    async fn delete(&self, actor: &Actor, project_id: Uuid) -> AppResult<()>;
}

fn clean_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::validation("Project name must be 1-100 characters"));
    }
    Ok(name.to_string())
}

pub struct ProjectManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> ProjectManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn ensure_member(&self, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        match self.uow.teams().membership(team_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::validation("Project lead must be a member of the team")),
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> ProjectService for ProjectManager<U> {
    async fn list(&self, actor: &Actor, team_id: Uuid, include_archived: bool) -> AppResult<Vec<Project>> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
        self.uow.projects().list_by_team(team_id, include_archived).await
    }

    async fn get(&self, actor: &Actor, project_id: Uuid) -> AppResult<Project> {
        let (project, _) = require_project(self.uow.as_ref(), actor, project_id, TeamRole::Viewer).await?;
        Ok(project)
    }

    async fn create(&self, actor: &Actor, team_id: Uuid, input: CreateProject) -> AppResult<Project> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Member).await?;

        let name = clean_name(&input.name)?;
        if let Some(lead_id) = input.lead_id {
            self.ensure_member(team_id, lead_id).await?;
        }

        let project = self
            .uow
            .projects()
            .create(NewProject {
                team_id,
                name,
                description: input.description,
                lead_id: input.lead_id,
                target_date: input.target_date,
            })
            .await?;

        tracing::info!(team_id = %team_id, project_id = %project.id, "Project created");
        Ok(project)
    }

    async fn update(&self, actor: &Actor, project_id: Uuid, patch: ProjectPatch) -> AppResult<Project> {
        let (project, _) = require_project(self.uow.as_ref(), actor, project_id, TeamRole::Member).await?;

        if let Some(Some(lead_id)) = patch.lead_id {
            self.ensure_member(project.team_id, lead_id).await?;
        }
        let patch = ProjectPatch {
            name: patch.name.as_deref().map(clean_name).transpose()?,
            ..patch
        };

        self.uow.projects().update(project_id, patch).await
    }

    async fn archive(&self, actor: &Actor, project_id: Uuid) -> AppResult<Project> {
        let (project, _) = require_project(self.uow.as_ref(), actor, project_id, TeamRole::Admin).await?;
        if project.is_archived() {
            return Ok(project);
        }

        let project = self
            .uow
            .projects()
            .set_archived(project_id, Some(Utc::now()))
            .await?;

        tracing::info!(project_id = %project_id, actor_id = %actor.id, "Project archived");
        Ok(project)
    }

    async fn unarchive(&self, actor: &Actor, project_id: Uuid) -> AppResult<Project> {
        let (project, _) = require_project(self.uow.as_ref(), actor, project_id, TeamRole::Admin).await?;
        if !project.is_archived() {
            return Ok(project);
        }

        self.uow.projects().set_archived(project_id, None).await
    }

    async fn delete(&self, actor: &Actor, project_id: Uuid) -> AppResult<()> {
        require_project(self.uow.as_ref(), actor, project_id, TeamRole::Admin).await?;
        self.uow.projects().delete(project_id).await?;

        tracing::info!(project_id = %project_id, actor_id = %actor.id, "Project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectStatus, UserRole};
    use crate::infra::repositories::{MockProjectRepository, MockTeamRepository};
    use crate::services::testing::TestUnitOfWork;
    use mockall::predicate::eq;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "dev@example.com", UserRole::User)
    }

    fn project(team_id: Uuid) -> Project {
        Project {
            id: Uuid::new_v4(),
            team_id,
            name: "Billing".to_string(),
            description: None,
            status: ProjectStatus::Planned,
            lead_id: None,
            target_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            archived_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_lead_membership() {
        let me = actor();
        let my_id = me.id;
        let lead_id = Uuid::new_v4();
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .withf(move |_, user| *user == my_id)
            .returning(|_, _| Ok(Some(TeamRole::Member)));
        teams
            .expect_membership()
            .withf(move |_, user| *user == lead_id)
            .returning(|_, _| Ok(None));
        let mut projects = MockProjectRepository::new();
        projects.expect_create().never();

        let uow = TestUnitOfWork::new().with_teams(teams).with_projects(projects);
        let result = ProjectManager::new(Arc::new(uow))
            .create(
                &me,
                Uuid::new_v4(),
                CreateProject {
                    name: "Billing".to_string(),
                    lead_id: Some(lead_id),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_viewer_cannot_create() {
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Viewer)));

        let uow = TestUnitOfWork::new().with_teams(teams);
        let result = ProjectManager::new(Arc::new(uow))
            .create(
                &actor(),
                Uuid::new_v4(),
                CreateProject {
                    name: "Billing".to_string(),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_archive_sets_timestamp() {
        let team_id = Uuid::new_v4();
        let existing = project(team_id);
        let project_id = existing.id;
        let mut projects = MockProjectRepository::new();
        projects
            .expect_find_by_id()
            .with(eq(project_id))
            .returning(move |_| Ok(Some(existing.clone())));
        projects
            .expect_set_archived()
            .withf(|_, at| at.is_some())
            .times(1)
            .returning(move |_, at| {
                let mut archived = project(team_id);
                archived.archived_at = at;
                Ok(archived)
            });
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Admin)));

        let uow = TestUnitOfWork::new().with_teams(teams).with_projects(projects);
        let archived = ProjectManager::new(Arc::new(uow))
            .archive(&actor(), project_id)
            .await
            .unwrap();

        assert!(archived.is_archived());
    }

    #[tokio::test]
    async fn test_non_member_gets_not_found() {
        let existing = project(Uuid::new_v4());
        let project_id = existing.id;
        let mut projects = MockProjectRepository::new();
        projects
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        let mut teams = MockTeamRepository::new();
        teams.expect_membership().returning(|_, _| Ok(None));

        let uow = TestUnitOfWork::new().with_teams(teams).with_projects(projects);
        let result = ProjectManager::new(Arc::new(uow)).get(&actor(), project_id).await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
