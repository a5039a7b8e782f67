//! Workflow service - a team's statuses and labels.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::sync::Arc;
use uuid::Uuid;

use super::access::require_team;
use crate::domain::{
    default_statuses, validate_color, Actor, Label, NewStatus, Status, StatusCategory,
    StatusPatch, TeamRole,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Statuses of a team ordered by position
    async fn list_statuses(&self, actor: &Actor, team_id: Uuid) -> AppResult<Vec<Status>>;

    /// Append a status at the end of the workflow
    async fn create_status(
        &self,
        actor: &Actor,
        team_id: Uuid,
        name: String,
        category: StatusCategory,
        color: Option<String>,
    ) -> AppResult<Status>;

    async fn update_status(&self, actor: &Actor, status_id: Uuid, patch: StatusPatch) -> AppResult<Status>;

    /// Refused while issues use the status or when it is the last one of a
    /// required category
    async fn delete_status(&self, actor: &Actor, status_id: Uuid) -> AppResult<()>;

    async fn list_labels(&self, actor: &Actor, team_id: Uuid) -> AppResult<Vec<Label>>;

    async fn create_label(&self, actor: &Actor, team_id: Uuid, name: String, color: String) -> AppResult<Label>;

    async fn update_label(
        &self,
        actor: &Actor,
        label_id: Uuid,
        name: Option<String>,
        color: Option<String>,
    ) -> AppResult<Label>;

    async fn delete_label(&self, actor: &Actor, label_id: Uuid) -> AppResult<()>;
}

fn clean_name(name: &str, what: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 50 {
        return Err(AppError::validation(format!("{} name must be 1-50 characters", what)));
    }
    Ok(name.to_string())
}

/// Color a new status gets when none is supplied.
fn default_color(category: StatusCategory) -> String {
    default_statuses(Uuid::nil())
        .into_iter()
        .find(|s| s.category == category)
        .map(|s| s.color)
        .unwrap_or_else(|| "#BEC2C8".to_string())
}

pub struct WorkflowManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> WorkflowManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn status_in_scope(&self, actor: &Actor, status_id: Uuid, required: TeamRole) -> AppResult<Status> {
        let status = self
            .uow
            .statuses()
            .find_by_id(status_id)
            .await?
            .ok_or(AppError::NotFound)?;
        require_team(self.uow.as_ref(), actor, status.team_id, required).await?;
        Ok(status)
    }

    async fn label_in_scope(&self, actor: &Actor, label_id: Uuid, required: TeamRole) -> AppResult<Label> {
        let label = self
            .uow
            .labels()
            .find_by_id(label_id)
            .await?
            .ok_or(AppError::NotFound)?;
        require_team(self.uow.as_ref(), actor, label.team_id, required).await?;
        Ok(label)
    }
}

#[async_trait]
impl<U: UnitOfWork> WorkflowService for WorkflowManager<U> {
    async fn list_statuses(&self, actor: &Actor, team_id: Uuid) -> AppResult<Vec<Status>> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
        self.uow.statuses().list_by_team(team_id).await
    }

    async fn create_status(
        &self,
        actor: &Actor,
        team_id: Uuid,
        name: String,
        category: StatusCategory,
        color: Option<String>,
    ) -> AppResult<Status> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Admin).await?;

        let name = clean_name(&name, "Status")?;
        let color = match color {
            Some(color) => {
                validate_color(&color)?;
                color
            }
            None => default_color(category),
        };

        let existing = self.uow.statuses().list_by_team(team_id).await?;
        if existing.iter().any(|s| s.name.eq_ignore_ascii_case(&name)) {
            return Err(AppError::already_exists("Status"));
        }
        let position = existing.iter().map(|s| s.position + 1).max().unwrap_or(0);

        let status = self
            .uow
            .statuses()
            .create(NewStatus {
                team_id,
                name,
                category,
                color,
                position,
            })
            .await?;

        tracing::info!(team_id = %team_id, status_id = %status.id, "Status created");
        Ok(status)
    }

    async fn update_status(&self, actor: &Actor, status_id: Uuid, patch: StatusPatch) -> AppResult<Status> {
        self.status_in_scope(actor, status_id, TeamRole::Admin).await?;

        if let Some(color) = &patch.color {
            validate_color(color)?;
        }
        if matches!(patch.position, Some(p) if p < 0) {
            return Err(AppError::validation("Position cannot be negative"));
        }
        let patch = StatusPatch {
            name: patch.name.as_deref().map(|n| clean_name(n, "Status")).transpose()?,
            ..patch
        };

        self.uow.statuses().update(status_id, patch).await
    }

    async fn delete_status(&self, actor: &Actor, status_id: Uuid) -> AppResult<()> {
        let status = self.status_in_scope(actor, status_id, TeamRole::Admin).await?;

        let in_use = self.uow.issues().count_by_status(status_id).await?;
        if in_use > 0 {
            return Err(AppError::conflict(format!(
                "Status is used by {} issue(s); move them first",
                in_use
            )));
        }

        if status.category.is_required() {
            let siblings = self
                .uow
                .statuses()
                .list_by_team(status.team_id)
                .await?
                .into_iter()
                .filter(|s| s.category == status.category)
                .count();
            if siblings <= 1 {
                return Err(AppError::conflict(format!(
                    "A team needs at least one {} status",
                    status.category.as_str()
                )));
            }
        }

        self.uow.statuses().delete(status_id).await?;

        tracing::info!(team_id = %status.team_id, status_id = %status_id, "Status deleted");
        Ok(())
    }

    async fn list_labels(&self, actor: &Actor, team_id: Uuid) -> AppResult<Vec<Label>> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
        self.uow.labels().list_by_team(team_id).await
    }

    async fn create_label(&self, actor: &Actor, team_id: Uuid, name: String, color: String) -> AppResult<Label> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Member).await?;

        let name = clean_name(&name, "Label")?;
        validate_color(&color)?;

        if self.uow.labels().find_by_name(team_id, &name).await?.is_some() {
            return Err(AppError::already_exists("Label"));
        }

        self.uow.labels().create(team_id, name, color).await
    }

    async fn update_label(
        &self,
        actor: &Actor,
        label_id: Uuid,
        name: Option<String>,
        color: Option<String>,
    ) -> AppResult<Label> {
        let label = self.label_in_scope(actor, label_id, TeamRole::Member).await?;

        if let Some(color) = &color {
            validate_color(color)?;
        }
        let name = name.as_deref().map(|n| clean_name(n, "Label")).transpose()?;
        if let Some(name) = &name {
            if let Some(other) = self.uow.labels().find_by_name(label.team_id, name).await? {
                if other.id != label_id {
                    return Err(AppError::already_exists("Label"));
                }
            }
        }

        self.uow.labels().update(label_id, name, color).await
    }

    async fn delete_label(&self, actor: &Actor, label_id: Uuid) -> AppResult<()> {
        let label = self.label_in_scope(actor, label_id, TeamRole::Admin).await?;
        self.uow.labels().delete(label_id).await?;

        tracing::info!(team_id = %label.team_id, label_id = %label_id, "Label deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use crate::infra::repositories::{
        MockIssueRepository, MockLabelRepository, MockStatusRepository, MockTeamRepository,
    };
    use crate::services::testing::TestUnitOfWork;
    use chrono::Utc;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "dev@example.com", UserRole::User)
    }

    fn teams_with_role(role: TeamRole) -> MockTeamRepository {
        let mut teams = MockTeamRepository::new();
        teams.expect_membership().returning(move |_, _| Ok(Some(role)));
        teams
    }

    fn status(team_id: Uuid, category: StatusCategory, position: i32) -> Status {
        Status {
            id: Uuid::new_v4(),
            team_id,
            name: format!("{}-{}", category.as_str(), position),
            category,
            color: "#000000".to_string(),
            position,
            created_at: Utc::now(),
        }
    }

    fn label(team_id: Uuid, name: &str) -> Label {
        Label {
            id: Uuid::new_v4(),
            team_id,
            name: name.to_string(),
            color: "#FF0000".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_status_appends_at_end() {
        let team_id = Uuid::new_v4();
        let mut statuses = MockStatusRepository::new();
        statuses.expect_list_by_team().returning(move |_| {
            Ok(vec![
                status(team_id, StatusCategory::Backlog, 0),
                status(team_id, StatusCategory::Started, 4),
            ])
        });
        statuses
            .expect_create()
            .withf(|new| new.position == 5 && new.color == "#F2C94C" && new.name == "Review")
            .times(1)
            .returning(|new| {
                Ok(Status {
                    id: Uuid::new_v4(),
                    team_id: new.team_id,
                    name: new.name,
                    category: new.category,
                    color: new.color,
                    position: new.position,
                    created_at: Utc::now(),
                })
            });

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Admin))
            .with_statuses(statuses);
        let created = WorkflowManager::new(Arc::new(uow))
            .create_status(&actor(), team_id, " Review ".to_string(), StatusCategory::Started, None)
            .await
            .unwrap();

        assert_eq!(created.position, 5);
    }

    #[tokio::test]
    async fn test_member_cannot_create_status() {
        let uow = TestUnitOfWork::new().with_teams(teams_with_role(TeamRole::Member));
        let result = WorkflowManager::new(Arc::new(uow))
            .create_status(&actor(), Uuid::new_v4(), "QA".to_string(), StatusCategory::Started, None)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_delete_status_in_use_conflicts() {
        let team_id = Uuid::new_v4();
        let target = status(team_id, StatusCategory::Started, 2);
        let target_id = target.id;
        let mut statuses = MockStatusRepository::new();
        statuses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        statuses.expect_delete().never();
        let mut issues = MockIssueRepository::new();
        issues.expect_count_by_status().returning(|_| Ok(3));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Admin))
            .with_statuses(statuses)
            .with_issues(issues);
        let result = WorkflowManager::new(Arc::new(uow))
            .delete_status(&actor(), target_id)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_last_backlog_status_is_kept() {
        let team_id = Uuid::new_v4();
        let backlog = status(team_id, StatusCategory::Backlog, 0);
        let backlog_id = backlog.id;
        let listed = backlog.clone();
        let mut statuses = MockStatusRepository::new();
        statuses
            .expect_find_by_id()
            .returning(move |_| Ok(Some(backlog.clone())));
        statuses.expect_list_by_team().returning(move |_| {
            Ok(vec![listed.clone(), status(team_id, StatusCategory::Started, 1)])
        });
        statuses.expect_delete().never();
        let mut issues = MockIssueRepository::new();
        issues.expect_count_by_status().returning(|_| Ok(0));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Owner))
            .with_statuses(statuses)
            .with_issues(issues);
        let result = WorkflowManager::new(Arc::new(uow))
            .delete_status(&actor(), backlog_id)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_label_conflicts() {
        let team_id = Uuid::new_v4();
        let mut labels = MockLabelRepository::new();
        labels
            .expect_find_by_name()
            .returning(move |_, _| Ok(Some(label(team_id, "Bug"))));
        labels.expect_create().never();

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_labels(labels);
        let result = WorkflowManager::new(Arc::new(uow))
            .create_label(&actor(), team_id, "bug".to_string(), "#FF0000".to_string())
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_label_color_is_validated() {
        let uow = TestUnitOfWork::new().with_teams(teams_with_role(TeamRole::Member));
        let result = WorkflowManager::new(Arc::new(uow))
            .create_label(&actor(), Uuid::new_v4(), "Bug".to_string(), "red".to_string())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_member_cannot_delete_label() {
        let team_id = Uuid::new_v4();
        let existing = label(team_id, "Bug");
        let label_id = existing.id;
        let mut labels = MockLabelRepository::new();
        labels
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        labels.expect_delete().never();

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_labels(labels);
        let result = WorkflowManager::new(Arc::new(uow))
            .delete_label(&actor(), label_id)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }
}
