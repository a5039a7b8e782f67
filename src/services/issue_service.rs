//! Issue service - creation, updates, labels and assignment notifications.

use async_trait::async_trait;
use chrono::Utc;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{require_issue, require_project, require_team};
use super::notification_service::{notify_quietly, NotificationService};
use crate::domain::{
    completion_transition, default_issue_status, Actor, Issue, IssueDetails, IssueDraft,
    IssueFilter, IssuePatch, Label, NewIssue, NewNotification, NotificationKind, Priority,
    Status, StatusCategory, TeamRole,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::types::{Paginated, PaginationParams};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 20_000;
/// Attempts at the numbering transaction before contention is reported
const CREATE_ATTEMPTS: u32 = 3;

/// Issue listing query. One of `project_id` or `team_id` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueQuery {
    pub project_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub label_id: Option<Uuid>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait IssueService: Send + Sync {
    /// Issues matching a query, newest first
    async fn list(&self, actor: &Actor, query: IssueQuery, params: PaginationParams) -> AppResult<Paginated<Issue>>;

    async fn get(&self, actor: &Actor, issue_id: Uuid) -> AppResult<IssueDetails>;

    async fn create(&self, actor: &Actor, project_id: Uuid, draft: IssueDraft) -> AppResult<IssueDetails>;

    async fn update(&self, actor: &Actor, issue_id: Uuid, patch: IssuePatch) -> AppResult<IssueDetails>;

    /// Reporters may delete their own issues; anyone else needs team admin
    async fn delete(&self, actor: &Actor, issue_id: Uuid) -> AppResult<()>;

    /// Replace the label set of an issue
    async fn set_labels(&self, actor: &Actor, issue_id: Uuid, label_ids: Vec<Uuid>) -> AppResult<IssueDetails>;
}

fn clean_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::validation(format!(
            "Title must be 1-{} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn check_description(description: Option<&str>) -> AppResult<()> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LENGTH => Err(AppError::validation(
            format!("Description cannot exceed {} characters", MAX_DESCRIPTION_LENGTH),
        )),
        _ => Ok(()),
    }
}

fn assignment_notice(issue: &Issue) -> NewNotification {
    NewNotification::new(
        issue.assignee_id.unwrap_or_default(),
        NotificationKind::IssueAssigned,
        format!("You were assigned #{}: {}", issue.number, issue.title),
        issue
            .description
            .clone()
            .unwrap_or_else(|| "No description".to_string()),
    )
    .with_link(format!("/issues/{}", issue.id))
}

pub struct IssueManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifications: Arc<dyn NotificationService>,
}

impl<U: UnitOfWork> IssueManager<U> {
    pub fn new(uow: Arc<U>, notifications: Arc<dyn NotificationService>) -> Self {
        Self { uow, notifications }
    }

    async fn team_status(&self, team_id: Uuid, status_id: Uuid) -> AppResult<Status> {
        match self.uow.statuses().find_by_id(status_id).await? {
            Some(status) if status.team_id == team_id => Ok(status),
            _ => Err(AppError::validation("Status does not belong to this team")),
        }
    }

    async fn ensure_assignable(&self, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        match self.uow.teams().membership(team_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::validation("Assignee must be a member of the team")),
        }
    }

    /// Load labels and check they all exist in the team.
    async fn team_labels(&self, team_id: Uuid, label_ids: Vec<Uuid>) -> AppResult<Vec<Label>> {
        let unique: Vec<Uuid> = label_ids
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let labels = self.uow.labels().find_by_ids(unique.clone()).await?;
        if labels.len() != unique.len() || labels.iter().any(|l| l.team_id != team_id) {
            return Err(AppError::validation("Labels must belong to this team"));
        }
        Ok(labels)
    }

    async fn details(&self, issue: Issue) -> AppResult<IssueDetails> {
        let labels = self.uow.issues().labels(issue.id).await?;
        Ok(IssueDetails { issue, labels })
    }

    async fn notify_assignee(&self, actor: &Actor, issue: &Issue) {
        match issue.assignee_id {
            Some(assignee) if assignee != actor.id => {
                notify_quietly(self.notifications.as_ref(), assignment_notice(issue)).await
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> IssueService for IssueManager<U> {
    async fn list(&self, actor: &Actor, query: IssueQuery, params: PaginationParams) -> AppResult<Paginated<Issue>> {
        let mut filter = match (query.project_id, query.team_id) {
            (Some(project_id), _) => {
                require_project(self.uow.as_ref(), actor, project_id, TeamRole::Viewer).await?;
                IssueFilter::project(project_id)
            }
            (None, Some(team_id)) => {
                require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
                IssueFilter::team(team_id)
            }
            (None, None) => {
                return Err(AppError::bad_request("Either project_id or team_id is required"))
            }
        };
        filter.status_id = query.status_id;
        filter.assignee_id = query.assignee_id;
        filter.priority = query.priority;
        filter.label_id = query.label_id;

        let (issues, total) = self
            .uow
            .issues()
            .list(filter, params.offset(), params.limit())
            .await?;
        Ok(Paginated::from_params(issues, &params, total))
    }

    async fn get(&self, actor: &Actor, issue_id: Uuid) -> AppResult<IssueDetails> {
        let (issue, _) = require_issue(self.uow.as_ref(), actor, issue_id, TeamRole::Viewer).await?;
        self.details(issue).await
    }

    async fn create(&self, actor: &Actor, project_id: Uuid, draft: IssueDraft) -> AppResult<IssueDetails> {
        let (project, _) = require_project(self.uow.as_ref(), actor, project_id, TeamRole::Member).await?;
        if project.is_archived() {
            return Err(AppError::validation("Cannot add issues to an archived project"));
        }
        let team_id = project.team_id;

        let title = clean_title(&draft.title)?;
        check_description(draft.description.as_deref())?;

        let status = match draft.status_id {
            Some(status_id) => self.team_status(team_id, status_id).await?,
            None => {
                let statuses = self.uow.statuses().list_by_team(team_id).await?;
                default_issue_status(&statuses)
                    .cloned()
                    .ok_or_else(|| AppError::conflict("Team has no workflow statuses"))?
            }
        };
        if let Some(assignee) = draft.assignee_id {
            self.ensure_assignable(team_id, assignee).await?;
        }
        let labels = self.team_labels(team_id, draft.label_ids).await?;
        let label_ids: Vec<Uuid> = labels.iter().map(|l| l.id).collect();

        let new_issue = NewIssue {
            team_id,
            project_id,
            title,
            description: draft.description,
            status_id: status.id,
            priority: draft.priority.unwrap_or_default(),
            assignee_id: draft.assignee_id,
            reporter_id: actor.id,
            due_date: draft.due_date,
            completed_at: (status.category == StatusCategory::Completed).then(Utc::now),
        };

        let mut attempt = 1;
        let issue = loop {
            let new_issue = new_issue.clone();
            let label_ids = label_ids.clone();
            let result = self
                .uow
                .transaction_serializable(|ctx| {
                    Box::pin(async move {
                        let issue = ctx.issues().create(new_issue).await?;
                        if !label_ids.is_empty() {
                            ctx.issues().replace_labels(issue.id, label_ids).await?;
                        }
                        Ok(issue)
                    })
                })
                .await;

            match result {
                Err(e) if e.is_contention() && attempt < CREATE_ATTEMPTS => {
                    tracing::debug!(project_id = %project_id, attempt, "Issue numbering contended, retrying");
                    attempt += 1;
                }
                other => break other?,
            }
        };

        tracing::info!(
            issue_id = %issue.id,
            project_id = %project_id,
            number = issue.number,
            "Issue created"
        );

        self.notify_assignee(actor, &issue).await;
        Ok(IssueDetails { issue, labels })
    }

    async fn update(&self, actor: &Actor, issue_id: Uuid, patch: IssuePatch) -> AppResult<IssueDetails> {
        let (current, _) = require_issue(self.uow.as_ref(), actor, issue_id, TeamRole::Member).await?;
        if patch.is_empty() {
            return self.details(current).await;
        }

        let mut patch = IssuePatch {
            title: patch.title.as_deref().map(clean_title).transpose()?,
            completed_at: None,
            ..patch
        };
        if let Some(description) = &patch.description {
            check_description(description.as_deref())?;
        }

        if let Some(status_id) = patch.status_id.filter(|id| *id != current.status_id) {
            let target = self.team_status(current.team_id, status_id).await?;
            let from = self
                .uow
                .statuses()
                .find_by_id(current.status_id)
                .await?
                .map(|s| s.category)
                .unwrap_or(StatusCategory::Backlog);
            patch.completed_at = completion_transition(from, target.category, Utc::now());
        }

        let reassigned = match patch.assignee_id {
            Some(Some(assignee)) if Some(assignee) != current.assignee_id => {
                self.ensure_assignable(current.team_id, assignee).await?;
                true
            }
            _ => false,
        };

        let issue = self.uow.issues().update(issue_id, patch).await?;
        tracing::debug!(issue_id = %issue_id, actor_id = %actor.id, "Issue updated");

        if reassigned {
            self.notify_assignee(actor, &issue).await;
        }
        self.details(issue).await
    }

    async fn delete(&self, actor: &Actor, issue_id: Uuid) -> AppResult<()> {
        let (issue, role) = require_issue(self.uow.as_ref(), actor, issue_id, TeamRole::Member).await?;
        if issue.reporter_id != actor.id && !role.at_least(TeamRole::Admin) {
            return Err(AppError::Forbidden);
        }

        self.uow.issues().delete(issue_id).await?;

        tracing::info!(issue_id = %issue_id, actor_id = %actor.id, "Issue deleted");
        Ok(())
    }

    async fn set_labels(&self, actor: &Actor, issue_id: Uuid, label_ids: Vec<Uuid>) -> AppResult<IssueDetails> {
        let (issue, _) = require_issue(self.uow.as_ref(), actor, issue_id, TeamRole::Member).await?;
        let labels = self.team_labels(issue.team_id, label_ids).await?;
        let ids: Vec<Uuid> = labels.iter().map(|l| l.id).collect();

        self.uow
            .transaction(|ctx| Box::pin(async move { ctx.issues().replace_labels(issue_id, ids).await }))
            .await?;

        Ok(IssueDetails { issue, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Notification, Project, ProjectStatus, UserRole};
    use crate::infra::repositories::{
        MockIssueRepository, MockLabelRepository, MockProjectRepository, MockStatusRepository,
        MockTeamRepository,
    };
    use crate::infra::repositories::entities::{issue as issue_entity, issue_label};
    use crate::services::notification_service::MockNotificationService;
    use crate::services::testing::TestUnitOfWork;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "dev@example.com", UserRole::User)
    }

    fn project(team_id: Uuid) -> Project {
        Project {
            id: Uuid::new_v4(),
            team_id,
            name: "Billing".to_string(),
            description: None,
            status: ProjectStatus::Active,
            lead_id: None,
            target_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            archived_at: None,
        }
    }

    fn status(team_id: Uuid, category: StatusCategory) -> Status {
        Status {
            id: Uuid::new_v4(),
            team_id,
            name: category.as_str().to_string(),
            category,
            color: "#000000".to_string(),
            position: 0,
            created_at: Utc::now(),
        }
    }

    fn issue(team_id: Uuid, status_id: Uuid, reporter_id: Uuid) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            team_id,
            project_id: Uuid::new_v4(),
            number: 7,
            title: "Checkout fails".to_string(),
            description: None,
            status_id,
            priority: Priority::Medium,
            assignee_id: None,
            reporter_id,
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn teams_with_role(role: TeamRole) -> MockTeamRepository {
        let mut teams = MockTeamRepository::new();
        teams.expect_membership().returning(move |_, _| Ok(Some(role)));
        teams
    }

    fn stored(n: NewNotification) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: n.user_id,
            kind: n.kind,
            title: n.title,
            body: n.body,
            link: n.link,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_requires_scope() {
        let svc = IssueManager::new(Arc::new(TestUnitOfWork::new()), Arc::new(MockNotificationService::new()));
        let result = svc
            .list(&actor(), IssueQuery::default(), PaginationParams::default())
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_applies_filters() {
        let team_id = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let mut issues = MockIssueRepository::new();
        issues
            .expect_list()
            .withf(move |filter, offset, limit| {
                *filter
                    == IssueFilter {
                        assignee_id: Some(assignee),
                        priority: Some(Priority::High),
                        ..IssueFilter::team(team_id)
                    }
                    && *offset == 0
                    && *limit == 20
            })
            .returning(|_, _, _| Ok((vec![], 0)));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Viewer))
            .with_issues(issues);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));
        let query = IssueQuery {
            team_id: Some(team_id),
            assignee_id: Some(assignee),
            priority: Some(Priority::High),
            ..Default::default()
        };

        let page = svc.list(&actor(), query, PaginationParams::default()).await.unwrap();
        assert_eq!(page.meta.total, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_labels() {
        let team_id = Uuid::new_v4();
        let target = project(team_id);
        let project_id = target.id;
        let todo = status(team_id, StatusCategory::Unstarted);

        let mut projects = MockProjectRepository::new();
        projects
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        let mut statuses = MockStatusRepository::new();
        statuses
            .expect_list_by_team()
            .returning(move |_| Ok(vec![todo.clone()]));
        let mut labels = MockLabelRepository::new();
        labels.expect_find_by_ids().returning(|ids| {
            Ok(ids
                .into_iter()
                .map(|id| Label {
                    id,
                    team_id: Uuid::new_v4(),
                    name: "bug".to_string(),
                    color: "#FF0000".to_string(),
                    created_at: Utc::now(),
                })
                .collect())
        });

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_projects(projects)
            .with_statuses(statuses)
            .with_labels(labels);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let draft = IssueDraft {
            title: "Broken".to_string(),
            label_ids: vec![Uuid::new_v4()],
            ..Default::default()
        };
        let result = svc.create(&actor(), project_id, draft).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let target = project(Uuid::new_v4());
        let project_id = target.id;
        let mut projects = MockProjectRepository::new();
        projects
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_projects(projects);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let draft = IssueDraft {
            title: "   ".to_string(),
            ..Default::default()
        };
        let result = svc.create(&actor(), project_id, draft).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_moving_to_done_sets_completed_at_and_notifies_assignee() {
        let team_id = Uuid::new_v4();
        let started = status(team_id, StatusCategory::Started);
        let done = status(team_id, StatusCategory::Completed);
        let done_id = done.id;
        let existing = issue(team_id, started.id, Uuid::new_v4());
        let issue_id = existing.id;
        let assignee = Uuid::new_v4();

        let mut issues = MockIssueRepository::new();
        let current = existing.clone();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        issues
            .expect_update()
            .withf(move |_, patch| {
                patch.status_id == Some(done_id)
                    && matches!(patch.completed_at, Some(Some(_)))
                    && patch.assignee_id == Some(Some(assignee))
            })
            .times(1)
            .returning(move |_, patch| {
                let mut updated = existing.clone();
                updated.status_id = done_id;
                updated.assignee_id = patch.assignee_id.flatten();
                updated.completed_at = patch.completed_at.flatten();
                Ok(updated)
            });
        issues.expect_labels().returning(|_| Ok(vec![]));

        let mut statuses = MockStatusRepository::new();
        statuses.expect_find_by_id().returning(move |id| {
            Ok(Some(if id == done.id { done.clone() } else { started.clone() }))
        });

        let mut notifications = MockNotificationService::new();
        notifications
            .expect_notify()
            .withf(move |n| n.user_id == assignee && n.kind == NotificationKind::IssueAssigned)
            .times(1)
            .returning(|n| Ok(stored(n)));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_issues(issues)
            .with_statuses(statuses);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(notifications));

        let patch = IssuePatch {
            status_id: Some(done_id),
            assignee_id: Some(Some(assignee)),
            ..Default::default()
        };
        let details = svc.update(&actor(), issue_id, patch).await.unwrap();

        assert!(details.issue.completed_at.is_some());
        assert_eq!(details.issue.assignee_id, Some(assignee));
    }

    #[tokio::test]
    async fn test_member_cannot_delete_others_issue() {
        let existing = issue(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let issue_id = existing.id;
        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        issues.expect_delete().never();

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_issues(issues);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let result = svc.delete(&actor(), issue_id).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_reporter_deletes_own_issue() {
        let me = actor();
        let existing = issue(Uuid::new_v4(), Uuid::new_v4(), me.id);
        let issue_id = existing.id;
        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        issues.expect_delete().times(1).returning(|_| Ok(()));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_issues(issues);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        svc.delete(&me, issue_id).await.unwrap();
    }

    fn issue_row(new: &Issue) -> issue_entity::Model {
        issue_entity::Model {
            id: new.id,
            team_id: new.team_id,
            project_id: new.project_id,
            number: new.number,
            title: new.title.clone(),
            description: new.description.clone(),
            status_id: new.status_id,
            priority: new.priority.as_str().to_string(),
            assignee_id: new.assignee_id,
            reporter_id: new.reporter_id,
            due_date: new.due_date,
            completed_at: new.completed_at,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }

    fn label(team_id: Uuid) -> Label {
        Label {
            id: Uuid::new_v4(),
            team_id,
            name: "bug".to_string(),
            color: "#FF0000".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Rows for one numbering transaction: last issue, inserted issue, label rewrite.
    fn numbering_database(last: &Issue, inserted: &Issue, label_id: Uuid) -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![issue_row(last)]])
            .append_query_results([vec![issue_row(inserted)]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .append_query_results([vec![issue_label::Model {
                issue_id: inserted.id,
                label_id,
            }]])
            .into_connection()
    }

    struct CreateFixture {
        uow: TestUnitOfWork,
        project_id: Uuid,
        draft: IssueDraft,
        inserted: Issue,
    }

    fn create_fixture(reporter: Uuid, assignee: Uuid) -> CreateFixture {
        let team_id = Uuid::new_v4();
        let target = project(team_id);
        let project_id = target.id;
        let todo = status(team_id, StatusCategory::Unstarted);
        let bug = label(team_id);
        let bug_id = bug.id;

        let mut last = issue(team_id, todo.id, reporter);
        last.project_id = project_id;
        last.number = 4;
        let mut inserted = issue(team_id, todo.id, reporter);
        inserted.project_id = project_id;
        inserted.number = 5;
        inserted.assignee_id = Some(assignee);

        let mut projects = MockProjectRepository::new();
        projects
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        let mut statuses = MockStatusRepository::new();
        statuses
            .expect_list_by_team()
            .returning(move |_| Ok(vec![todo.clone()]));
        let mut labels = MockLabelRepository::new();
        labels
            .expect_find_by_ids()
            .returning(move |_| Ok(vec![bug.clone()]));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_projects(projects)
            .with_statuses(statuses)
            .with_labels(labels)
            .with_database(numbering_database(&last, &inserted, bug_id));

        let draft = IssueDraft {
            title: "Checkout fails".to_string(),
            assignee_id: Some(assignee),
            label_ids: vec![bug_id, bug_id],
            ..Default::default()
        };
        CreateFixture {
            uow,
            project_id,
            draft,
            inserted,
        }
    }

    #[tokio::test]
    async fn test_create_numbers_labels_and_notifies_assignee() {
        let me = actor();
        let assignee = Uuid::new_v4();
        let fixture = create_fixture(me.id, assignee);

        let mut notifications = MockNotificationService::new();
        notifications
            .expect_notify()
            .withf(move |n| {
                n.user_id == assignee
                    && n.kind == NotificationKind::IssueAssigned
                    && n.title.starts_with("You were assigned #5")
            })
            .times(1)
            .returning(|n| Ok(stored(n)));

        let svc = IssueManager::new(Arc::new(fixture.uow), Arc::new(notifications));
        let details = svc
            .create(&me, fixture.project_id, fixture.draft)
            .await
            .unwrap();

        assert_eq!(details.issue.id, fixture.inserted.id);
        assert_eq!(details.issue.number, 5);
        assert_eq!(details.labels.len(), 1);
    }

    #[tokio::test]
    async fn test_create_retries_contended_numbering() {
        let me = actor();
        let fixture = create_fixture(me.id, me.id);
        let uow = Arc::new(fixture.uow.with_contention(1));

        let mut notifications = MockNotificationService::new();
        notifications.expect_notify().never();

        let svc = IssueManager::new(uow.clone(), Arc::new(notifications));
        let details = svc
            .create(&me, fixture.project_id, fixture.draft)
            .await
            .unwrap();

        assert_eq!(details.issue.number, 5);
        assert_eq!(uow.transactions_started(), 2);
    }

    #[tokio::test]
    async fn test_create_reports_persistent_contention() {
        let me = actor();
        let fixture = create_fixture(me.id, me.id);
        let uow = Arc::new(fixture.uow.with_contention(CREATE_ATTEMPTS));

        let svc = IssueManager::new(uow.clone(), Arc::new(MockNotificationService::new()));
        let result = svc.create(&me, fixture.project_id, fixture.draft).await;

        match result {
            Err(err) => {
                assert!(err.is_contention());
                assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
            }
            Ok(details) => panic!("expected contention, created #{}", details.issue.number),
        }
        assert_eq!(uow.transactions_started(), CREATE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_set_labels_replaces_label_set() {
        let team_id = Uuid::new_v4();
        let existing = issue(team_id, Uuid::new_v4(), Uuid::new_v4());
        let issue_id = existing.id;
        let wontfix = label(team_id);
        let wontfix_id = wontfix.id;

        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        let mut labels = MockLabelRepository::new();
        labels
            .expect_find_by_ids()
            .withf(move |ids| ids == &vec![wontfix_id])
            .returning(move |_| Ok(vec![wontfix.clone()]));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .append_query_results([vec![issue_label::Model {
                issue_id,
                label_id: wontfix_id,
            }]])
            .into_connection();

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_issues(issues)
            .with_labels(labels)
            .with_database(db);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let details = svc.set_labels(&actor(), issue_id, vec![wontfix_id]).await.unwrap();
        assert_eq!(details.labels.len(), 1);
        assert_eq!(details.labels[0].id, wontfix_id);
    }

    #[tokio::test]
    async fn test_viewer_cannot_set_labels() {
        let existing = issue(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let issue_id = existing.id;
        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Viewer))
            .with_issues(issues);
        let svc = IssueManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let result = svc.set_labels(&actor(), issue_id, vec![Uuid::new_v4()]).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
        assert_eq!(svc.uow.transactions_started(), 0);
    }
}
