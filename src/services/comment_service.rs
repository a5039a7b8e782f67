//! Comment service.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{require_issue, require_team};
use crate::config::MAX_COMMENT_LENGTH;
use super::notification_service::{notify_quietly, NotificationService};
use crate::domain::{Actor, Comment, Issue, NewNotification, NotificationKind, TeamRole};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CommentService: Send + Sync {
    /// Comments of an issue, oldest first
    async fn list(&self, actor: &Actor, issue_id: Uuid) -> AppResult<Vec<Comment>>;

    async fn create(&self, actor: &Actor, issue_id: Uuid, body: String) -> AppResult<Comment>;

    /// Only the author may edit
    async fn update(&self, actor: &Actor, comment_id: Uuid, body: String) -> AppResult<Comment>;

    /// The author or a team admin may delete
    async fn delete(&self, actor: &Actor, comment_id: Uuid) -> AppResult<()>;
}

fn clean_body(body: &str) -> AppResult<String> {
    let body = body.trim();
    if body.is_empty() || body.chars().count() as u64 > MAX_COMMENT_LENGTH {
        return Err(AppError::validation(format!(
            "Comment must be 1-{} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(body.to_string())
}

/// People to tell about a new comment: assignee and reporter, minus the author.
fn comment_recipients(issue: &Issue, author_id: Uuid) -> Vec<Uuid> {
    let mut recipients = Vec::with_capacity(2);
    for user_id in issue.assignee_id.into_iter().chain(Some(issue.reporter_id)) {
        if user_id != author_id && !recipients.contains(&user_id) {
            recipients.push(user_id);
        }
    }
    recipients
}

pub struct CommentManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifications: Arc<dyn NotificationService>,
}

impl<U: UnitOfWork> CommentManager<U> {
    pub fn new(uow: Arc<U>, notifications: Arc<dyn NotificationService>) -> Self {
        Self { uow, notifications }
    }

    /// Load a comment with the actor's role in the issue's team.
    async fn comment_in_scope(&self, actor: &Actor, comment_id: Uuid) -> AppResult<(Comment, TeamRole)> {
        let comment = self
            .uow
            .comments()
            .find_by_id(comment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let issue = self
            .uow
            .issues()
            .find_by_id(comment.issue_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let role = require_team(self.uow.as_ref(), actor, issue.team_id, TeamRole::Viewer).await?;
        Ok((comment, role))
    }
}

#[async_trait]
impl<U: UnitOfWork> CommentService for CommentManager<U> {
    async fn list(&self, actor: &Actor, issue_id: Uuid) -> AppResult<Vec<Comment>> {
        require_issue(self.uow.as_ref(), actor, issue_id, TeamRole::Viewer).await?;
        self.uow.comments().list_by_issue(issue_id).await
    }

    async fn create(&self, actor: &Actor, issue_id: Uuid, body: String) -> AppResult<Comment> {
        let (issue, _) = require_issue(self.uow.as_ref(), actor, issue_id, TeamRole::Member).await?;
        let body = clean_body(&body)?;

        let comment = self.uow.comments().create(issue_id, actor.id, body).await?;
        tracing::debug!(issue_id = %issue_id, comment_id = %comment.id, "Comment added");

        for user_id in comment_recipients(&issue, actor.id) {
            let notice = NewNotification::new(
                user_id,
                NotificationKind::IssueCommented,
                format!("New comment on #{}: {}", issue.number, issue.title),
                comment.body.chars().take(280).collect::<String>(),
            )
            .with_link(format!("/issues/{}", issue.id));
            notify_quietly(self.notifications.as_ref(), notice).await;
        }

        Ok(comment)
    }

    async fn update(&self, actor: &Actor, comment_id: Uuid, body: String) -> AppResult<Comment> {
        let (comment, _) = self.comment_in_scope(actor, comment_id).await?;
        if !comment.is_authored_by(actor.id) {
            return Err(AppError::Forbidden);
        }

        let body = clean_body(&body)?;
        self.uow.comments().update(comment_id, body).await
    }

    async fn delete(&self, actor: &Actor, comment_id: Uuid) -> AppResult<()> {
        let (comment, role) = self.comment_in_scope(actor, comment_id).await?;
        if !comment.is_authored_by(actor.id) && !role.at_least(TeamRole::Admin) {
            return Err(AppError::Forbidden);
        }

        self.uow.comments().delete(comment_id).await?;

        tracing::info!(comment_id = %comment_id, actor_id = %actor.id, "Comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Notification, Priority, UserRole};
    use crate::infra::repositories::{MockCommentRepository, MockIssueRepository, MockTeamRepository};
    use crate::services::notification_service::MockNotificationService;
    use crate::services::testing::TestUnitOfWork;
    use chrono::Utc;

    fn issue(reporter_id: Uuid, assignee_id: Option<Uuid>) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            number: 3,
            title: "Flaky test".to_string(),
            description: None,
            status_id: Uuid::new_v4(),
            priority: Priority::Low,
            assignee_id,
            reporter_id,
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn comment(issue_id: Uuid, author_id: Uuid) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            issue_id,
            author_id,
            body: "Looking into it".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn teams_with_role(role: TeamRole) -> MockTeamRepository {
        let mut teams = MockTeamRepository::new();
        teams.expect_membership().returning(move |_, _| Ok(Some(role)));
        teams
    }

    #[test]
    fn test_recipients_skip_author_and_duplicates() {
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(comment_recipients(&issue(other, Some(other)), author), vec![other]);
        assert_eq!(comment_recipients(&issue(author, None), author), Vec::<Uuid>::new());
        assert_eq!(comment_recipients(&issue(author, Some(other)), author), vec![other]);
    }

    #[tokio::test]
    async fn test_create_notifies_reporter() {
        let author = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::User);
        let reporter = Uuid::new_v4();
        let target = issue(reporter, None);
        let issue_id = target.id;

        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        let mut comments = MockCommentRepository::new();
        comments
            .expect_create()
            .returning(|issue_id, author_id, body| {
                let mut c = comment(issue_id, author_id);
                c.body = body;
                Ok(c)
            });
        let mut notifications = MockNotificationService::new();
        notifications
            .expect_notify()
            .withf(move |n| n.user_id == reporter && n.kind == NotificationKind::IssueCommented)
            .times(1)
            .returning(|n| {
                Ok(Notification {
                    id: Uuid::new_v4(),
                    user_id: n.user_id,
                    kind: n.kind,
                    title: n.title,
                    body: n.body,
                    link: n.link,
                    read_at: None,
                    created_at: Utc::now(),
                })
            });

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_issues(issues)
            .with_comments(comments);
        let svc = CommentManager::new(Arc::new(uow), Arc::new(notifications));

        let created = svc
            .create(&author, issue_id, "  On it  ".to_string())
            .await
            .unwrap();
        assert_eq!(created.body, "On it");
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let target = issue(Uuid::new_v4(), None);
        let issue_id = target.id;
        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Member))
            .with_issues(issues);
        let svc = CommentManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let actor = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::User);
        let result = svc.create(&actor, issue_id, "   ".to_string()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_only_author_edits() {
        let target = issue(Uuid::new_v4(), None);
        let existing = comment(target.id, Uuid::new_v4());
        let comment_id = existing.id;

        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        let mut comments = MockCommentRepository::new();
        comments
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        comments.expect_update().never();

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Owner))
            .with_issues(issues)
            .with_comments(comments);
        let svc = CommentManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let actor = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::User);
        let result = svc.update(&actor, comment_id, "edited".to_string()).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_team_admin_deletes_any_comment() {
        let target = issue(Uuid::new_v4(), None);
        let existing = comment(target.id, Uuid::new_v4());
        let comment_id = existing.id;

        let mut issues = MockIssueRepository::new();
        issues
            .expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        let mut comments = MockCommentRepository::new();
        comments
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        comments.expect_delete().times(1).returning(|_| Ok(()));

        let uow = TestUnitOfWork::new()
            .with_teams(teams_with_role(TeamRole::Admin))
            .with_issues(issues)
            .with_comments(comments);
        let svc = CommentManager::new(Arc::new(uow), Arc::new(MockNotificationService::new()));

        let actor = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::User);
        svc.delete(&actor, comment_id).await.unwrap();
    }
}
