//! Runs ARIA tool calls through the regular services.
//!
//! Every call executes with the chatting user's permissions, so access and
//! validation errors surface to the model as failed tool results.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::tools::{self, ToolAccess, ToolRejection, ToolRequest};
use super::ChatContext;
use crate::config::MAX_TOOL_ROWS;
use crate::domain::{Actor, IssueDraft, IssuePatch};
use crate::errors::{AppError, AppResult};
use crate::infra::{ToolCall, ToolDefinition};
use crate::services::{
    CommentService, IssueQuery, IssueService, NotificationService, ProjectService, ReportService,
    SearchService, TeamService, WorkflowService,
};
use crate::types::PaginationParams;

/// Result of one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub ok: bool,
    /// One line for the user-facing call log
    pub summary: String,
    /// JSON document answered back to the model
    pub content: String,
}

impl ToolOutcome {
    pub fn success(summary: impl Into<String>, result: Value) -> Self {
        Self {
            ok: true,
            summary: summary.into(),
            content: json!({ "ok": true, "result": result }).to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            ok: false,
            content: json!({ "ok": false, "error": message }).to_string(),
            summary: message,
        }
    }
}

/// Executes the assistant's tools and describes the chat context.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Lines describing the entities the user is looking at. Entities the
    /// user cannot see are left out.
    async fn context_notes(&self, actor: &Actor, context: &ChatContext) -> Vec<String>;

    async fn execute(&self, actor: &Actor, call: &ToolCall, read_only: bool) -> ToolOutcome;
}

fn to_json<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::internal(format!("Tool result encoding failed: {}", e)))
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn tool_page() -> PaginationParams {
    PaginationParams {
        page: 1,
        per_page: MAX_TOOL_ROWS,
    }
}

/// Tool handler backed by the application services
pub struct ServiceTools {
    pub teams: Arc<dyn TeamService>,
    pub workflow: Arc<dyn WorkflowService>,
    pub projects: Arc<dyn ProjectService>,
    pub issues: Arc<dyn IssueService>,
    pub comments: Arc<dyn CommentService>,
    pub notifications: Arc<dyn NotificationService>,
    pub search: Arc<dyn SearchService>,
    pub reports: Arc<dyn ReportService>,
}

impl ServiceTools {
    /// Resolve a status given as an id or a (case-insensitive) name.
    async fn resolve_status(&self, actor: &Actor, project_id: Uuid, status: &str) -> AppResult<Uuid> {
        if let Ok(id) = status.parse::<Uuid>() {
            return Ok(id);
        }

        let project = self.projects.get(actor, project_id).await?;
        self.workflow
            .list_statuses(actor, project.team_id)
            .await?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(status.trim()))
            .map(|s| s.id)
            .ok_or_else(|| AppError::validation(format!("No status named '{}'", status)))
    }

    async fn run(&self, actor: &Actor, request: ToolRequest) -> AppResult<(String, Value)> {
        match request {
            ToolRequest::ListTeams {} => {
                let teams = self.teams.list_mine(actor).await?;
                let rows: Vec<Value> = teams
                    .iter()
                    .map(|t| {
                        json!({
                            "id": t.team.id,
                            "name": t.team.name,
                            "slug": t.team.slug,
                            "role": t.role,
                        })
                    })
                    .collect();
                Ok((plural(rows.len(), "team"), Value::Array(rows)))
            }

            ToolRequest::ListProjects(args) => {
                let projects = self.projects.list(actor, args.team_id, false).await?;
                let rows: Vec<Value> = projects
                    .iter()
                    .take(MAX_TOOL_ROWS as usize)
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "name": p.name,
                            "status": p.status,
                            "lead_id": p.lead_id,
                            "target_date": p.target_date,
                        })
                    })
                    .collect();
                Ok((plural(projects.len(), "project"), Value::Array(rows)))
            }

            ToolRequest::ListIssues(args) => {
                let status_id = match &args.status {
                    Some(status) => Some(self.resolve_status(actor, args.project_id, status).await?),
                    None => None,
                };
                let query = IssueQuery {
                    project_id: Some(args.project_id),
                    status_id,
                    assignee_id: args.assignee_id,
                    ..Default::default()
                };
                let page = self.issues.list(actor, query, tool_page()).await?;
                let summary = format!("{} of {}", page.data.len(), plural(page.meta.total as usize, "issue"));
                Ok((summary, to_json(&page.data)?))
            }

            ToolRequest::GetIssue(args) => {
                let details = self.issues.get(actor, args.issue_id).await?;
                let comments = self.comments.list(actor, args.issue_id).await?;
                let recent: Vec<_> = comments.iter().rev().take(10).rev().collect();
                let summary = format!("Issue #{}: {}", details.issue.number, details.issue.title);
                let result = json!({
                    "issue": to_json(&details)?,
                    "comments": to_json(&recent)?,
                    "comment_count": comments.len(),
                });
                Ok((summary, result))
            }

            ToolRequest::Search(args) => {
                let results = self
                    .search
                    .search(actor, args.query, Some(MAX_TOOL_ROWS), None)
                    .await?;
                let summary = format!(
                    "{} and {}",
                    plural(results.issues.len(), "issue"),
                    plural(results.projects.len(), "project")
                );
                Ok((summary, to_json(&results)?))
            }

            ToolRequest::TeamSummary(args) => {
                let report = self.reports.team_summary(actor, args.team_id, None).await?;
                let summary = format!(
                    "{} open, {} overdue",
                    plural(report.open_issues as usize, "issue"),
                    report.overdue
                );
                Ok((summary, to_json(&report)?))
            }

            ToolRequest::ListNotifications {} => {
                let page = self.notifications.list(actor, true, tool_page()).await?;
                let summary = format!("{} unread", plural(page.meta.total as usize, "notification"));
                Ok((summary, to_json(&page.data)?))
            }

            ToolRequest::CreateIssue(args) => {
                let draft = IssueDraft {
                    title: args.title,
                    description: args.description,
                    priority: args.priority,
                    assignee_id: args.assignee_id,
                    ..Default::default()
                };
                let created = self.issues.create(actor, args.project_id, draft).await?;
                let summary = format!("Created issue #{}: {}", created.issue.number, created.issue.title);
                Ok((summary, to_json(&created)?))
            }

            ToolRequest::UpdateIssue(args) => {
                let patch = IssuePatch {
                    title: args.title,
                    status_id: args.status_id,
                    priority: args.priority,
                    assignee_id: args.assignee_id.map(Some),
                    ..Default::default()
                };
                if patch.is_empty() {
                    return Err(AppError::validation("Nothing to update"));
                }
                let updated = self.issues.update(actor, args.issue_id, patch).await?;
                let summary = format!("Updated issue #{}", updated.issue.number);
                Ok((summary, to_json(&updated)?))
            }

            ToolRequest::AddComment(args) => {
                let comment = self.comments.create(actor, args.issue_id, args.body).await?;
                Ok(("Comment added".to_string(), to_json(&comment)?))
            }
        }
    }
}

#[async_trait]
impl ToolHandler for ServiceTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        tools::definitions()
    }

    async fn context_notes(&self, actor: &Actor, context: &ChatContext) -> Vec<String> {
        let mut notes = Vec::new();

        if let Some(team_id) = context.team_id {
            match self.teams.get(actor, team_id).await {
                Ok(t) => notes.push(format!(
                    "Team: {} (id {}, the user's role: {})",
                    t.team.name, t.team.id, t.role
                )),
                Err(e) => tracing::debug!(team_id = %team_id, "Context team skipped: {}", e),
            }
        }
        if let Some(project_id) = context.project_id {
            match self.projects.get(actor, project_id).await {
                Ok(p) => notes.push(format!(
                    "Project: {} (id {}, status {})",
                    p.name,
                    p.id,
                    p.status.as_str()
                )),
                Err(e) => tracing::debug!(project_id = %project_id, "Context project skipped: {}", e),
            }
        }
        if let Some(issue_id) = context.issue_id {
            match self.issues.get(actor, issue_id).await {
                Ok(d) => notes.push(format!(
                    "Issue: #{} {} (id {}, project {})",
                    d.issue.number, d.issue.title, d.issue.id, d.issue.project_id
                )),
                Err(e) => tracing::debug!(issue_id = %issue_id, "Context issue skipped: {}", e),
            }
        }
        if let Some(page) = context.page.as_deref().filter(|p| !p.trim().is_empty()) {
            notes.push(format!("Current page: {}", page.trim()));
        }

        notes
    }

    async fn execute(&self, actor: &Actor, call: &ToolCall, read_only: bool) -> ToolOutcome {
        let request = match ToolRequest::parse(&call.name, &call.arguments) {
            Ok(request) => request,
            Err(rejection) => {
                tracing::warn!(tool = %call.name, user_id = %actor.id, "Tool call rejected: {}", rejection);
                return ToolOutcome::failure(rejection.to_string());
            }
        };
        if read_only && request.access() == ToolAccess::Write {
            return ToolOutcome::failure(ToolRejection::ReadOnly(call.name.clone()).to_string());
        }

        match self.run(actor, request).await {
            Ok((summary, result)) => {
                tracing::info!(tool = %call.name, user_id = %actor.id, "Tool call succeeded");
                ToolOutcome::success(summary, result)
            }
            Err(e) => {
                tracing::info!(tool = %call.name, user_id = %actor.id, "Tool call failed: {}", e);
                ToolOutcome::failure(e.user_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Team, TeamRole, TeamWithRole, UserRole};
    use crate::services::{
        MockCommentService, MockIssueService, MockNotificationService, MockProjectService,
        MockReportService, MockSearchService, MockTeamService, MockWorkflowService,
    };
    use chrono::Utc;

    struct Mocks {
        teams: MockTeamService,
        projects: MockProjectService,
        issues: MockIssueService,
        comments: MockCommentService,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                teams: MockTeamService::new(),
                projects: MockProjectService::new(),
                issues: MockIssueService::new(),
                comments: MockCommentService::new(),
            }
        }

        fn build(self) -> ServiceTools {
            ServiceTools {
                teams: Arc::new(self.teams),
                workflow: Arc::new(MockWorkflowService::new()),
                projects: Arc::new(self.projects),
                issues: Arc::new(self.issues),
                comments: Arc::new(self.comments),
                notifications: Arc::new(MockNotificationService::new()),
                search: Arc::new(MockSearchService::new()),
                reports: Arc::new(MockReportService::new()),
            }
        }
    }

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "dev@example.com", UserRole::User)
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_teams() {
        let mut mocks = Mocks::new();
        mocks.teams.expect_list_mine().returning(|_| {
            Ok(vec![TeamWithRole {
                team: Team {
                    id: Uuid::new_v4(),
                    name: "Core".to_string(),
                    slug: "core".to_string(),
                    description: None,
                    owner_id: Uuid::new_v4(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
                role: TeamRole::Member,
            }])
        });

        let outcome = mocks.build().execute(&actor(), &call("list_teams", "{}"), false).await;

        assert!(outcome.ok);
        assert_eq!(outcome.summary, "1 team");
        let content: Value = serde_json::from_str(&outcome.content).unwrap();
        assert_eq!(content["result"][0]["role"], "member");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_result() {
        let outcome = Mocks::new()
            .build()
            .execute(&actor(), &call("delete_everything", "{}"), false)
            .await;

        assert!(!outcome.ok);
        assert!(outcome.summary.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_write_tool_refused_when_read_only() {
        let mut mocks = Mocks::new();
        mocks.comments.expect_create().never();

        let args = format!(r#"{{"issue_id":"{}","body":"done"}}"#, Uuid::new_v4());
        let outcome = mocks
            .build()
            .execute(&actor(), &call("add_comment", &args), true)
            .await;

        assert!(!outcome.ok);
        assert!(outcome.summary.contains("read-only"));
    }

    #[tokio::test]
    async fn test_service_errors_become_tool_failures() {
        let mut mocks = Mocks::new();
        mocks
            .projects
            .expect_list()
            .returning(|_, _, _| Err(AppError::NotFound));

        let args = format!(r#"{{"team_id":"{}"}}"#, Uuid::new_v4());
        let outcome = mocks
            .build()
            .execute(&actor(), &call("list_projects", &args), false)
            .await;

        assert!(!outcome.ok);
        let content: Value = serde_json::from_str(&outcome.content).unwrap();
        assert_eq!(content["error"], "Resource not found");
    }

    #[tokio::test]
    async fn test_empty_update_is_refused() {
        let mut mocks = Mocks::new();
        mocks.issues.expect_update().never();

        let args = format!(r#"{{"issue_id":"{}"}}"#, Uuid::new_v4());
        let outcome = mocks
            .build()
            .execute(&actor(), &call("update_issue", &args), false)
            .await;

        assert!(!outcome.ok);
        assert_eq!(outcome.summary, "Nothing to update");
    }

    #[tokio::test]
    async fn test_context_skips_invisible_entities() {
        let mut mocks = Mocks::new();
        mocks
            .projects
            .expect_get()
            .returning(|_, _| Err(AppError::NotFound));

        let context = ChatContext {
            project_id: Some(Uuid::new_v4()),
            page: Some("/board".to_string()),
            ..Default::default()
        };
        let notes = mocks.build().context_notes(&actor(), &context).await;

        assert_eq!(notes, vec!["Current page: /board".to_string()]);
    }
}
