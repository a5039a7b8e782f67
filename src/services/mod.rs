//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. Every operation takes the calling [`Actor`]
//! and checks team access before touching data.
//!
//! All services use the Unit of Work pattern for centralized repository
//! access and transaction management.
//!
//! [`Actor`]: crate::domain::Actor

mod access;
pub mod assistant;
mod auth_service;
mod comment_service;
pub mod container;
mod issue_service;
mod notification_service;
mod project_service;
mod report_service;
mod search_service;
mod team_service;
mod user_service;
mod workflow_service;

#[cfg(test)]
mod testing;

// Service Container
pub use container::{parallel, ServiceContainer, Services};

// Service traits and implementations
pub use assistant::{
    Assistant, AssistantService, ChatContext, ChatReply, ChatRequest, ChatTurn, ChatUsage,
    ServiceTools, ToolCallRecord, ToolHandler, ToolOutcome, TurnRole, UsageReport,
};
pub use auth_service::{AuthService, Authenticator, Claims, TokenResponse};
pub use comment_service::{CommentManager, CommentService};
pub use issue_service::{IssueManager, IssueQuery, IssueService};
pub use notification_service::{NotificationService, Notifier};
pub use project_service::{CreateProject, ProjectManager, ProjectService};
pub use report_service::{ReportService, Reporter};
pub use search_service::{SearchResults, SearchService, Searcher};
pub use team_service::{CreateTeam, TeamManager, TeamService};
pub use user_service::{UserManager, UserService};
pub use workflow_service::{WorkflowManager, WorkflowService};

#[cfg(any(test, feature = "test-utils"))]
pub use assistant::{MockAssistantService, MockToolHandler};
#[cfg(any(test, feature = "test-utils"))]
pub use comment_service::MockCommentService;
#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
#[cfg(any(test, feature = "test-utils"))]
pub use issue_service::MockIssueService;
#[cfg(any(test, feature = "test-utils"))]
pub use notification_service::MockNotificationService;
#[cfg(any(test, feature = "test-utils"))]
pub use project_service::MockProjectService;
#[cfg(any(test, feature = "test-utils"))]
pub use report_service::MockReportService;
#[cfg(any(test, feature = "test-utils"))]
pub use search_service::MockSearchService;
#[cfg(any(test, feature = "test-utils"))]
pub use team_service::MockTeamService;
#[cfg(any(test, feature = "test-utils"))]
pub use workflow_service::MockWorkflowService;
