//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, chat_handler, comment_handler, health_handler, issue_handler,
    notification_handler, project_handler, report_handler, search_handler, team_handler,
    user_handler, workflow_handler,
};
use crate::domain::{
    Bucket, Comment, Issue, IssueDetails, Label, Notification, NotificationKind, Priority,
    Project, ProjectProgress, ProjectStatus, Status, StatusCategory, Team, TeamMember,
    TeamMemberResponse, TeamReport, TeamRole, TeamWithRole, UnreadCount, UsageSummary,
    UserResponse, UserRole, Workload,
};
use crate::services::{
    ChatContext, ChatReply, ChatRequest, ChatTurn, ChatUsage, SearchResults, TokenResponse,
    ToolCallRecord, TurnRole, UsageReport,
};
use crate::types::pagination::{
    PaginatedIssues, PaginatedNotifications, PaginatedUsers, PaginationMeta,
};

/// OpenAPI documentation for the IRIS API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "IRIS API",
        version = "0.1.0",
        description = "Multi-tenant project management with the ARIA assistant"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health_handler::health,
        // Authentication
        auth_handler::register,
        auth_handler::login,
        auth_handler::change_password,
        // Users
        user_handler::get_current_user,
        user_handler::list_users,
        user_handler::get_user,
        user_handler::update_user,
        user_handler::delete_user,
        user_handler::restore_user,
        // Teams
        team_handler::list_teams,
        team_handler::create_team,
        team_handler::get_team,
        team_handler::update_team,
        team_handler::delete_team,
        team_handler::list_members,
        team_handler::add_member,
        team_handler::update_member,
        team_handler::remove_member,
        // Workflow
        workflow_handler::list_statuses,
        workflow_handler::create_status,
        workflow_handler::update_status,
        workflow_handler::delete_status,
        workflow_handler::list_labels,
        workflow_handler::create_label,
        workflow_handler::update_label,
        workflow_handler::delete_label,
        // Projects
        project_handler::list_projects,
        project_handler::create_project,
        project_handler::get_project,
        project_handler::update_project,
        project_handler::delete_project,
        project_handler::archive_project,
        project_handler::unarchive_project,
        // Issues
        issue_handler::list_issues,
        issue_handler::create_issue,
        issue_handler::get_issue,
        issue_handler::update_issue,
        issue_handler::delete_issue,
        issue_handler::set_labels,
        // Comments
        comment_handler::list_comments,
        comment_handler::create_comment,
        comment_handler::update_comment,
        comment_handler::delete_comment,
        // Notifications
        notification_handler::list_notifications,
        notification_handler::unread_count,
        notification_handler::mark_read,
        notification_handler::mark_all_read,
        notification_handler::delete_notification,
        // Search and reports
        search_handler::search,
        report_handler::team_report,
        // Assistant
        chat_handler::chat,
        chat_handler::usage,
    ),
    components(
        schemas(
            // Domain types
            UserRole,
            UserResponse,
            Team,
            TeamRole,
            TeamWithRole,
            TeamMember,
            TeamMemberResponse,
            Status,
            StatusCategory,
            Label,
            Project,
            ProjectStatus,
            Issue,
            IssueDetails,
            Priority,
            Comment,
            Notification,
            NotificationKind,
            UnreadCount,
            TeamReport,
            Bucket,
            Workload,
            ProjectProgress,
            UsageSummary,
            // Service types
            TokenResponse,
            SearchResults,
            ChatTurn,
            TurnRole,
            ChatContext,
            ChatRequest,
            ChatReply,
            ChatUsage,
            ToolCallRecord,
            UsageReport,
            // Shared types
            PaginationMeta,
            PaginatedUsers,
            PaginatedIssues,
            PaginatedNotifications,
            health_handler::HealthResponse,
            health_handler::ServiceHealth,
            health_handler::ServiceStatus,
            // Request bodies
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::ChangePasswordRequest,
            user_handler::UpdateUserRequest,
            team_handler::CreateTeamRequest,
            team_handler::UpdateTeamRequest,
            team_handler::AddMemberRequest,
            team_handler::UpdateMemberRequest,
            workflow_handler::CreateStatusRequest,
            workflow_handler::UpdateStatusRequest,
            workflow_handler::CreateLabelRequest,
            workflow_handler::UpdateLabelRequest,
            project_handler::CreateProjectRequest,
            project_handler::UpdateProjectRequest,
            issue_handler::CreateIssueRequest,
            issue_handler::UpdateIssueRequest,
            issue_handler::SetLabelsRequest,
            comment_handler::CommentRequest,
            notification_handler::MarkedRead,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and dependency checks"),
        (name = "Authentication", description = "Registration, login and password changes"),
        (name = "Users", description = "User accounts"),
        (name = "Teams", description = "Teams and memberships"),
        (name = "Workflow", description = "Per-team statuses and labels"),
        (name = "Projects", description = "Projects within a team"),
        (name = "Issues", description = "Issue tracking"),
        (name = "Comments", description = "Issue discussion"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Search", description = "Full-text search across accessible teams"),
        (name = "Reports", description = "Team analytics"),
        (name = "Assistant", description = "ARIA, the AI assistant")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
