//! Domain layer - Core business entities and logic
//!
//! Entities, value objects and the pure rules around them (access levels,
//! status transitions, report aggregation). Nothing here touches storage.

pub mod access;
pub mod comment;
pub mod issue;
pub mod notification;
pub mod password;
pub mod project;
pub mod report;
pub mod team;
pub mod usage;
pub mod user;
pub mod workflow;

pub use access::Actor;
pub use comment::Comment;
pub use issue::{
    completion_transition, Issue, IssueDetails, IssueDraft, IssueFilter, IssuePatch, IssueScope,
    NewIssue, Priority,
};
pub use notification::{NewNotification, Notification, NotificationKind, UnreadCount};
pub use password::Password;
pub use project::{NewProject, Project, ProjectPatch, ProjectStatus};
pub use report::{Bucket, ProjectProgress, TeamReport, Workload};
pub use team::{
    slugify, validate_slug, NewTeam, Team, TeamMember, TeamMemberResponse, TeamPatch, TeamRole,
    TeamWithRole,
};
pub use usage::{UsageLog, UsageRecord, UsageSummary};
pub use user::{User, UserResponse, UserRole};
pub use workflow::{
    default_issue_status, default_statuses, validate_color, Label, NewStatus, Status,
    StatusCategory, StatusPatch,
};
