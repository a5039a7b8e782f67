//! Repository layer - Data access abstraction
//!
//! Repositories provide an abstraction over data persistence,
//! following the Repository pattern for clean separation of concerns.

mod comment_repository;
pub(crate) mod entities;
pub(crate) mod issue_repository;
mod label_repository;
mod notification_repository;
mod project_repository;
pub(crate) mod status_repository;
pub(crate) mod team_repository;
mod usage_repository;
mod user_repository;

pub use comment_repository::{CommentRepository, CommentStore};
pub use issue_repository::{IssueRepository, IssueStore};
pub use label_repository::{LabelRepository, LabelStore};
pub use notification_repository::{NotificationRepository, NotificationStore};
pub use project_repository::{ProjectRepository, ProjectStore};
pub use status_repository::{StatusRepository, StatusStore};
pub use team_repository::{TeamRepository, TeamStore};
pub use usage_repository::{UsageRepository, UsageStore};
pub use user_repository::{UserRepository, UserStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use comment_repository::MockCommentRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use issue_repository::MockIssueRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use label_repository::MockLabelRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use notification_repository::MockNotificationRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use project_repository::MockProjectRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use status_repository::MockStatusRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use team_repository::MockTeamRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use usage_repository::MockUsageRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;

/// ILIKE pattern matching `query` anywhere, with wildcards in the input escaped
pub(crate) fn contains_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
