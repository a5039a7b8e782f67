//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// What triggered a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    IssueAssigned,
    IssueCommented,
    TeamInvite,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::IssueAssigned => "issue_assigned",
            NotificationKind::IssueCommented => "issue_commented",
            NotificationKind::TeamInvite => "team_invite",
            NotificationKind::System => "system",
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(s: &str) -> Self {
        match s {
            "issue_assigned" => NotificationKind::IssueAssigned,
            "issue_commented" => NotificationKind::IssueCommented,
            "team_invite" => NotificationKind::TeamInvite,
            _ => NotificationKind::System,
        }
    }
}

/// Notification row
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    #[schema(example = "You were assigned PRJ-12")]
    pub title: String,
    pub body: String,
    /// Client route to open when the notification is clicked
    pub link: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Notification to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Unread counter response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: u64,
}
