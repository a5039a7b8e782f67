//! Workflow statuses and labels, both owned by a team.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid regex"));

/// Validate a `#RRGGBB` color string.
pub fn validate_color(color: &str) -> AppResult<()> {
    if HEX_COLOR.is_match(color) {
        Ok(())
    } else {
        Err(AppError::validation("Color must be a hex value like #5E6AD2"))
    }
}

/// Lifecycle bucket a status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Backlog,
    Unstarted,
    Started,
    Completed,
    Canceled,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 5] = [
        StatusCategory::Backlog,
        StatusCategory::Unstarted,
        StatusCategory::Started,
        StatusCategory::Completed,
        StatusCategory::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Backlog => "backlog",
            StatusCategory::Unstarted => "unstarted",
            StatusCategory::Started => "started",
            StatusCategory::Completed => "completed",
            StatusCategory::Canceled => "canceled",
        }
    }

    /// Completed and canceled issues are closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, StatusCategory::Completed | StatusCategory::Canceled)
    }

    /// Categories a team must always keep at least one status in.
    pub fn is_required(&self) -> bool {
        matches!(self, StatusCategory::Backlog | StatusCategory::Unstarted)
    }
}

impl std::str::FromStr for StatusCategory {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        StatusCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown status category '{}'", s)))
    }
}

/// Workflow status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Status {
    pub id: Uuid,
    pub team_id: Uuid,
    #[schema(example = "In Progress")]
    pub name: String,
    pub category: StatusCategory,
    #[schema(example = "#F2C94C")]
    pub color: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Status creation data
#[derive(Debug, Clone)]
pub struct NewStatus {
    pub team_id: Uuid,
    pub name: String,
    pub category: StatusCategory,
    pub color: String,
    pub position: i32,
}

/// Partial status update
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub position: Option<i32>,
}

/// Statuses every new team starts with.
pub fn default_statuses(team_id: Uuid) -> Vec<NewStatus> {
    [
        ("Backlog", StatusCategory::Backlog, "#BEC2C8"),
        ("Todo", StatusCategory::Unstarted, "#E2E2E2"),
        ("In Progress", StatusCategory::Started, "#F2C94C"),
        ("Done", StatusCategory::Completed, "#5E6AD2"),
        ("Canceled", StatusCategory::Canceled, "#95A2B3"),
    ]
    .into_iter()
    .enumerate()
    .map(|(position, (name, category, color))| NewStatus {
        team_id,
        name: name.to_string(),
        category,
        color: color.to_string(),
        position: position as i32,
    })
    .collect()
}

/// Pick the status a new issue lands in when none is given.
pub fn default_issue_status(statuses: &[Status]) -> Option<&Status> {
    statuses
        .iter()
        .filter(|s| s.category == StatusCategory::Unstarted)
        .min_by_key(|s| s.position)
        .or_else(|| statuses.iter().min_by_key(|s| s.position))
}

/// Issue label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Label {
    pub id: Uuid,
    pub team_id: Uuid,
    #[schema(example = "bug")]
    pub name: String,
    #[schema(example = "#EB5757")]
    pub color: String,
    pub created_at: DateTime<Utc>,
}
