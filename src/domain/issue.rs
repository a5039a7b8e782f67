//! Issue domain entity, filters and patches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Label, StatusCategory};
use crate::errors::{AppError, AppResult};

/// Issue priority, ordered from least to most urgent.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::None,
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown priority '{}'", s)))
    }
}

/// Issue domain entity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Issue {
    pub id: Uuid,
    pub team_id: Uuid,
    pub project_id: Uuid,
    /// Sequential number inside the project
    #[schema(example = 42)]
    pub number: i32,
    #[schema(example = "Checkout fails for saved cards")]
    pub title: String,
    pub description: Option<String>,
    pub status_id: Uuid,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Overdue issues have a due date in the past and are still open.
    pub fn is_overdue(&self, today: NaiveDate, category: StatusCategory) -> bool {
        !category.is_closed() && self.due_date.map(|d| d < today).unwrap_or(false)
    }
}

/// Issue together with its labels
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueDetails {
    #[serde(flatten)]
    pub issue: Issue,
    pub labels: Vec<Label>,
}

/// Issue creation data (after service-level defaults are resolved)
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub team_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status_id: Uuid,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Issue creation request as a caller expresses it
#[derive(Debug, Clone, Default)]
pub struct IssueDraft {
    pub title: String,
    pub description: Option<String>,
    pub status_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Uuid>,
    pub label_ids: Vec<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Partial issue update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Option<Uuid>>,
    pub due_date: Option<Option<NaiveDate>>,
    /// Resolved by the service from the target status category
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl IssuePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status_id.is_none()
            && self.priority.is_none()
            && self.assignee_id.is_none()
            && self.due_date.is_none()
    }
}

/// Where an issue listing is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueScope {
    Project(Uuid),
    Team(Uuid),
}

/// Issue listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFilter {
    pub scope: IssueScope,
    pub status_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub label_id: Option<Uuid>,
}

impl IssueFilter {
    pub fn project(project_id: Uuid) -> Self {
        Self {
            scope: IssueScope::Project(project_id),
            status_id: None,
            assignee_id: None,
            priority: None,
            label_id: None,
        }
    }

    pub fn team(team_id: Uuid) -> Self {
        Self {
            scope: IssueScope::Team(team_id),
            ..Self::project(Uuid::nil())
        }
    }
}

/// Decide how `completed_at` must change when an issue moves between
/// status categories.
///
/// Returns `None` when the field stays as it is.
pub fn completion_transition(
    from: StatusCategory,
    to: StatusCategory,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    let was_done = from == StatusCategory::Completed;
    let is_done = to == StatusCategory::Completed;

    match (was_done, is_done) {
        (false, true) => Some(Some(now)),
        (true, false) => Some(None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse() {
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("p0".parse::<Priority>().is_err());
        assert!(Priority::Urgent > Priority::Low);
    }

    #[test]
    fn test_completion_transition() {
        let now = Utc::now();
        assert_eq!(
            completion_transition(StatusCategory::Started, StatusCategory::Completed, now),
            Some(Some(now))
        );
        assert_eq!(
            completion_transition(StatusCategory::Completed, StatusCategory::Started, now),
            Some(None)
        );
        assert_eq!(
            completion_transition(StatusCategory::Backlog, StatusCategory::Started, now),
            None
        );
        assert_eq!(
            completion_transition(StatusCategory::Completed, StatusCategory::Completed, now),
            None
        );
    }

    #[test]
    fn test_team_filter_has_no_extra_constraints() {
        let team_id = Uuid::new_v4();
        let filter = IssueFilter::team(team_id);
        assert_eq!(filter.scope, IssueScope::Team(team_id));
        assert!(filter.status_id.is_none() && filter.label_id.is_none());
    }

    #[test]
    fn test_empty_patch() {
        assert!(IssuePatch::default().is_empty());
        let patch = IssuePatch {
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
