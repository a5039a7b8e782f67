//! Team dashboard report.
//!
//! Built in memory from a team's issues, statuses and projects. An empty
//! team yields an all-zero report.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Issue, Priority, Project, Status, StatusCategory};

/// Count of issues in one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Bucket {
    pub key: String,
    pub count: u64,
}

/// Open work carried by one assignee (`None` = unassigned)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Workload {
    pub assignee_id: Option<Uuid>,
    pub open: u64,
    pub urgent: u64,
}

/// Completion progress of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectProgress {
    pub project_id: Uuid,
    pub name: String,
    pub total: u64,
    pub completed: u64,
    /// Completed share in [0, 1]; 0 for empty projects
    pub progress: f64,
}

/// Aggregated team report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamReport {
    pub team_id: Uuid,
    pub window_days: i64,
    pub generated_at: DateTime<Utc>,
    pub total_issues: u64,
    pub open_issues: u64,
    pub created_in_window: u64,
    pub completed_in_window: u64,
    pub overdue: u64,
    pub by_category: Vec<Bucket>,
    pub by_priority: Vec<Bucket>,
    pub workload: Vec<Workload>,
    pub projects: Vec<ProjectProgress>,
}

impl TeamReport {
    pub fn build(
        team_id: Uuid,
        window_days: i64,
        now: DateTime<Utc>,
        statuses: &[Status],
        projects: &[Project],
        issues: &[Issue],
    ) -> Self {
        let categories: HashMap<Uuid, StatusCategory> =
            statuses.iter().map(|s| (s.id, s.category)).collect();
        let category_of = |issue: &Issue| {
            categories
                .get(&issue.status_id)
                .copied()
                .unwrap_or(StatusCategory::Backlog)
        };

        let window_start = now - Duration::days(window_days);
        let today = now.date_naive();

        let mut by_category: BTreeMap<&'static str, u64> = StatusCategory::ALL
            .iter()
            .map(|c| (c.as_str(), 0))
            .collect();
        let mut by_priority: BTreeMap<Priority, u64> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut workload: HashMap<Option<Uuid>, Workload> = HashMap::new();
        let mut per_project: HashMap<Uuid, (u64, u64)> = HashMap::new();

        let mut open_issues = 0;
        let mut created_in_window = 0;
        let mut completed_in_window = 0;
        let mut overdue = 0;

        for issue in issues {
            let category = category_of(issue);
            *by_category.entry(category.as_str()).or_default() += 1;
            *by_priority.entry(issue.priority).or_default() += 1;

            let project = per_project.entry(issue.project_id).or_default();
            project.0 += 1;
            if category == StatusCategory::Completed {
                project.1 += 1;
            }

            if issue.created_at >= window_start {
                created_in_window += 1;
            }
            if issue.completed_at.map(|t| t >= window_start).unwrap_or(false) {
                completed_in_window += 1;
            }
            if issue.is_overdue(today, category) {
                overdue += 1;
            }

            if !category.is_closed() {
                open_issues += 1;
                let entry = workload.entry(issue.assignee_id).or_insert(Workload {
                    assignee_id: issue.assignee_id,
                    open: 0,
                    urgent: 0,
                });
                entry.open += 1;
                if issue.priority == Priority::Urgent {
                    entry.urgent += 1;
                }
            }
        }

        let mut workload: Vec<Workload> = workload.into_values().collect();
        workload.sort_by(|a, b| b.open.cmp(&a.open).then(a.assignee_id.cmp(&b.assignee_id)));

        let projects = projects
            .iter()
            .filter(|p| !p.is_archived())
            .map(|p| {
                let (total, completed) = per_project.get(&p.id).copied().unwrap_or((0, 0));
                ProjectProgress {
                    project_id: p.id,
                    name: p.name.clone(),
                    total,
                    completed,
                    progress: if total == 0 {
                        0.0
                    } else {
                        completed as f64 / total as f64
                    },
                }
            })
            .collect();

        Self {
            team_id,
            window_days,
            generated_at: now,
            total_issues: issues.len() as u64,
            open_issues,
            created_in_window,
            completed_in_window,
            overdue,
            by_category: by_category
                .into_iter()
                .map(|(key, count)| Bucket {
                    key: key.to_string(),
                    count,
                })
                .collect(),
            by_priority: by_priority
                .into_iter()
                .rev()
                .map(|(p, count)| Bucket {
                    key: p.as_str().to_string(),
                    count,
                })
                .collect(),
            workload,
            projects,
        }
    }
}
