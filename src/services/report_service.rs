//! Team dashboard reports, cached briefly in Redis.

use async_trait::async_trait;
use chrono::Utc;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::sync::Arc;
use uuid::Uuid;

use super::access::require_team;
use super::container::parallel;
use crate::config::{DEFAULT_REPORT_WINDOW_DAYS, MAX_REPORT_WINDOW_DAYS, MIN_REPORT_WINDOW_DAYS};
use crate::domain::{Actor, TeamReport, TeamRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, UnitOfWork};

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Report over the last `days` days (default 14)
    async fn team_summary(&self, actor: &Actor, team_id: Uuid, days: Option<i64>) -> AppResult<TeamReport>;
}

pub(crate) fn report_window(days: Option<i64>) -> AppResult<i64> {
    let days = days.unwrap_or(DEFAULT_REPORT_WINDOW_DAYS);
    if (MIN_REPORT_WINDOW_DAYS..=MAX_REPORT_WINDOW_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(AppError::validation(format!(
            "Report window must be between {} and {} days",
            MIN_REPORT_WINDOW_DAYS, MAX_REPORT_WINDOW_DAYS
        )))
    }
}

pub struct Reporter<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Option<Cache>,
}

impl<U: UnitOfWork> Reporter<U> {
    pub fn new(uow: Arc<U>, cache: Option<Cache>) -> Self {
        Self { uow, cache }
    }

    async fn cached(&self, team_id: Uuid, days: i64) -> Option<TeamReport> {
        let cache = self.cache.as_ref()?;
        match cache.get_report(&team_id, days).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(team_id = %team_id, "Report cache read failed: {}", e);
                None
            }
        }
    }

    async fn store(&self, report: &TeamReport) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set_report(report).await {
                tracing::warn!(team_id = %report.team_id, "Report cache write failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> ReportService for Reporter<U> {
    async fn team_summary(&self, actor: &Actor, team_id: Uuid, days: Option<i64>) -> AppResult<TeamReport> {
        let days = report_window(days)?;
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;

        if let Some(report) = self.cached(team_id, days).await {
            return Ok(report);
        }

        let statuses = self.uow.statuses();
        let projects = self.uow.projects();
        let issues = self.uow.issues();
        let (statuses, projects, issues) = parallel::join3(
            statuses.list_by_team(team_id),
            projects.list_by_team(team_id, false),
            issues.list_by_team(team_id),
        )
        .await?;

        let report = TeamReport::build(team_id, days, Utc::now(), &statuses, &projects, &issues);
        tracing::debug!(team_id = %team_id, days, issues = report.total_issues, "Report built");

        self.store(&report).await;
        Ok(report)
    }
}
