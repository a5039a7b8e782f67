//! Search across the issues and projects of the caller's teams.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::require_team;
use crate::config::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT, MIN_SEARCH_QUERY_LENGTH};
use crate::domain::{Actor, Issue, Project, TeamRole};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// Search hits grouped by entity
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SearchResults {
    pub query: String,
    pub issues: Vec<Issue>,
    pub projects: Vec<Project>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Case-insensitive substring search over issue titles and
    /// descriptions and project names
    async fn search(
        &self,
        actor: &Actor,
        query: String,
        limit: Option<u64>,
        team_id: Option<Uuid>,
    ) -> AppResult<SearchResults>;
}

/// Trim and length-check a search query.
pub(crate) fn normalize_query(query: &str) -> AppResult<String> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_QUERY_LENGTH {
        return Err(AppError::bad_request(format!(
            "Search query must be at least {} characters",
            MIN_SEARCH_QUERY_LENGTH
        )));
    }
    Ok(query.to_string())
}

pub struct Searcher<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> Searcher<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> SearchService for Searcher<U> {
    async fn search(
        &self,
        actor: &Actor,
        query: String,
        limit: Option<u64>,
        team_id: Option<Uuid>,
    ) -> AppResult<SearchResults> {
        let query = normalize_query(&query)?;
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);

        let team_ids = match team_id {
            Some(team_id) => {
                require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
                vec![team_id]
            }
            None => self.uow.teams().team_ids_for_user(actor.id).await?,
        };
        if team_ids.is_empty() {
            return Ok(SearchResults {
                query,
                ..Default::default()
            });
        }

        let issues = self
            .uow
            .issues()
            .search(team_ids.clone(), query.clone(), limit)
            .await?;
        let projects = self
            .uow
            .projects()
            .search(team_ids, query.clone(), limit)
            .await?;

        Ok(SearchResults {
            query,
            issues,
            projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use crate::infra::repositories::{MockIssueRepository, MockProjectRepository, MockTeamRepository};
    use crate::services::testing::TestUnitOfWork;
    use mockall::predicate::eq;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "dev@example.com", UserRole::User)
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  checkout ").unwrap(), "checkout");
        assert!(matches!(normalize_query(" a "), Err(AppError::BadRequest(_))));
        assert!(normalize_query("").is_err());
    }

    #[tokio::test]
    async fn test_search_is_limited_to_own_teams() {
        let team_a = Uuid::new_v4();
        let mut teams = MockTeamRepository::new();
        teams
            .expect_team_ids_for_user()
            .returning(move |_| Ok(vec![team_a]));
        let mut issues = MockIssueRepository::new();
        issues
            .expect_search()
            .with(eq(vec![team_a]), eq("bug".to_string()), eq(MAX_SEARCH_LIMIT))
            .returning(|_, _, _| Ok(vec![]));
        let mut projects = MockProjectRepository::new();
        projects
            .expect_search()
            .with(eq(vec![team_a]), eq("bug".to_string()), eq(MAX_SEARCH_LIMIT))
            .returning(|_, _, _| Ok(vec![]));

        let uow = TestUnitOfWork::new()
            .with_teams(teams)
            .with_issues(issues)
            .with_projects(projects);
        let results = Searcher::new(Arc::new(uow))
            .search(&actor(), " bug ".to_string(), Some(500), None)
            .await
            .unwrap();

        assert_eq!(results.query, "bug");
    }

    #[tokio::test]
    async fn test_search_without_teams_is_empty() {
        let mut teams = MockTeamRepository::new();
        teams.expect_team_ids_for_user().returning(|_| Ok(vec![]));

        let uow = TestUnitOfWork::new().with_teams(teams);
        let results = Searcher::new(Arc::new(uow))
            .search(&actor(), "bug".to_string(), None, None)
            .await
            .unwrap();

        assert!(results.issues.is_empty() && results.projects.is_empty());
    }

    #[tokio::test]
    async fn test_search_foreign_team_is_hidden() {
        let mut teams = MockTeamRepository::new();
        teams.expect_membership().returning(|_, _| Ok(None));

        let uow = TestUnitOfWork::new().with_teams(teams);
        let result = Searcher::new(Arc::new(uow))
            .search(&actor(), "bug".to_string(), None, Some(Uuid::new_v4()))
            .await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
