//! Service Container - Centralized service access.
//!
//! Wires every service over one shared Unit of Work and hands them out as
//! trait objects, so handlers never see concrete implementations.

use std::future::Future;
use std::sync::Arc;

use super::assistant::{Assistant, AssistantService, ServiceTools};
use super::{
    AuthService, Authenticator, CommentManager, CommentService, IssueManager, IssueService,
    NotificationService, Notifier, ProjectManager, ProjectService, ReportService, Reporter,
    SearchService, Searcher, TeamManager, TeamService, UserManager, UserService, WorkflowManager,
    WorkflowService,
};
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Cache, DisabledLanguageModel, LanguageModel, OpenAiClient, Persistence, UnitOfWork};
use crate::jobs::EmailQueue;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn users(&self) -> Arc<dyn UserService>;

    fn teams(&self) -> Arc<dyn TeamService>;

    /// Statuses and labels
    fn workflow(&self) -> Arc<dyn WorkflowService>;

    fn projects(&self) -> Arc<dyn ProjectService>;

    fn issues(&self) -> Arc<dyn IssueService>;

    fn comments(&self) -> Arc<dyn CommentService>;

    fn notifications(&self) -> Arc<dyn NotificationService>;

    fn search(&self) -> Arc<dyn SearchService>;

    fn reports(&self) -> Arc<dyn ReportService>;

    fn assistant(&self) -> Arc<dyn AssistantService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    auth: Arc<dyn AuthService>,
    users: Arc<dyn UserService>,
    teams: Arc<dyn TeamService>,
    workflow: Arc<dyn WorkflowService>,
    projects: Arc<dyn ProjectService>,
    issues: Arc<dyn IssueService>,
    comments: Arc<dyn CommentService>,
    notifications: Arc<dyn NotificationService>,
    search: Arc<dyn SearchService>,
    reports: Arc<dyn ReportService>,
    assistant: Arc<dyn AssistantService>,
}

impl Services {
    /// Build every service from a database connection.
    ///
    /// `cache` backs the report cache when present. The assistant talks to
    /// the configured provider, or refuses every chat when no API key is set.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        config: &Config,
        cache: Option<Cache>,
        mailer: Arc<dyn EmailQueue>,
    ) -> AppResult<Self> {
        let model: Arc<dyn LanguageModel> = if config.ai.is_enabled() {
            Arc::new(OpenAiClient::new(&config.ai)?)
        } else {
            Arc::new(DisabledLanguageModel)
        };

        Ok(Self::with_unit_of_work(
            Arc::new(Persistence::new(db)),
            config,
            cache,
            mailer,
            model,
        ))
    }

    /// Build every service over any Unit of Work and language model.
    pub fn with_unit_of_work<U: UnitOfWork + 'static>(
        uow: Arc<U>,
        config: &Config,
        cache: Option<Cache>,
        mailer: Arc<dyn EmailQueue>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let notifications: Arc<dyn NotificationService> =
            Arc::new(Notifier::new(uow.clone(), mailer));
        let teams: Arc<dyn TeamService> = Arc::new(TeamManager::new(uow.clone(), notifications.clone()));
        let workflow: Arc<dyn WorkflowService> = Arc::new(WorkflowManager::new(uow.clone()));
        let projects: Arc<dyn ProjectService> = Arc::new(ProjectManager::new(uow.clone()));
        let issues: Arc<dyn IssueService> =
            Arc::new(IssueManager::new(uow.clone(), notifications.clone()));
        let comments: Arc<dyn CommentService> =
            Arc::new(CommentManager::new(uow.clone(), notifications.clone()));
        let search: Arc<dyn SearchService> = Arc::new(Searcher::new(uow.clone()));
        let reports: Arc<dyn ReportService> = Arc::new(Reporter::new(uow.clone(), cache));

        let tools = Arc::new(ServiceTools {
            teams: teams.clone(),
            workflow: workflow.clone(),
            projects: projects.clone(),
            issues: issues.clone(),
            comments: comments.clone(),
            notifications: notifications.clone(),
            search: search.clone(),
            reports: reports.clone(),
        });
        let assistant: Arc<dyn AssistantService> = Arc::new(Assistant::new(model, tools, uow.usage()));

        Self {
            auth: Arc::new(Authenticator::new(uow.clone(), config.clone())),
            users: Arc::new(UserManager::new(uow)),
            teams,
            workflow,
            projects,
            issues,
            comments,
            notifications,
            search,
            reports,
            assistant,
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.users.clone()
    }

    fn teams(&self) -> Arc<dyn TeamService> {
        self.teams.clone()
    }

    fn workflow(&self) -> Arc<dyn WorkflowService> {
        self.workflow.clone()
    }

    fn projects(&self) -> Arc<dyn ProjectService> {
        self.projects.clone()
    }

    fn issues(&self) -> Arc<dyn IssueService> {
        self.issues.clone()
    }

    fn comments(&self) -> Arc<dyn CommentService> {
        self.comments.clone()
    }

    fn notifications(&self) -> Arc<dyn NotificationService> {
        self.notifications.clone()
    }

    fn search(&self) -> Arc<dyn SearchService> {
        self.search.clone()
    }

    fn reports(&self) -> Arc<dyn ReportService> {
        self.reports.clone()
    }

    fn assistant(&self) -> Arc<dyn AssistantService> {
        self.assistant.clone()
    }
}

/// Parallel execution utilities for independent operations.
pub mod parallel {
    use super::*;
    use tokio::try_join;

    /// Execute three independent async operations concurrently.
    ///
    /// Returns the first error if any operation fails.
    pub async fn join3<F1, F2, F3, T1, T2, T3>(
        f1: F1,
        f2: F2,
        f3: F3,
    ) -> AppResult<(T1, T2, T3)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
        F3: Future<Output = AppResult<T3>>,
    {
        try_join!(f1, f2, f3)
    }
}
