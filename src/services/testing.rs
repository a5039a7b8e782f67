//! Test doubles for service unit tests.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr, IsolationLevel};

use crate::errors::{AppError, AppResult};
use crate::infra::repositories::{
    MockCommentRepository, MockIssueRepository, MockLabelRepository, MockNotificationRepository,
    MockProjectRepository, MockStatusRepository, MockTeamRepository, MockUsageRepository,
    MockUserRepository,
};
use crate::infra::unit_of_work::run_transaction;
use crate::infra::{
    CommentRepository, IssueRepository, LabelRepository, NotificationRepository,
    ProjectRepository, StatusRepository, TeamRepository, TransactionContext, TxFuture,
    UnitOfWork, UsageRepository, UserRepository,
};

/// UnitOfWork over mock repositories.
///
/// Repositories that are not replaced fail the test on first use.
/// Transactions run against a sea-orm `MockDatabase` connection given with
/// [`TestUnitOfWork::with_database`]; without one they fail.
pub(crate) struct TestUnitOfWork {
    users: Arc<MockUserRepository>,
    teams: Arc<MockTeamRepository>,
    statuses: Arc<MockStatusRepository>,
    labels: Arc<MockLabelRepository>,
    projects: Arc<MockProjectRepository>,
    issues: Arc<MockIssueRepository>,
    comments: Arc<MockCommentRepository>,
    notifications: Arc<MockNotificationRepository>,
    usage: Arc<MockUsageRepository>,
    db: Option<DatabaseConnection>,
    contended: AtomicU32,
    transactions: AtomicU32,
}

impl TestUnitOfWork {
    pub(crate) fn new() -> Self {
        Self {
            users: Arc::new(MockUserRepository::new()),
            teams: Arc::new(MockTeamRepository::new()),
            statuses: Arc::new(MockStatusRepository::new()),
            labels: Arc::new(MockLabelRepository::new()),
            projects: Arc::new(MockProjectRepository::new()),
            issues: Arc::new(MockIssueRepository::new()),
            comments: Arc::new(MockCommentRepository::new()),
            notifications: Arc::new(MockNotificationRepository::new()),
            usage: Arc::new(MockUsageRepository::new()),
            db: None,
            contended: AtomicU32::new(0),
            transactions: AtomicU32::new(0),
        }
    }

    pub(crate) fn with_database(mut self, db: DatabaseConnection) -> Self {
        self.db = Some(db);
        self
    }

    /// Fail the next `count` transactions with a serialization failure.
    pub(crate) fn with_contention(self, count: u32) -> Self {
        self.contended.store(count, Ordering::SeqCst);
        self
    }

    /// Transactions started so far, including contended ones
    pub(crate) fn transactions_started(&self) -> u32 {
        self.transactions.load(Ordering::SeqCst)
    }

    async fn run<F, T>(&self, isolation: IsolationLevel, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let contended = self
            .contended
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if contended {
            return Err(AppError::Contention(DbErr::Custom(
                "could not serialize access".to_string(),
            )));
        }

        match &self.db {
            Some(db) => run_transaction(db, isolation, f).await,
            None => Err(AppError::internal("No mock database for transactions")),
        }
    }

    pub(crate) fn with_users(mut self, repo: MockUserRepository) -> Self {
        self.users = Arc::new(repo);
        self
    }

    pub(crate) fn with_teams(mut self, repo: MockTeamRepository) -> Self {
        self.teams = Arc::new(repo);
        self
    }

    pub(crate) fn with_statuses(mut self, repo: MockStatusRepository) -> Self {
        self.statuses = Arc::new(repo);
        self
    }

    pub(crate) fn with_labels(mut self, repo: MockLabelRepository) -> Self {
        self.labels = Arc::new(repo);
        self
    }

    pub(crate) fn with_projects(mut self, repo: MockProjectRepository) -> Self {
        self.projects = Arc::new(repo);
        self
    }

    pub(crate) fn with_issues(mut self, repo: MockIssueRepository) -> Self {
        self.issues = Arc::new(repo);
        self
    }

    pub(crate) fn with_comments(mut self, repo: MockCommentRepository) -> Self {
        self.comments = Arc::new(repo);
        self
    }

    pub(crate) fn with_notifications(mut self, repo: MockNotificationRepository) -> Self {
        self.notifications = Arc::new(repo);
        self
    }
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn teams(&self) -> Arc<dyn TeamRepository> {
        self.teams.clone()
    }

    fn statuses(&self) -> Arc<dyn StatusRepository> {
        self.statuses.clone()
    }

    fn labels(&self) -> Arc<dyn LabelRepository> {
        self.labels.clone()
    }

    fn projects(&self) -> Arc<dyn ProjectRepository> {
        self.projects.clone()
    }

    fn issues(&self) -> Arc<dyn IssueRepository> {
        self.issues.clone()
    }

    fn comments(&self) -> Arc<dyn CommentRepository> {
        self.comments.clone()
    }

    fn notifications(&self) -> Arc<dyn NotificationRepository> {
        self.notifications.clone()
    }

    fn usage(&self) -> Arc<dyn UsageRepository> {
        self.usage.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.run(IsolationLevel::ReadCommitted, f).await
    }

    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.run(IsolationLevel::Serializable, f).await
    }
}
