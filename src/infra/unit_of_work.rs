//! Unit of Work: repository access plus transaction management.
//!
//! Services receive one `UnitOfWork` and reach every repository through it.
//! Multi-step writes (team creation with its default workflow, issue
//! creation with its number and labels) run inside `transaction*` closures.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::{
    issue_repository, status_repository, team_repository, CommentRepository, CommentStore,
    IssueRepository, IssueStore, LabelRepository, LabelStore, NotificationRepository,
    NotificationStore, ProjectRepository, ProjectStore, StatusRepository, StatusStore,
    TeamRepository, TeamStore, UsageRepository, UsageStore, UserRepository, UserStore,
};
use crate::domain::{Issue, NewIssue, NewStatus, NewTeam, Status, Team, TeamMember, TeamRole};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transaction closures
pub type TxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because of the generic transaction methods; tests
/// implement it over mock repositories instead.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;
    fn teams(&self) -> Arc<dyn TeamRepository>;
    fn statuses(&self) -> Arc<dyn StatusRepository>;
    fn labels(&self) -> Arc<dyn LabelRepository>;
    fn projects(&self) -> Arc<dyn ProjectRepository>;
    fn issues(&self) -> Arc<dyn IssueRepository>;
    fn comments(&self) -> Arc<dyn CommentRepository>;
    fn notifications(&self) -> Arc<dyn NotificationRepository>;
    fn usage(&self) -> Arc<dyn UsageRepository>;

    /// Run `f` in a ReadCommitted transaction; commit on `Ok`, roll back on `Err`.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;

    /// Same as [`UnitOfWork::transaction`] with serializable isolation.
    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Repository access bound to one open transaction.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub fn teams(&self) -> TxTeamRepository<'_> {
        TxTeamRepository { txn: self.txn }
    }

    pub fn statuses(&self) -> TxStatusRepository<'_> {
        TxStatusRepository { txn: self.txn }
    }

    pub fn issues(&self) -> TxIssueRepository<'_> {
        TxIssueRepository { txn: self.txn }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
    team_repo: Arc<TeamStore>,
    status_repo: Arc<StatusStore>,
    label_repo: Arc<LabelStore>,
    project_repo: Arc<ProjectStore>,
    issue_repo: Arc<IssueStore>,
    comment_repo: Arc<CommentStore>,
    notification_repo: Arc<NotificationStore>,
    usage_repo: Arc<UsageStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            user_repo: Arc::new(UserStore::new(db.clone())),
            team_repo: Arc::new(TeamStore::new(db.clone())),
            status_repo: Arc::new(StatusStore::new(db.clone())),
            label_repo: Arc::new(LabelStore::new(db.clone())),
            project_repo: Arc::new(ProjectStore::new(db.clone())),
            issue_repo: Arc::new(IssueStore::new(db.clone())),
            comment_repo: Arc::new(CommentStore::new(db.clone())),
            notification_repo: Arc::new(NotificationStore::new(db.clone())),
            usage_repo: Arc::new(UsageStore::new(db.clone())),
            db,
        }
    }

}

/// Run `f` in a transaction on `db`; commit on `Ok`, roll back on `Err`.
pub(crate) async fn run_transaction<F, T>(
    db: &DatabaseConnection,
    isolation: IsolationLevel,
    f: F,
) -> AppResult<T>
where
    F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
    T: Send,
{
    let txn = db
        .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
        .await
        .map_err(AppError::from)?;

    let ctx = TransactionContext::new(&txn);

    match f(ctx).await {
        Ok(result) => {
            txn.commit().await.map_err(AppError::from)?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("Transaction rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn teams(&self) -> Arc<dyn TeamRepository> {
        self.team_repo.clone()
    }

    fn statuses(&self) -> Arc<dyn StatusRepository> {
        self.status_repo.clone()
    }

    fn labels(&self) -> Arc<dyn LabelRepository> {
        self.label_repo.clone()
    }

    fn projects(&self) -> Arc<dyn ProjectRepository> {
        self.project_repo.clone()
    }

    fn issues(&self) -> Arc<dyn IssueRepository> {
        self.issue_repo.clone()
    }

    fn comments(&self) -> Arc<dyn CommentRepository> {
        self.comment_repo.clone()
    }

    fn notifications(&self) -> Arc<dyn NotificationRepository> {
        self.notification_repo.clone()
    }

    fn usage(&self) -> Arc<dyn UsageRepository> {
        self.usage_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        run_transaction(&self.db, IsolationLevel::ReadCommitted, f).await
    }

    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        run_transaction(&self.db, IsolationLevel::Serializable, f).await
    }
}

/// Team writes inside a transaction
pub struct TxTeamRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxTeamRepository<'a> {
    pub async fn create(&self, new: NewTeam) -> AppResult<Team> {
        team_repository::insert_team(self.txn, new).await
    }

    pub async fn add_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> AppResult<TeamMember> {
        team_repository::insert_member(self.txn, team_id, user_id, role).await
    }
}

/// Status reads and writes inside a transaction
pub struct TxStatusRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxStatusRepository<'a> {
    pub async fn create(&self, new: NewStatus) -> AppResult<Status> {
        status_repository::insert_status(self.txn, new).await
    }

    pub async fn list_by_team(&self, team_id: Uuid) -> AppResult<Vec<Status>> {
        status_repository::statuses_of_team(self.txn, team_id).await
    }
}

/// Issue writes inside a transaction
pub struct TxIssueRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxIssueRepository<'a> {
    /// Insert with the next free per-project number.
    ///
    /// Run under serializable isolation so concurrent creates cannot reuse
    /// a number.
    pub async fn create(&self, new: NewIssue) -> AppResult<Issue> {
        let number = issue_repository::next_number(self.txn, new.project_id).await?;
        issue_repository::insert_issue(self.txn, new, number).await
    }

    pub async fn replace_labels(&self, issue_id: Uuid, label_ids: Vec<Uuid>) -> AppResult<()> {
        issue_repository::replace_labels(self.txn, issue_id, label_ids).await
    }
}

/// Run a closure in a transaction without spelling out `Box::pin`.
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
}
