//! Notification service - the caller's inbox and delivery of new
//! notifications (row insert plus e-mail job).

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Actor, NewNotification, Notification, UnreadCount};
use crate::errors::AppResult;
use crate::infra::UnitOfWork;
use crate::jobs::{EmailJob, EmailQueue};
use crate::types::{Paginated, PaginationParams};

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// The actor's notifications, newest first
    async fn list(
        &self,
        actor: &Actor,
        unread_only: bool,
        params: PaginationParams,
    ) -> AppResult<Paginated<Notification>>;

    async fn unread_count(&self, actor: &Actor) -> AppResult<UnreadCount>;

    /// Mark one of the actor's notifications read
    async fn mark_read(&self, actor: &Actor, id: Uuid) -> AppResult<Notification>;

    /// Mark every notification of the actor read; returns how many changed
    async fn mark_all_read(&self, actor: &Actor) -> AppResult<u64>;

    async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<()>;

    /// Store a notification and queue its e-mail.
    ///
    /// Only the insert can fail; e-mail problems are logged.
    async fn notify(&self, notification: NewNotification) -> AppResult<Notification>;
}

pub struct Notifier<U: UnitOfWork> {
    uow: Arc<U>,
    mailer: Arc<dyn EmailQueue>,
}

impl<U: UnitOfWork> Notifier<U> {
    pub fn new(uow: Arc<U>, mailer: Arc<dyn EmailQueue>) -> Self {
        Self { uow, mailer }
    }

    async fn send_email(&self, notification: &Notification) {
        let recipient = match self.uow.users().find_by_id(notification.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(user_id = %notification.user_id, "Recipient lookup failed: {}", e);
                return;
            }
        };

        let job = EmailJob::for_notification(recipient.email, notification);
        if let Err(e) = self.mailer.enqueue(job).await {
            tracing::warn!(
                notification_id = %notification.id,
                "Failed to enqueue notification e-mail: {}",
                e
            );
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> NotificationService for Notifier<U> {
    async fn list(
        &self,
        actor: &Actor,
        unread_only: bool,
        params: PaginationParams,
    ) -> AppResult<Paginated<Notification>> {
        let (items, total) = self
            .uow
            .notifications()
            .list(actor.id, unread_only, params.offset(), params.limit())
            .await?;
        Ok(Paginated::from_params(items, &params, total))
    }

    async fn unread_count(&self, actor: &Actor) -> AppResult<UnreadCount> {
        let unread = self.uow.notifications().unread_count(actor.id).await?;
        Ok(UnreadCount { unread })
    }

    async fn mark_read(&self, actor: &Actor, id: Uuid) -> AppResult<Notification> {
        self.uow.notifications().mark_read(id, actor.id).await
    }

    async fn mark_all_read(&self, actor: &Actor) -> AppResult<u64> {
        let updated = self.uow.notifications().mark_all_read(actor.id).await?;
        tracing::debug!(user_id = %actor.id, updated, "Notifications marked read");
        Ok(updated)
    }

    async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        self.uow.notifications().delete(id, actor.id).await
    }

    async fn notify(&self, notification: NewNotification) -> AppResult<Notification> {
        let stored = self.uow.notifications().create(notification).await?;

        tracing::debug!(
            user_id = %stored.user_id,
            kind = stored.kind.as_str(),
            "Notification created"
        );

        self.send_email(&stored).await;
        Ok(stored)
    }
}

/// Deliver a notification from another service without failing its caller.
pub(crate) async fn notify_quietly(
    notifications: &dyn NotificationService,
    notification: NewNotification,
) {
    let user_id = notification.user_id;
    if let Err(e) = notifications.notify(notification).await {
        tracing::warn!(user_id = %user_id, "Failed to deliver notification: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationKind, User, UserRole};
    use crate::errors::AppError;
    use crate::infra::repositories::{MockNotificationRepository, MockUserRepository};
    use crate::jobs::MockEmailQueue;
    use crate::services::testing::TestUnitOfWork;
    use chrono::Utc;

    fn stored(new: NewNotification) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            body: new.body,
            link: new.link,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    fn recipient(id: Uuid) -> User {
        User {
            id,
            email: "dev@example.com".to_string(),
            password_hash: String::new(),
            name: "Dev".to_string(),
            role: UserRole::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_notify_stores_and_queues_email() {
        let user_id = Uuid::new_v4();
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_create().times(1).returning(|n| Ok(stored(n)));
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| Ok(Some(recipient(id))));
        let mut mailer = MockEmailQueue::new();
        mailer
            .expect_enqueue()
            .withf(|job| job.to == "dev@example.com" && job.subject == "[IRIS] Welcome")
            .times(1)
            .returning(|_| Ok(()));

        let uow = TestUnitOfWork::new()
            .with_notifications(notifications)
            .with_users(users);
        let notifier = Notifier::new(Arc::new(uow), Arc::new(mailer));

        let result = notifier
            .notify(NewNotification::new(user_id, NotificationKind::System, "Welcome", "Hi"))
            .await
            .unwrap();
        assert_eq!(result.user_id, user_id);
    }

    #[tokio::test]
    async fn test_notify_survives_queue_failure() {
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_create().returning(|n| Ok(stored(n)));
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| Ok(Some(recipient(id))));
        let mut mailer = MockEmailQueue::new();
        mailer
            .expect_enqueue()
            .returning(|_| Err(AppError::internal("queue down")));

        let uow = TestUnitOfWork::new()
            .with_notifications(notifications)
            .with_users(users);
        let notifier = Notifier::new(Arc::new(uow), Arc::new(mailer));

        let result = notifier
            .notify(NewNotification::new(Uuid::new_v4(), NotificationKind::System, "t", "b"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_list_scopes_to_actor() {
        let actor = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::User);
        let actor_id = actor.id;
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_list()
            .withf(move |user_id, unread, offset, limit| {
                *user_id == actor_id && *unread && *offset == 0 && *limit == 20
            })
            .returning(|_, _, _, _| Ok((vec![], 0)));

        let notifier = Notifier::new(
            Arc::new(TestUnitOfWork::new().with_notifications(notifications)),
            Arc::new(MockEmailQueue::new()),
        );
        let page = notifier
            .list(&actor, true, PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.meta.total, 0);
    }

    #[tokio::test]
    async fn test_mark_read_is_scoped_to_owner() {
        let actor = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::User);
        let actor_id = actor.id;
        let theirs = Uuid::new_v4();
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_mark_read()
            .withf(move |id, user_id| *id == theirs && *user_id == actor_id)
            .times(1)
            .returning(|_, _| Err(AppError::NotFound));
        notifications.expect_delete().never();

        let notifier = Notifier::new(
            Arc::new(TestUnitOfWork::new().with_notifications(notifications)),
            Arc::new(MockEmailQueue::new()),
        );
        let result = notifier.mark_read(&actor, theirs).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
