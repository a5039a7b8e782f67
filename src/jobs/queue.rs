//! Enqueueing side of the e-mail jobs.

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use async_trait::async_trait;

use super::EmailJob;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EmailQueue: Send + Sync {
    async fn enqueue(&self, job: EmailJob) -> AppResult<()>;
}

/// apalis Postgres-backed queue drained by `iris jobs work`
pub struct PostgresEmailQueue {
    storage: PostgresStorage<EmailJob>,
}

impl PostgresEmailQueue {
    pub fn new(storage: PostgresStorage<EmailJob>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EmailQueue for PostgresEmailQueue {
    async fn enqueue(&self, job: EmailJob) -> AppResult<()> {
        let mut storage = self.storage.clone();
        storage
            .push(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue email: {}", e)))?;
        Ok(())
    }
}

/// Queue used when job storage is unavailable; mails are dropped with a log line
pub struct DisabledEmailQueue;

#[async_trait]
impl EmailQueue for DisabledEmailQueue {
    async fn enqueue(&self, job: EmailJob) -> AppResult<()> {
        tracing::debug!(to = %job.to, subject = %job.subject, "Email queue disabled; dropping job");
        Ok(())
    }
}
