//! Background jobs (apalis).

mod email_job;
mod queue;

pub use email_job::{email_job_handler, EmailJob};
pub use queue::{DisabledEmailQueue, EmailQueue, PostgresEmailQueue};

#[cfg(any(test, feature = "test-utils"))]
pub use queue::MockEmailQueue;
