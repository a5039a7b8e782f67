//! Notification e-mail job.
//!
//! Without SMTP settings the worker logs the mail instead of sending it.

use serde::{Deserialize, Serialize};
use std::env;

use crate::domain::Notification;
use crate::errors::AppError;

/// Email job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Sender override (defaults to SMTP_FROM)
    #[serde(default)]
    pub from: Option<String>,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
        }
    }

    /// Mail mirroring an in-app notification
    pub fn for_notification(to: impl Into<String>, notification: &Notification) -> Self {
        let mut body = notification.body.clone();
        if let Some(link) = &notification.link {
            body.push_str("\n\nOpen in IRIS: ");
            body.push_str(link);
        }
        Self::new(to, format!("[IRIS] {}", notification.title), body)
    }
}

struct SmtpSettings {
    host: Option<String>,
    from: String,
}

impl SmtpSettings {
    fn from_env() -> Self {
        Self {
            host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            from: env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@iris.local".to_string()),
        }
    }
}

/// Worker handler for [`EmailJob`]
pub async fn email_job_handler(job: EmailJob) -> Result<(), AppError> {
    let settings = SmtpSettings::from_env();
    let from = job.from.as_deref().unwrap_or(&settings.from);

    tracing::info!(to = %job.to, from = %from, subject = %job.subject, "Processing email job");

    match settings.host {
        None => {
            tracing::info!(
                "=== EMAIL (not sent) ===\nFrom: {}\nTo: {}\nSubject: {}\n\n{}\n========================",
                from,
                job.to,
                job.subject,
                job.body
            );
        }
        Some(host) => {
            // TODO: deliver through an SMTP transport once one is added to the stack
            tracing::warn!(smtp_host = %host, to = %job.to, "SMTP delivery not available; email logged only");
        }
    }

    Ok(())
}
