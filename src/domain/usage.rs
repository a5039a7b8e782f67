//! Assistant usage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One assistant conversation turn as recorded for accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub model: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub tool_calls: i32,
    pub rounds: i32,
}

/// Stored usage row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: UsageRecord,
    pub created_at: DateTime<Utc>,
}

/// Usage totals over a period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UsageSummary {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub tool_calls: u64,
}

impl UsageSummary {
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a UsageLog>) -> Self {
        logs.into_iter().fold(Self::default(), |mut acc, log| {
            acc.requests += 1;
            acc.prompt_tokens += log.record.prompt_tokens.max(0) as u64;
            acc.completion_tokens += log.record.completion_tokens.max(0) as u64;
            acc.tool_calls += log.record.tool_calls.max(0) as u64;
            acc
        })
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_logs() {
        let user_id = Uuid::new_v4();
        let log = |prompt, completion, tools| UsageLog {
            id: Uuid::new_v4(),
            record: UsageRecord {
                user_id,
                team_id: None,
                model: "m".to_string(),
                prompt_tokens: prompt,
                completion_tokens: completion,
                tool_calls: tools,
                rounds: 1,
            },
            created_at: Utc::now(),
        };
        let logs = vec![log(100, 20, 2), log(50, 10, 0)];

        let summary = UsageSummary::from_logs(&logs);
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.total_tokens(), 180);
        assert_eq!(summary.tool_calls, 2);
    }
}
