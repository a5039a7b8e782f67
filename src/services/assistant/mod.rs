//! ARIA, the in-app assistant.
//!
//! A chat request runs a bounded tool-calling loop against the configured
//! [`LanguageModel`]. Tools go through the regular services with the
//! caller's permissions (see [`executor`]).

pub mod executor;
pub mod tools;

use async_trait::async_trait;
use chrono::{Duration, Utc};
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub use executor::{ServiceTools, ToolHandler, ToolOutcome};
#[cfg(any(test, feature = "test-utils"))]
pub use executor::MockToolHandler;

use crate::config::{MAX_CHAT_MESSAGES, MAX_CHAT_MESSAGE_LENGTH, MAX_TOOL_ROUNDS};
use crate::domain::{Actor, UsageRecord, UsageSummary};
use crate::errors::{AppError, AppResult};
use crate::infra::{ChatMessage, CompletionRequest, LanguageModel, TokenUsage, UsageRepository};

const DEFAULT_USAGE_DAYS: i64 = 30;
const MAX_USAGE_DAYS: i64 = 365;

/// Prepended to the reply when the tool-round bound cuts a request short.
pub const ROUND_LIMIT_NOTICE: &str =
    "I reached the limit of lookup steps for a single request, so this answer may be incomplete. \
     Ask me to continue if you need more.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of the conversation as the client sends it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// What the user is looking at while chatting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatContext {
    pub team_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub issue_id: Option<Uuid>,
    /// Client route, e.g. `/teams/core/board`
    pub page: Option<String>,
    /// Refuse tools that change data
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub context: ChatContext,
    /// Deliver the reply as server-sent events
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolCallRecord {
    pub name: String,
    #[schema(value_type = Object)]
    pub arguments: Value,
    pub ok: bool,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<TokenUsage> for ChatUsage {
    fn from(usage: TokenUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Tool rounds executed
    pub rounds: u32,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UsageReport {
    pub days: i64,
    /// Totals cover every user
    pub all_users: bool,
    #[serde(flatten)]
    pub summary: UsageSummary,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn chat(&self, actor: &Actor, request: ChatRequest) -> AppResult<ChatReply>;

    /// Usage totals for the last `days` days. `all_users` needs a global admin.
    async fn usage(&self, actor: &Actor, days: Option<i64>, all_users: bool) -> AppResult<UsageReport>;
}

pub struct Assistant {
    model: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolHandler>,
    usage: Arc<dyn UsageRepository>,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolHandler>,
        usage: Arc<dyn UsageRepository>,
    ) -> Self {
        Self { model, tools, usage }
    }

    async fn record_usage(&self, actor: &Actor, context: &ChatContext, usage: TokenUsage, tool_calls: usize, rounds: u32) {
        let record = UsageRecord {
            user_id: actor.id,
            team_id: context.team_id,
            model: self.model.model_name(),
            prompt_tokens: clamp_i32(usage.prompt_tokens as u64),
            completion_tokens: clamp_i32(usage.completion_tokens as u64),
            tool_calls: clamp_i32(tool_calls as u64),
            rounds: clamp_i32(rounds as u64),
        };
        if let Err(e) = self.usage.record(record).await {
            tracing::warn!(user_id = %actor.id, "Failed to record assistant usage: {}", e);
        }
    }
}

fn clamp_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Check the conversation shape before anything reaches the model.
pub fn validate_turns(turns: &[ChatTurn]) -> AppResult<()> {
    if turns.is_empty() || turns.len() > MAX_CHAT_MESSAGES {
        return Err(AppError::validation(format!(
            "A conversation needs between 1 and {} messages",
            MAX_CHAT_MESSAGES
        )));
    }
    if let Some(turn) = turns
        .iter()
        .find(|t| t.content.chars().count() > MAX_CHAT_MESSAGE_LENGTH)
    {
        return Err(AppError::validation(format!(
            "Messages are limited to {} characters ({} given)",
            MAX_CHAT_MESSAGE_LENGTH,
            turn.content.chars().count()
        )));
    }
    match turns.last() {
        Some(last) if last.role == TurnRole::User && !last.content.trim().is_empty() => Ok(()),
        Some(last) if last.role == TurnRole::User => Err(AppError::validation("Message cannot be empty")),
        _ => Err(AppError::validation("The last message must come from the user")),
    }
}

fn system_prompt(actor: &Actor, notes: &[String], read_only: bool) -> String {
    let mut prompt = format!(
        "You are ARIA, the assistant inside IRIS, a project management platform for teams. \
         You help {} with their teams, projects and issues. \
         Look data up with the tools instead of guessing, keep answers short, \
         and refer to issues by number and title. \
         Tools run with the user's own permissions. Today is {}.",
        actor.email,
        Utc::now().date_naive()
    );
    if read_only {
        prompt.push_str(" This conversation is read-only: do not try to create or change anything.");
    }
    if !notes.is_empty() {
        prompt.push_str("\n\nThe user is currently looking at:");
        for note in notes {
            prompt.push_str("\n- ");
            prompt.push_str(note);
        }
    }
    prompt
}

fn bounded_reply(text: Option<String>) -> String {
    match text.filter(|t| !t.trim().is_empty()) {
        Some(text) => format!("{}\n\n{}", ROUND_LIMIT_NOTICE, text),
        None => ROUND_LIMIT_NOTICE.to_string(),
    }
}

/// Arguments echoed back to the client; malformed JSON is kept as a string.
fn echo_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[async_trait]
impl AssistantService for Assistant {
    async fn chat(&self, actor: &Actor, request: ChatRequest) -> AppResult<ChatReply> {
        validate_turns(&request.messages)?;

        let context = request.context;
        let notes = self.tools.context_notes(actor, &context).await;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(system_prompt(actor, &notes, context.read_only)));
        messages.extend(request.messages.into_iter().map(|turn| match turn.role {
            TurnRole::User => ChatMessage::user(turn.content),
            TurnRole::Assistant => ChatMessage::assistant(turn.content),
        }));

        let definitions = self.tools.definitions();
        let mut usage = TokenUsage::default();
        let mut records = Vec::new();
        let mut rounds = 0usize;

        let reply = loop {
            let completion = self
                .model
                .complete(CompletionRequest {
                    messages: messages.clone(),
                    tools: definitions.clone(),
                })
                .await?;
            usage.add(completion.usage);

            if completion.tool_calls.is_empty() {
                break completion.content.unwrap_or_default();
            }
            if rounds >= MAX_TOOL_ROUNDS {
                tracing::info!(user_id = %actor.id, rounds, "Assistant stopped at the tool round limit");
                break bounded_reply(completion.content);
            }

            rounds += 1;
            messages.push(ChatMessage::tool_request(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));
            for call in &completion.tool_calls {
                let outcome = self.tools.execute(actor, call, context.read_only).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), outcome.content));
                records.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments: echo_arguments(&call.arguments),
                    ok: outcome.ok,
                    summary: outcome.summary,
                });
            }
        };

        let rounds = rounds as u32;
        self.record_usage(actor, &context, usage, records.len(), rounds).await;

        tracing::info!(
            user_id = %actor.id,
            rounds,
            tool_calls = records.len(),
            tokens = usage.total(),
            "Assistant reply generated"
        );

        Ok(ChatReply {
            reply,
            tool_calls: records,
            rounds,
            usage: usage.into(),
        })
    }

    async fn usage(&self, actor: &Actor, days: Option<i64>, all_users: bool) -> AppResult<UsageReport> {
        let days = days.unwrap_or(DEFAULT_USAGE_DAYS);
        if !(1..=MAX_USAGE_DAYS).contains(&days) {
            return Err(AppError::validation(format!(
                "days must be between 1 and {}",
                MAX_USAGE_DAYS
            )));
        }
        if all_users && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let since = Utc::now() - Duration::days(days);
        let user_id = if all_users { None } else { Some(actor.id) };
        let logs = self.usage.list_since(user_id, since).await?;

        Ok(UsageReport {
            days,
            all_users,
            summary: UsageSummary::from_logs(&logs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UsageLog, UserRole};
    use crate::infra::repositories::MockUsageRepository;
    use crate::infra::{Completion, MockLanguageModel, ToolCall};
    use mockall::predicate::*;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "dev@example.com", UserRole::User)
    }

    fn ask(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatTurn {
                role: TurnRole::User,
                content: text.to_string(),
            }],
            context: ChatContext::default(),
            stream: false,
        }
    }

    fn text(content: &str) -> Completion {
        Completion {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        }
    }

    fn tool_round() -> Completion {
        Completion {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "list_teams".to_string(),
                arguments: "{}".to_string(),
            }],
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        }
    }

    fn quiet_tools() -> MockToolHandler {
        let mut tools = MockToolHandler::new();
        tools.expect_definitions().returning(tools::definitions);
        tools.expect_context_notes().returning(|_, _| Vec::new());
        tools
    }

    fn recording_usage() -> MockUsageRepository {
        let mut usage = MockUsageRepository::new();
        usage.expect_record().returning(|record| {
            Ok(UsageLog {
                id: Uuid::new_v4(),
                record,
                created_at: Utc::now(),
            })
        });
        usage
    }

    fn model(replies: Vec<Completion>) -> MockLanguageModel {
        let mut model = MockLanguageModel::new();
        model.expect_model_name().returning(|| "test-model".to_string());
        let mut replies = replies.into_iter();
        model
            .expect_complete()
            .returning(move |_| replies.next().ok_or_else(|| AppError::upstream("no reply")));
        model
    }

    #[test]
    fn test_validate_turns() {
        let user = |content: &str| ChatTurn {
            role: TurnRole::User,
            content: content.to_string(),
        };
        let assistant = ChatTurn {
            role: TurnRole::Assistant,
            content: "hi".to_string(),
        };

        assert!(validate_turns(&[user("hello")]).is_ok());
        assert!(validate_turns(&[]).is_err());
        assert!(validate_turns(&[user("hello"), assistant.clone()]).is_err());
        assert!(validate_turns(&[user("   ")]).is_err());
        assert!(validate_turns(&[user(&"x".repeat(MAX_CHAT_MESSAGE_LENGTH + 1))]).is_err());
        assert!(validate_turns(&vec![user("hello"); MAX_CHAT_MESSAGES + 1]).is_err());
    }

    #[test]
    fn test_bounded_reply() {
        assert_eq!(bounded_reply(None), ROUND_LIMIT_NOTICE);
        assert_eq!(bounded_reply(Some("  ".to_string())), ROUND_LIMIT_NOTICE);
        assert!(bounded_reply(Some("partial".to_string())).ends_with("\n\npartial"));
    }

    #[test]
    fn test_echo_arguments() {
        assert_eq!(echo_arguments(""), serde_json::json!({}));
        assert_eq!(echo_arguments(r#"{"a":1}"#), serde_json::json!({"a": 1}));
        assert_eq!(echo_arguments("{oops"), Value::String("{oops".to_string()));
    }

    #[tokio::test]
    async fn test_plain_reply() {
        let assistant = Assistant::new(
            Arc::new(model(vec![text("Hello!")])),
            Arc::new(quiet_tools()),
            Arc::new(recording_usage()),
        );

        let reply = assistant.chat(&actor(), ask("hi")).await.unwrap();

        assert_eq!(reply.reply, "Hello!");
        assert_eq!(reply.rounds, 0);
        assert!(reply.tool_calls.is_empty());
        assert_eq!(reply.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_tool_round_then_reply() {
        let mut handler = quiet_tools();
        handler
            .expect_execute()
            .withf(|_, call, read_only| call.name == "list_teams" && !*read_only)
            .times(1)
            .returning(|_, _, _| ToolOutcome::success("1 team", serde_json::json!([])));

        let assistant = Assistant::new(
            Arc::new(model(vec![tool_round(), text("You are in one team.")])),
            Arc::new(handler),
            Arc::new(recording_usage()),
        );

        let reply = assistant.chat(&actor(), ask("which teams?")).await.unwrap();

        assert_eq!(reply.reply, "You are in one team.");
        assert_eq!(reply.rounds, 1);
        assert_eq!(reply.tool_calls.len(), 1);
        assert!(reply.tool_calls[0].ok);
        assert_eq!(reply.tool_calls[0].summary, "1 team");
        assert_eq!(reply.usage.prompt_tokens, 20);
    }

    #[tokio::test]
    async fn test_round_limit_returns_notice() {
        let mut handler = quiet_tools();
        handler
            .expect_execute()
            .times(MAX_TOOL_ROUNDS)
            .returning(|_, _, _| ToolOutcome::success("ok", Value::Null));

        let assistant = Assistant::new(
            Arc::new(model(vec![tool_round(); MAX_TOOL_ROUNDS + 1])),
            Arc::new(handler),
            Arc::new(recording_usage()),
        );

        let reply = assistant.chat(&actor(), ask("loop")).await.unwrap();

        assert_eq!(reply.reply, ROUND_LIMIT_NOTICE);
        assert_eq!(reply.rounds as usize, MAX_TOOL_ROUNDS);
    }

    #[tokio::test]
    async fn test_model_failure_is_upstream() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .returning(|_| Err(AppError::upstream("provider down")));
        let mut usage = MockUsageRepository::new();
        usage.expect_record().never();

        let assistant = Assistant::new(Arc::new(model), Arc::new(quiet_tools()), Arc::new(usage));

        let result = assistant.chat(&actor(), ask("hi")).await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_usage_failure_does_not_fail_chat() {
        let mut usage = MockUsageRepository::new();
        usage
            .expect_record()
            .returning(|_| Err(AppError::internal("db down")));

        let assistant = Assistant::new(
            Arc::new(model(vec![text("Hi")])),
            Arc::new(quiet_tools()),
            Arc::new(usage),
        );

        assert!(assistant.chat(&actor(), ask("hi")).await.is_ok());
    }

    #[tokio::test]
    async fn test_usage_for_self() {
        let me = actor();
        let my_id = me.id;
        let mut usage = MockUsageRepository::new();
        usage
            .expect_list_since()
            .with(eq(Some(my_id)), always())
            .returning(|_, _| Ok(Vec::new()));

        let assistant = Assistant::new(
            Arc::new(MockLanguageModel::new()),
            Arc::new(MockToolHandler::new()),
            Arc::new(usage),
        );

        let report = assistant.usage(&me, None, false).await.unwrap();
        assert_eq!(report.days, DEFAULT_USAGE_DAYS);
        assert_eq!(report.summary, UsageSummary::default());
    }

    #[tokio::test]
    async fn test_usage_all_users_needs_admin() {
        let assistant = Assistant::new(
            Arc::new(MockLanguageModel::new()),
            Arc::new(MockToolHandler::new()),
            Arc::new(MockUsageRepository::new()),
        );

        let result = assistant.usage(&actor(), Some(7), true).await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        let result = assistant.usage(&actor(), Some(0), false).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
