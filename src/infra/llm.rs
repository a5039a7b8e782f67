//! Language model provider client.
//!
//! Speaks the OpenAI-compatible chat-completions protocol with function
//! tools. The assistant only sees the [`LanguageModel`] trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    /// Assistant turn that requested tools
    pub fn tool_request(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result of one tool call, answered back to the model
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Tool offered to the model; `parameters` is a JSON schema object
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier recorded in usage logs
    fn model_name(&self) -> String;

    async fn complete(&self, request: CompletionRequest) -> AppResult<Completion>;
}

/// Chat-completions client over reqwest
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| AppError::internal("AI_API_KEY contains invalid header characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::internal(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: CompletionRequest) -> AppResult<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = wire::Request::new(&self.model, &request);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("model request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(format!(
                "model provider returned {}: {}",
                status,
                detail.chars().take(500).collect::<String>()
            )));
        }

        let parsed: wire::Response = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("invalid model response: {}", e)))?;

        tracing::debug!(
            model = %self.model,
            prompt_tokens = parsed.usage.prompt_tokens,
            completion_tokens = parsed.usage.completion_tokens,
            "Model completion received"
        );

        parsed.into_completion()
    }
}

/// Stand-in used when no provider key is configured.
pub struct DisabledLanguageModel;

#[async_trait]
impl LanguageModel for DisabledLanguageModel {
    fn model_name(&self) -> String {
        "disabled".to_string()
    }

    async fn complete(&self, _request: CompletionRequest) -> AppResult<Completion> {
        Err(AppError::upstream("The AI assistant is not configured"))
    }
}

/// OpenAI chat-completions wire format
mod wire {
    use serde::{Deserialize, Serialize};

    use super::{ChatMessage, ChatRole, Completion, CompletionRequest, TokenUsage, ToolCall};
    use crate::errors::{AppError, AppResult};

    #[derive(Debug, Serialize)]
    pub struct Request<'a> {
        pub model: &'a str,
        pub messages: Vec<Message>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tools: Vec<Tool<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub tool_choice: Option<&'static str>,
    }

    impl<'a> Request<'a> {
        pub fn new(model: &'a str, request: &'a CompletionRequest) -> Self {
            let tools: Vec<Tool<'a>> = request
                .tools
                .iter()
                .map(|t| Tool {
                    kind: "function",
                    function: FunctionSpec {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect();

            Self {
                model,
                messages: request.messages.iter().map(Message::from).collect(),
                tool_choice: (!tools.is_empty()).then_some("auto"),
                tools,
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Message {
        pub role: ChatRole,
        #[serde(default)]
        pub content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub tool_calls: Vec<WireToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tool_call_id: Option<String>,
    }

    impl From<&ChatMessage> for Message {
        fn from(message: &ChatMessage) -> Self {
            Self {
                role: message.role,
                content: message.content.clone(),
                tool_calls: message
                    .tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: FunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_call_id: message.tool_call_id.clone(),
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WireToolCall {
        pub id: String,
        #[serde(rename = "type", default = "function_kind")]
        pub kind: String,
        pub function: FunctionCall,
    }

    fn function_kind() -> String {
        "function".to_string()
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FunctionCall {
        pub name: String,
        #[serde(default)]
        pub arguments: String,
    }

    #[derive(Debug, Serialize)]
    pub struct Tool<'a> {
        #[serde(rename = "type")]
        pub kind: &'static str,
        pub function: FunctionSpec<'a>,
    }

    #[derive(Debug, Serialize)]
    pub struct FunctionSpec<'a> {
        pub name: &'a str,
        pub description: &'a str,
        pub parameters: &'a serde_json::Value,
    }

    #[derive(Debug, Deserialize)]
    pub struct Response {
        pub choices: Vec<Choice>,
        #[serde(default)]
        pub usage: TokenUsage,
    }

    #[derive(Debug, Deserialize)]
    pub struct Choice {
        pub message: Message,
    }

    impl Response {
        pub fn into_completion(self) -> AppResult<Completion> {
            let usage = self.usage;
            let message = self
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| AppError::upstream("model response had no choices"))?
                .message;

            Ok(Completion {
                content: message.content.filter(|c| !c.trim().is_empty()),
                tool_calls: message
                    .tool_calls
                    .into_iter()
                    .map(|c| ToolCall {
                        id: c.id,
                        name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect(),
                usage,
            })
        }
    }
}
