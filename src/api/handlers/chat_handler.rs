//! ARIA chat handlers.
//!
//! With `stream: true` the finished reply is replayed as server-sent
//! events: one `tool` event per tool call, then `message`, then `done`.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Extension, Router,
};
use futures::stream;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::errors::{AppError, AppResult};
use crate::services::{ChatReply, ChatRequest, UsageReport};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageQuery {
    /// Trailing window in days, 1-365 (default 30)
    pub days: Option<i64>,
    /// Totals for every user (admin only)
    #[serde(default)]
    pub all: bool,
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/chat", post(chat))
        .route("/ai/usage", get(usage))
}

/// Build the SSE event sequence for a finished reply.
pub fn reply_events(reply: &ChatReply) -> Result<Vec<Event>, axum::Error> {
    let mut events = Vec::with_capacity(reply.tool_calls.len() + 2);
    for call in &reply.tool_calls {
        events.push(Event::default().event("tool").json_data(call)?);
    }
    events.push(Event::default().event("message").json_data(json!({
        "reply": reply.reply,
        "rounds": reply.rounds,
        "usage": reply.usage,
    }))?);
    events.push(Event::default().event("done").data("{}"));
    Ok(events)
}

/// Talk to ARIA
#[utoipa::path(
    post,
    path = "/ai/chat",
    tag = "Assistant",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply (JSON, or SSE when stream is true)", body = ChatReply),
        (status = 400, description = "Invalid conversation"),
        (status = 429, description = "Assistant rate limit reached"),
        (status = 502, description = "Model provider failed or assistant disabled")
    ),
    security(("bearer_auth" = []))
)]
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let stream = request.stream;

    let reply = state.services.assistant().chat(&user.actor(), request).await?;

    if !stream {
        return Ok(Json(reply).into_response());
    }

    let events = reply_events(&reply)
        .map_err(|e| AppError::internal(format!("Failed to encode chat events: {}", e)))?;
    let events = stream::iter(events.into_iter().map(Ok::<_, axum::Error>));
    Ok(Sse::new(events).into_response())
}

/// Assistant token usage
#[utoipa::path(
    get,
    path = "/ai/usage",
    tag = "Assistant",
    params(UsageQuery),
    responses(
        (status = 200, description = "Usage totals", body = UsageReport),
        (status = 403, description = "`all` requires an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn usage(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<UsageQuery>,
) -> AppResult<Json<UsageReport>> {
    let report = state
        .services
        .assistant()
        .usage(&user.actor(), query.days, query.all)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ChatUsage, ToolCallRecord};

    #[test]
    fn test_event_sequence() {
        let reply = ChatReply {
            reply: "Done".to_string(),
            tool_calls: vec![
                ToolCallRecord {
                    name: "list_teams".to_string(),
                    arguments: json!({}),
                    ok: true,
                    summary: "1 team".to_string(),
                },
                ToolCallRecord {
                    name: "search".to_string(),
                    arguments: json!({"query": "login"}),
                    ok: true,
                    summary: "2 issues and 0 projects".to_string(),
                },
            ],
            rounds: 1,
            usage: ChatUsage::default(),
        };

        let events = reply_events(&reply).unwrap();
        assert_eq!(events.len(), 4);
    }
}
