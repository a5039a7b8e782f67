//! Rate limiting middleware using Redis cache.
//!
//! Fixed-window counters per client and policy. When Redis cannot be
//! reached the request is refused.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

use super::CurrentUser;
use crate::api::AppState;
use crate::config::{
    RATE_LIMIT_AI_REQUESTS, RATE_LIMIT_AI_WINDOW_SECONDS, RATE_LIMIT_AUTH_REQUESTS,
    RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW_SECONDS,
};

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// One named request budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub requests: u64,
    pub window_seconds: u64,
}

impl RateLimitPolicy {
    pub const GENERAL: Self = Self {
        name: "general",
        requests: RATE_LIMIT_REQUESTS,
        window_seconds: RATE_LIMIT_WINDOW_SECONDS,
    };

    pub const AUTH: Self = Self {
        name: "auth",
        requests: RATE_LIMIT_AUTH_REQUESTS,
        window_seconds: RATE_LIMIT_AUTH_WINDOW_SECONDS,
    };

    pub const ASSISTANT: Self = Self {
        name: "ai",
        requests: RATE_LIMIT_AI_REQUESTS,
        window_seconds: RATE_LIMIT_AI_WINDOW_SECONDS,
    };

    fn key(&self, client: &str) -> String {
        format!("{}:{}", self.name, client)
    }
}

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(self.retry_after));
        headers.insert(REMAINING_HEADER, HeaderValue::from(0u64));

        let body = json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "Too many requests. Please try again later.",
            }
        });

        (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
    }
}

/// Extract client identifier for rate limiting.
///
/// Authenticated requests are counted per user; anonymous ones per
/// forwarded or peer IP.
fn client_identifier(request: &Request) -> String {
    if let Some(user) = request.extensions().get::<CurrentUser>() {
        return format!("user:{}", user.id);
    }

    // First entry of X-Forwarded-For is the original client
    if let Some(ip) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
    {
        return real_ip.trim().to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

async fn enforce(
    state: &AppState,
    policy: RateLimitPolicy,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client = client_identifier(&request);

    let status = match state
        .cache
        .check_rate_limit(&policy.key(&client), policy.requests, policy.window_seconds)
        .await
    {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(error = %e, policy = policy.name, "Rate limit check failed - denying request");
            return Err(RateLimitError {
                retry_after: policy.window_seconds,
            });
        }
    };

    if !status.allowed() {
        tracing::warn!(
            client = %client,
            policy = policy.name,
            count = status.count,
            "Rate limit exceeded"
        );
        return Err(RateLimitError {
            retry_after: status.reset_after,
        });
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(status.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(status.remaining()));

    Ok(response)
}

/// General rate limiting for authenticated routes.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(&state, RateLimitPolicy::GENERAL, request, next).await
}

/// Stricter rate limiting for authentication endpoints.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(&state, RateLimitPolicy::AUTH, request, next).await
}

/// Budget for assistant calls, which cost provider tokens.
pub async fn rate_limit_ai_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(&state, RateLimitPolicy::ASSISTANT, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use uuid::Uuid;

    use crate::domain::UserRole;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_identifier(&request), "203.0.113.7");
    }

    #[test]
    fn test_authenticated_requests_keyed_by_user() {
        let id = Uuid::new_v4();
        let mut request = Request::builder()
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(CurrentUser {
            id,
            email: "u@example.com".to_string(),
            role: UserRole::User,
        });

        assert_eq!(client_identifier(&request), format!("user:{}", id));
    }

    #[test]
    fn test_unknown_client() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identifier(&request), "unknown");
    }

    #[test]
    fn test_policy_keys_are_separate() {
        assert_eq!(RateLimitPolicy::AUTH.key("1.2.3.4"), "auth:1.2.3.4");
        assert_ne!(
            RateLimitPolicy::GENERAL.key("1.2.3.4"),
            RateLimitPolicy::ASSISTANT.key("1.2.3.4")
        );
    }

    #[test]
    fn test_rejection_sets_retry_after() {
        let response = RateLimitError { retry_after: 17 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "17");
    }
}
