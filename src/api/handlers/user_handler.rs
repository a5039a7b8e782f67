//! User handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{User, UserResponse, UserRole};
use crate::errors::AppResult;
use crate::types::{NoContent, Paginated, PaginationParams};

/// User update request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    /// Global role (admin only)
    pub role: Option<UserRole>,
}

/// Create user routes (nested under `/users`)
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(get_current_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/restore", post(restore_user))
}

async fn forget_cached(state: &AppState, id: &Uuid) {
    if let Err(e) = state.cache.invalidate_user(id).await {
        tracing::warn!(user_id = %id, "Failed to invalidate user cache: {}", e);
    }
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    match state.cache.get_user(&user.id).await {
        Ok(Some(cached)) => return Ok(Json(UserResponse::from(cached))),
        Ok(None) => {}
        Err(e) => tracing::warn!(user_id = %user.id, "User cache read failed: {}", e),
    }

    let me: User = state.services.users().me(&user.actor()).await?;

    if let Err(e) = state.cache.set_user(&me).await {
        tracing::warn!(user_id = %me.id, "User cache write failed: {}", e);
    }

    Ok(Json(UserResponse::from(me)))
}

/// List active users (admin)
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of users", body = PaginatedUsers),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<UserResponse>>> {
    let page = state.services.users().list_users(&user.actor(), params).await?;
    Ok(Json(page.map(UserResponse::from)))
}

/// Get a user by id (self or admin)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let found = state.services.users().get_user(&user.actor(), id).await?;
    Ok(Json(UserResponse::from(found)))
}

/// Update a user's name or global role
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let updated = state
        .services
        .users()
        .update_user(&user.actor(), id, payload.name, payload.role)
        .await?;

    forget_cached(&state, &id).await;
    Ok(Json(UserResponse::from(updated)))
}

/// Soft delete a user (admin)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.users().delete_user(&user.actor(), id).await?;

    forget_cached(&state, &id).await;
    Ok(NoContent)
}

/// Restore a soft-deleted user (admin)
#[utoipa::path(
    post,
    path = "/users/{id}/restore",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Restored user", body = UserResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let restored = state.services.users().restore_user(&user.actor(), id).await?;

    forget_cached(&state, &id).await;
    Ok(Json(UserResponse::from(restored)))
}
