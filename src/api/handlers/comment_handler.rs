//! Comment handlers.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::Comment;
use crate::errors::AppResult;
use crate::types::{Created, NoContent};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 10000, message = "Comment must be 1-10000 characters"))]
    #[schema(example = "Reproduced on 17.2, looking into it.")]
    pub body: String,
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/issues/:id/comments", get(list_comments).post(create_comment))
        .route("/comments/:id", put(update_comment).delete(delete_comment))
}

/// Comments of an issue, oldest first
#[utoipa::path(
    get,
    path = "/issues/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Comment>>> {
    let comments = state.services.comments().list(&user.actor(), id).await?;
    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/issues/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Issue id")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 403, description = "Team member required"),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CommentRequest>,
) -> AppResult<Created<Comment>> {
    let comment = state
        .services
        .comments()
        .create(&user.actor(), id, payload.body)
        .await?;
    Ok(Created(comment))
}

/// Edit a comment (author only)
#[utoipa::path(
    put,
    path = "/comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated comment", body = Comment),
        (status = 403, description = "Author only"),
        (status = 404, description = "Comment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CommentRequest>,
) -> AppResult<Json<Comment>> {
    let comment = state
        .services
        .comments()
        .update(&user.actor(), id, payload.body)
        .await?;
    Ok(Json(comment))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Author or team admin required"),
        (status = 404, description = "Comment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.comments().delete(&user.actor(), id).await?;
    Ok(NoContent)
}
