//! Workflow status and label handlers.

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
use crate::domain::{Label, Status, StatusCategory, StatusPatch};
use crate::errors::AppResult;
use crate::types::{Created, NoContent};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStatusRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    #[schema(example = "In Review")]
    pub name: String,
    pub category: StatusCategory,
    /// `#rrggbb`; the category default when omitted
    #[schema(example = "#f59e0b")]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,
    pub color: Option<String>,
    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLabelRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    #[schema(example = "bug")]
    pub name: String,
    #[schema(example = "#ef4444")]
    pub color: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateLabelRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,
    pub color: Option<String>,
}

pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/teams/:id/statuses", get(list_statuses).post(create_status))
        .route("/statuses/:id", put(update_status).delete(delete_status))
        .route("/teams/:id/labels", get(list_labels).post(create_label))
        .route("/labels/:id", put(update_label).delete(delete_label))
}

/// Workflow statuses of a team, by position
#[utoipa::path(
    get,
    path = "/teams/{id}/statuses",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Statuses", body = [Status]),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_statuses(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Status>>> {
    let statuses = state.services.workflow().list_statuses(&user.actor(), id).await?;
    Ok(Json(statuses))
}

#[utoipa::path(
    post,
    path = "/teams/{id}/statuses",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreateStatusRequest,
    responses(
        (status = 201, description = "Status created", body = Status),
        (status = 403, description = "Team admin required"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateStatusRequest>,
) -> AppResult<Created<Status>> {
    let status = state
        .services
        .workflow()
        .create_status(&user.actor(), id, payload.name, payload.category, payload.color)
        .await?;
    Ok(Created(status))
}

#[utoipa::path(
    put,
    path = "/statuses/{id}",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Status id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated status", body = Status),
        (status = 403, description = "Team admin required"),
        (status = 404, description = "Status not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateStatusRequest>,
) -> AppResult<Json<Status>> {
    let patch = StatusPatch {
        name: payload.name,
        color: payload.color,
        position: payload.position,
    };
    let status = state
        .services
        .workflow()
        .update_status(&user.actor(), id, patch)
        .await?;
    Ok(Json(status))
}

/// Delete an unused status
#[utoipa::path(
    delete,
    path = "/statuses/{id}",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Status id")),
    responses(
        (status = 204, description = "Status deleted"),
        (status = 403, description = "Team admin required"),
        (status = 409, description = "Status in use or last of its category")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.workflow().delete_status(&user.actor(), id).await?;
    Ok(NoContent)
}

#[utoipa::path(
    get,
    path = "/teams/{id}/labels",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Labels", body = [Label]),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_labels(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Label>>> {
    let labels = state.services.workflow().list_labels(&user.actor(), id).await?;
    Ok(Json(labels))
}

#[utoipa::path(
    post,
    path = "/teams/{id}/labels",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreateLabelRequest,
    responses(
        (status = 201, description = "Label created", body = Label),
        (status = 400, description = "Invalid color"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_label(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateLabelRequest>,
) -> AppResult<Created<Label>> {
    let label = state
        .services
        .workflow()
        .create_label(&user.actor(), id, payload.name, payload.color)
        .await?;
    Ok(Created(label))
}

#[utoipa::path(
    put,
    path = "/labels/{id}",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Label id")),
    request_body = UpdateLabelRequest,
    responses(
        (status = 200, description = "Updated label", body = Label),
        (status = 404, description = "Label not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_label(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateLabelRequest>,
) -> AppResult<Json<Label>> {
    let label = state
        .services
        .workflow()
        .update_label(&user.actor(), id, payload.name, payload.color)
        .await?;
    Ok(Json(label))
}

#[utoipa::path(
    delete,
    path = "/labels/{id}",
    tag = "Workflow",
    params(("id" = Uuid, Path, description = "Label id")),
    responses(
        (status = 204, description = "Label deleted"),
        (status = 403, description = "Team admin required"),
        (status = 404, description = "Label not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_label(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.workflow().delete_label(&user.actor(), id).await?;
    Ok(NoContent)
}
