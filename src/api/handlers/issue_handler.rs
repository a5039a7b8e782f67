//! Issue handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::nullable;
use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::config::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE};
use crate::domain::{Issue, IssueDetails, IssueDraft, IssuePatch, Priority};
use crate::errors::AppResult;
use crate::services::IssueQuery;
use crate::types::{Created, NoContent, Paginated, PaginationParams};

/// Issue listing filters. One of `project_id` or `team_id` is required.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IssueListQuery {
    pub project_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub label_id: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    DEFAULT_PAGE_NUMBER
}

fn default_per_page() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl IssueListQuery {
    fn split(self) -> (IssueQuery, PaginationParams) {
        let query = IssueQuery {
            project_id: self.project_id,
            team_id: self.team_id,
            status_id: self.status_id,
            assignee_id: self.assignee_id,
            priority: self.priority,
            label_id: self.label_id,
        };
        let params = PaginationParams {
            page: self.page,
            per_page: self.per_page,
        };
        (query, params)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateIssueRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[schema(example = "Login button misaligned on Safari")]
    pub title: String,
    pub description: Option<String>,
    /// Defaults to the team's first backlog (or unstarted) status
    pub status_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub label_ids: Vec<Uuid>,
    pub due_date: Option<NaiveDate>,
}

impl From<CreateIssueRequest> for IssueDraft {
    fn from(request: CreateIssueRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            status_id: request.status_id,
            priority: request.priority,
            assignee_id: request.assignee_id,
            label_ids: request.label_ids,
            due_date: request.due_date,
        }
    }
}

/// Partial update; `null` clears a nullable field
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateIssueRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub status_id: Option<Uuid>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub due_date: Option<Option<NaiveDate>>,
}

impl From<UpdateIssueRequest> for IssuePatch {
    fn from(request: UpdateIssueRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            status_id: request.status_id,
            priority: request.priority,
            assignee_id: request.assignee_id,
            due_date: request.due_date,
            completed_at: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetLabelsRequest {
    /// Replaces the issue's labels
    pub label_ids: Vec<Uuid>,
}

pub fn issue_routes() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues))
        .route("/projects/:id/issues", post(create_issue))
        .route(
            "/issues/:id",
            get(get_issue).put(update_issue).delete(delete_issue),
        )
        .route("/issues/:id/labels", put(set_labels))
}

/// List issues of a project or a whole team
#[utoipa::path(
    get,
    path = "/issues",
    tag = "Issues",
    params(IssueListQuery),
    responses(
        (status = 200, description = "Page of issues", body = PaginatedIssues),
        (status = 400, description = "Neither project_id nor team_id given"),
        (status = 404, description = "Project or team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_issues(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<IssueListQuery>,
) -> AppResult<Json<Paginated<Issue>>> {
    let (query, params) = query.split();
    let page = state.services.issues().list(&user.actor(), query, params).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/issues",
    tag = "Issues",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CreateIssueRequest,
    responses(
        (status = 201, description = "Issue created", body = IssueDetails),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Team member required"),
        (status = 409, description = "Project archived")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_issue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateIssueRequest>,
) -> AppResult<Created<IssueDetails>> {
    let issue = state
        .services
        .issues()
        .create(&user.actor(), id, payload.into())
        .await?;
    Ok(Created(issue))
}

#[utoipa::path(
    get,
    path = "/issues/{id}",
    tag = "Issues",
    params(("id" = Uuid, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Issue with labels", body = IssueDetails),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_issue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IssueDetails>> {
    let issue = state.services.issues().get(&user.actor(), id).await?;
    Ok(Json(issue))
}

#[utoipa::path(
    put,
    path = "/issues/{id}",
    tag = "Issues",
    params(("id" = Uuid, Path, description = "Issue id")),
    request_body = UpdateIssueRequest,
    responses(
        (status = 200, description = "Updated issue", body = IssueDetails),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_issue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateIssueRequest>,
) -> AppResult<Json<IssueDetails>> {
    let issue = state
        .services
        .issues()
        .update(&user.actor(), id, payload.into())
        .await?;
    Ok(Json(issue))
}

#[utoipa::path(
    delete,
    path = "/issues/{id}",
    tag = "Issues",
    params(("id" = Uuid, Path, description = "Issue id")),
    responses(
        (status = 204, description = "Issue deleted"),
        (status = 403, description = "Reporter or team admin required"),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_issue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.issues().delete(&user.actor(), id).await?;
    Ok(NoContent)
}

#[utoipa::path(
    put,
    path = "/issues/{id}/labels",
    tag = "Issues",
    params(("id" = Uuid, Path, description = "Issue id")),
    request_body = SetLabelsRequest,
    responses(
        (status = 200, description = "Issue with its new labels", body = IssueDetails),
        (status = 400, description = "Label from another team"),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_labels(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<SetLabelsRequest>,
) -> AppResult<Json<IssueDetails>> {
    let issue = state
        .services
        .issues()
        .set_labels(&user.actor(), id, payload.label_ids)
        .await?;
    Ok(Json(issue))
}
