//! Project handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
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
use crate::domain::{Project, ProjectPatch, ProjectStatus};
use crate::errors::AppResult;
use crate::services::CreateProject;
use crate::types::{Created, NoContent};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectListQuery {
    /// Include archived projects
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Mobile launch")]
    pub name: String,
    #[validate(length(max = 5000, message = "Description is limited to 5000 characters"))]
    pub description: Option<String>,
    /// Must be a team member
    pub lead_id: Option<Uuid>,
    pub target_date: Option<NaiveDate>,
}

/// Partial update; `null` clears a nullable field
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub lead_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub target_date: Option<Option<NaiveDate>>,
}

impl From<UpdateProjectRequest> for ProjectPatch {
    fn from(request: UpdateProjectRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            status: request.status,
            lead_id: request.lead_id,
            target_date: request.target_date,
        }
    }
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/teams/:id/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/archive", post(archive_project))
        .route("/projects/:id/unarchive", post(unarchive_project))
}

#[utoipa::path(
    get,
    path = "/teams/{id}/projects",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Team id"), ProjectListQuery),
    responses(
        (status = 200, description = "Projects of the team", body = [Project]),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let projects = state
        .services
        .projects()
        .list(&user.actor(), id, query.include_archived)
        .await?;
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/teams/{id}/projects",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Team member required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateProjectRequest>,
) -> AppResult<Created<Project>> {
    let input = CreateProject {
        name: payload.name,
        description: payload.description,
        lead_id: payload.lead_id,
        target_date: payload.target_date,
    };
    let project = state.services.projects().create(&user.actor(), id, input).await?;
    Ok(Created(project))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let project = state.services.projects().get(&user.actor(), id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = Project),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProjectRequest>,
) -> AppResult<Json<Project>> {
    let project = state
        .services
        .projects()
        .update(&user.actor(), id, payload.into())
        .await?;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project and its issues deleted"),
        (status = 403, description = "Team admin required"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.projects().delete(&user.actor(), id).await?;
    Ok(NoContent)
}

#[utoipa::path(
    post,
    path = "/projects/{id}/archive",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Archived project", body = Project),
        (status = 403, description = "Team admin required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn archive_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let project = state.services.projects().archive(&user.actor(), id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/unarchive",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Restored project", body = Project),
        (status = 403, description = "Team admin required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unarchive_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let project = state.services.projects().unarchive(&user.actor(), id).await?;
    Ok(Json(project))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_maps_nulls() {
        let request: UpdateProjectRequest =
            serde_json::from_str(r#"{"lead_id":null,"status":"paused"}"#).unwrap();
        let patch = ProjectPatch::from(request);

        assert_eq!(patch.lead_id, Some(None));
        assert_eq!(patch.status, Some(ProjectStatus::Paused));
        assert!(patch.description.is_none());
        assert!(patch.name.is_none());
    }
}
