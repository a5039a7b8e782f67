//! Team and membership handlers.

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

use super::nullable;
use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{Team, TeamMember, TeamMemberResponse, TeamPatch, TeamRole, TeamWithRole};
use crate::errors::AppResult;
use crate::services::CreateTeam;
use crate::types::{Created, NoContent};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Platform")]
    pub name: String,
    /// URL slug; derived from the name when omitted
    #[schema(example = "platform")]
    pub slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is limited to 2000 characters"))]
    pub description: Option<String>,
}

/// Partial update; `null` clears the description
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

impl From<UpdateTeamRequest> for TeamPatch {
    fn from(request: UpdateTeamRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[serde(default = "default_member_role")]
    pub role: TeamRole,
}

fn default_member_role() -> TeamRole {
    TeamRole::Member
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMemberRequest {
    pub role: TeamRole,
}

pub fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route("/teams/:id", get(get_team).put(update_team).delete(delete_team))
        .route("/teams/:id/members", get(list_members).post(add_member))
        .route(
            "/teams/:id/members/:user_id",
            put(update_member).delete(remove_member),
        )
}

/// Teams the current user belongs to
#[utoipa::path(
    get,
    path = "/teams",
    tag = "Teams",
    responses((status = 200, description = "Teams with the caller's role", body = [TeamWithRole])),
    security(("bearer_auth" = []))
)]
pub async fn list_teams(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<TeamWithRole>>> {
    let teams = state.services.teams().list_mine(&user.actor()).await?;
    Ok(Json(teams))
}

/// Create a team owned by the caller
#[utoipa::path(
    post,
    path = "/teams",
    tag = "Teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = TeamWithRole),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Slug already taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateTeamRequest>,
) -> AppResult<Created<TeamWithRole>> {
    let input = CreateTeam {
        name: payload.name,
        slug: payload.slug,
        description: payload.description,
    };
    let team = state.services.teams().create(&user.actor(), input).await?;
    Ok(Created(team))
}

#[utoipa::path(
    get,
    path = "/teams/{id}",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team", body = TeamWithRole),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_team(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TeamWithRole>> {
    let team = state.services.teams().get(&user.actor(), id).await?;
    Ok(Json(team))
}

#[utoipa::path(
    put,
    path = "/teams/{id}",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = UpdateTeamRequest,
    responses(
        (status = 200, description = "Updated team", body = Team),
        (status = 403, description = "Team admin required"),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_team(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateTeamRequest>,
) -> AppResult<Json<Team>> {
    let team = state
        .services
        .teams()
        .update(&user.actor(), id, payload.into())
        .await?;
    Ok(Json(team))
}

#[utoipa::path(
    delete,
    path = "/teams/{id}",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 204, description = "Team deleted"),
        (status = 403, description = "Owner only"),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.teams().delete(&user.actor(), id).await?;
    Ok(NoContent)
}

#[utoipa::path(
    get,
    path = "/teams/{id}/members",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Members", body = [TeamMemberResponse]),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<TeamMemberResponse>>> {
    let members = state.services.teams().list_members(&user.actor(), id).await?;
    Ok(Json(members))
}

/// Add an existing user to the team by e-mail
#[utoipa::path(
    post,
    path = "/teams/{id}/members",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = TeamMember),
        (status = 400, description = "Unknown user or role"),
        (status = 403, description = "Team admin required"),
        (status = 409, description = "Already a member")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AddMemberRequest>,
) -> AppResult<Created<TeamMember>> {
    let member = state
        .services
        .teams()
        .add_member(&user.actor(), id, payload.email, payload.role)
        .await?;
    Ok(Created(member))
}

#[utoipa::path(
    put,
    path = "/teams/{id}/members/{user_id}",
    tag = "Teams",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member's user id")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Role changed", body = TeamMember),
        (status = 403, description = "Team admin required"),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(payload): ValidatedJson<UpdateMemberRequest>,
) -> AppResult<Json<TeamMember>> {
    let member = state
        .services
        .teams()
        .update_member_role(&user.actor(), id, user_id, payload.role)
        .await?;
    Ok(Json(member))
}

/// Remove a member, or leave the team when `user_id` is the caller
#[utoipa::path(
    delete,
    path = "/teams/{id}/members/{user_id}",
    tag = "Teams",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member's user id")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Team admin required"),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<NoContent> {
    state
        .services
        .teams()
        .remove_member(&user.actor(), id, user_id)
        .await?;
    Ok(NoContent)
}
