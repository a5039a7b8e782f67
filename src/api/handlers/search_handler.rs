//! Search handler.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::errors::AppResult;
use crate::services::SearchResults;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// At least two characters
    pub q: String,
    /// Restrict to one team
    pub team_id: Option<Uuid>,
    /// Results per kind, at most 50
    pub limit: Option<u64>,
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

/// Search issues and projects across the caller's teams
#[utoipa::path(
    get,
    path = "/search",
    tag = "Search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching issues and projects", body = SearchResults),
        (status = 400, description = "Query too short")
    ),
    security(("bearer_auth" = []))
)]
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    let results = state
        .services
        .search()
        .search(&user.actor(), query.q, query.limit, query.team_id)
        .await?;
    Ok(Json(results))
}
