//! Team report handler.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::TeamReport;
use crate::errors::AppResult;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Window in days, 7-90 (default 14)
    pub days: Option<i64>,
}

pub fn report_routes() -> Router<AppState> {
    Router::new().route("/teams/:id/report", get(team_report))
}

/// Team summary over a trailing window
#[utoipa::path(
    get,
    path = "/teams/{id}/report",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Team id"), ReportQuery),
    responses(
        (status = 200, description = "Team report", body = TeamReport),
        (status = 400, description = "Window out of range"),
        (status = 404, description = "Team not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn team_report(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<TeamReport>> {
    let report = state
        .services
        .reports()
        .team_summary(&user.actor(), id, query.days)
        .await?;
    Ok(Json(report))
}
