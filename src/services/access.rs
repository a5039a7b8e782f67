//! Team access checks shared by the team-scoped services.

use uuid::Uuid;

use crate::domain::{Actor, Issue, Project, TeamRole};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// Resolve the actor's role in a team and require `required`.
///
/// Admins skip the membership lookup.
pub(crate) async fn require_team<U: UnitOfWork + ?Sized>(
    uow: &U,
    actor: &Actor,
    team_id: Uuid,
    required: TeamRole,
) -> AppResult<TeamRole> {
    let membership = if actor.is_admin() {
        None
    } else {
        uow.teams().membership(team_id, actor.id).await?
    };
    actor.require(membership, required)
}

/// Load a project and check the actor's access to its team.
pub(crate) async fn require_project<U: UnitOfWork + ?Sized>(
    uow: &U,
    actor: &Actor,
    project_id: Uuid,
    required: TeamRole,
) -> AppResult<(Project, TeamRole)> {
    let project = uow
        .projects()
        .find_by_id(project_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let role = require_team(uow, actor, project.team_id, required).await?;
    Ok((project, role))
}

/// Load an issue and check the actor's access to its team.
pub(crate) async fn require_issue<U: UnitOfWork + ?Sized>(
    uow: &U,
    actor: &Actor,
    issue_id: Uuid,
    required: TeamRole,
) -> AppResult<(Issue, TeamRole)> {
    let issue = uow
        .issues()
        .find_by_id(issue_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let role = require_team(uow, actor, issue.team_id, required).await?;
    Ok((issue, role))
}
