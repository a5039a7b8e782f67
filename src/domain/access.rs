//! Authorization model shared by every team-scoped service.
//!
//! Global admins act as team owners everywhere. Everyone else needs a
//! membership row, and the membership role must reach the level an
//! operation requires.

use uuid::Uuid;

use super::{TeamRole, UserRole};
use crate::errors::{AppError, AppResult};

/// The authenticated principal on whose behalf a service call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: Uuid, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id,
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Resolve the role this actor effectively holds in a team.
    ///
    /// `membership` is the actor's stored role, if any.
    pub fn team_role(&self, membership: Option<TeamRole>) -> Option<TeamRole> {
        if self.is_admin() {
            Some(TeamRole::Owner)
        } else {
            membership
        }
    }

    /// Check access to a team.
    ///
    /// Non-members get `NotFound` so team ids do not leak; members without
    /// the required role get `Forbidden`.
    pub fn require(&self, membership: Option<TeamRole>, required: TeamRole) -> AppResult<TeamRole> {
        match self.team_role(membership) {
            None => Err(AppError::NotFound),
            Some(role) if role.at_least(required) => Ok(role),
            Some(_) => Err(AppError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Actor {
        Actor::new(Uuid::new_v4(), "u@example.com", UserRole::User)
    }

    #[test]
    fn test_non_member_sees_not_found() {
        let result = user().require(None, TeamRole::Viewer);
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[test]
    fn test_viewer_cannot_write() {
        let result = user().require(Some(TeamRole::Viewer), TeamRole::Member);
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn test_member_can_write() {
        let role = user().require(Some(TeamRole::Member), TeamRole::Member).unwrap();
        assert_eq!(role, TeamRole::Member);
    }

    #[test]
    fn test_global_admin_is_owner_everywhere() {
        let admin = Actor::new(Uuid::new_v4(), "a@example.com", UserRole::Admin);
        assert_eq!(admin.require(None, TeamRole::Owner).unwrap(), TeamRole::Owner);
    }
}
