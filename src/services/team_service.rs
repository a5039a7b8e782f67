//! Team service - workspaces and their membership.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use std::sync::Arc;
use uuid::Uuid;

use super::access::require_team;
use super::notification_service::{notify_quietly, NotificationService};
use crate::domain::{
    default_statuses, slugify, validate_slug, Actor, NewNotification, NewTeam, NotificationKind,
    Team, TeamMember, TeamMemberResponse, TeamPatch, TeamRole, TeamWithRole,
};
use crate::config::MAX_TEAM_DESCRIPTION_LENGTH;
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::with_transaction;

/// Team creation input
#[derive(Debug, Clone)]
pub struct CreateTeam {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TeamService: Send + Sync {
    /// Create a team owned by the actor, seeded with the default workflow
    async fn create(&self, actor: &Actor, input: CreateTeam) -> AppResult<TeamWithRole>;

    /// Teams the actor belongs to
    async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<TeamWithRole>>;

    async fn get(&self, actor: &Actor, team_id: Uuid) -> AppResult<TeamWithRole>;

    async fn update(&self, actor: &Actor, team_id: Uuid, patch: TeamPatch) -> AppResult<Team>;

    async fn delete(&self, actor: &Actor, team_id: Uuid) -> AppResult<()>;

    async fn list_members(&self, actor: &Actor, team_id: Uuid) -> AppResult<Vec<TeamMemberResponse>>;

    /// Add an existing user, found by e-mail
    async fn add_member(
        &self,
        actor: &Actor,
        team_id: Uuid,
        email: String,
        role: TeamRole,
    ) -> AppResult<TeamMember>;

    async fn update_member_role(
        &self,
        actor: &Actor,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> AppResult<TeamMember>;

    /// Remove a member; members may also remove themselves
    async fn remove_member(&self, actor: &Actor, team_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

fn clean_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::validation("Team name must be 1-100 characters"));
    }
    Ok(name.to_string())
}

/// Blank descriptions are stored as absent.
fn clean_description(description: Option<String>) -> AppResult<Option<String>> {
    let description = description.filter(|d| !d.trim().is_empty());
    if let Some(d) = &description {
        if d.chars().count() > MAX_TEAM_DESCRIPTION_LENGTH {
            return Err(AppError::validation(format!(
                "Description is limited to {} characters",
                MAX_TEAM_DESCRIPTION_LENGTH
            )));
        }
    }
    Ok(description)
}

fn grantable(role: TeamRole) -> AppResult<TeamRole> {
    if role == TeamRole::Owner {
        Err(AppError::validation("The owner role cannot be granted"))
    } else {
        Ok(role)
    }
}

pub struct TeamManager<U: UnitOfWork> {
    uow: Arc<U>,
    notifications: Arc<dyn NotificationService>,
}

impl<U: UnitOfWork> TeamManager<U> {
    pub fn new(uow: Arc<U>, notifications: Arc<dyn NotificationService>) -> Self {
        Self { uow, notifications }
    }

    async fn find_team(&self, team_id: Uuid) -> AppResult<Team> {
        self.uow
            .teams()
            .find_by_id(team_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn current_role(&self, team_id: Uuid, user_id: Uuid) -> AppResult<TeamRole> {
        self.uow
            .teams()
            .membership(team_id, user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl<U: UnitOfWork> TeamService for TeamManager<U> {
    async fn create(&self, actor: &Actor, input: CreateTeam) -> AppResult<TeamWithRole> {
        let name = clean_name(&input.name)?;
        let slug = match input.slug {
            Some(slug) => slug.trim().to_string(),
            None => slugify(&name),
        };
        validate_slug(&slug)?;

        if self.uow.teams().find_by_slug(&slug).await?.is_some() {
            return Err(AppError::already_exists("Team slug"));
        }

        let new_team = NewTeam {
            name,
            slug,
            description: clean_description(input.description)?,
            owner_id: actor.id,
        };

        let team = with_transaction!(self.uow, |ctx| {
            let team = ctx.teams().create(new_team).await?;
            ctx.teams()
                .add_member(team.id, team.owner_id, TeamRole::Owner)
                .await?;
            for status in default_statuses(team.id) {
                ctx.statuses().create(status).await?;
            }
            Ok(team)
        })?;

        tracing::info!(team_id = %team.id, owner_id = %actor.id, "Team created");
        Ok(TeamWithRole {
            team,
            role: TeamRole::Owner,
        })
    }

    async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<TeamWithRole>> {
        self.uow.teams().list_for_user(actor.id).await
    }

    async fn get(&self, actor: &Actor, team_id: Uuid) -> AppResult<TeamWithRole> {
        let role = require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
        let team = self.find_team(team_id).await?;
        Ok(TeamWithRole { team, role })
    }

    async fn update(&self, actor: &Actor, team_id: Uuid, patch: TeamPatch) -> AppResult<Team> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Admin).await?;

        let patch = TeamPatch {
            name: patch.name.as_deref().map(clean_name).transpose()?,
            description: patch.description.map(clean_description).transpose()?,
        };
        let team = self.uow.teams().update(team_id, patch).await?;

        tracing::info!(team_id = %team_id, actor_id = %actor.id, "Team updated");
        Ok(team)
    }

    async fn delete(&self, actor: &Actor, team_id: Uuid) -> AppResult<()> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Owner).await?;
        self.uow.teams().delete(team_id).await?;

        tracing::info!(team_id = %team_id, actor_id = %actor.id, "Team deleted");
        Ok(())
    }

    async fn list_members(&self, actor: &Actor, team_id: Uuid) -> AppResult<Vec<TeamMemberResponse>> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Viewer).await?;
        self.uow.teams().list_members(team_id).await
    }

    async fn add_member(
        &self,
        actor: &Actor,
        team_id: Uuid,
        email: String,
        role: TeamRole,
    ) -> AppResult<TeamMember> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Admin).await?;
        let role = grantable(role)?;

        let email = email.trim().to_lowercase();
        let user = self
            .uow
            .users()
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::validation("No user with that e-mail address"))?;
        if self.uow.teams().membership(team_id, user.id).await?.is_some() {
            return Err(AppError::already_exists("Team member"));
        }
        let team = self.find_team(team_id).await?;

        let member = self.uow.teams().add_member(team_id, user.id, role).await?;

        tracing::info!(team_id = %team_id, user_id = %user.id, role = %role, "Member added");

        let invite = NewNotification::new(
            user.id,
            NotificationKind::TeamInvite,
            format!("You were added to {}", team.name),
            format!("You joined {} as {}.", team.name, role),
        )
        .with_link(format!("/teams/{}", team.id));
        notify_quietly(self.notifications.as_ref(), invite).await;

        Ok(member)
    }

    async fn update_member_role(
        &self,
        actor: &Actor,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> AppResult<TeamMember> {
        require_team(self.uow.as_ref(), actor, team_id, TeamRole::Admin).await?;
        let role = grantable(role)?;

        if self.current_role(team_id, user_id).await? == TeamRole::Owner {
            return Err(AppError::Forbidden);
        }

        let member = self
            .uow
            .teams()
            .update_member_role(team_id, user_id, role)
            .await?;

        tracing::info!(team_id = %team_id, user_id = %user_id, role = %role, "Member role changed");
        Ok(member)
    }

    async fn remove_member(&self, actor: &Actor, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let required = if user_id == actor.id {
            TeamRole::Viewer
        } else {
            TeamRole::Admin
        };
        require_team(self.uow.as_ref(), actor, team_id, required).await?;

        if self.current_role(team_id, user_id).await? == TeamRole::Owner {
            return Err(AppError::validation("The team owner cannot be removed"));
        }

        self.uow.teams().remove_member(team_id, user_id).await?;

        tracing::info!(team_id = %team_id, user_id = %user_id, actor_id = %actor.id, "Member removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Notification, User, UserRole};
    use crate::infra::repositories::entities::{status, team as team_entity, team_member};
    use crate::infra::repositories::{MockTeamRepository, MockUserRepository};
    use crate::services::notification_service::MockNotificationService;
    use crate::services::testing::TestUnitOfWork;
    use chrono::Utc;
    use mockall::predicate::eq;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "lead@example.com", UserRole::User)
    }

    fn team(id: Uuid) -> Team {
        Team {
            id,
            name: "Platform".to_string(),
            slug: "platform".to_string(),
            description: None,
            owner_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            name: "Invitee".to_string(),
            role: UserRole::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn member(team_id: Uuid, user_id: Uuid, role: TeamRole) -> TeamMember {
        TeamMember {
            team_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }

    fn manager(uow: TestUnitOfWork, notifications: MockNotificationService) -> TeamManager<TestUnitOfWork> {
        TeamManager::new(Arc::new(uow), Arc::new(notifications))
    }

    #[tokio::test]
    async fn test_create_rejects_taken_slug() {
        let mut teams = MockTeamRepository::new();
        teams
            .expect_find_by_slug()
            .with(eq("platform-team"))
            .returning(|_| Ok(Some(team(Uuid::new_v4()))));

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc
            .create(
                &actor(),
                CreateTeam {
                    name: "Platform Team".to_string(),
                    slug: None,
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_slug() {
        let svc = manager(TestUnitOfWork::new(), MockNotificationService::new());
        let result = svc
            .create(
                &actor(),
                CreateTeam {
                    name: "Platform".to_string(),
                    slug: Some("Not A Slug".to_string()),
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_hides_foreign_team() {
        let mut teams = MockTeamRepository::new();
        teams.expect_membership().returning(|_, _| Ok(None));
        teams.expect_find_by_id().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc.get(&actor(), Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_member_cannot_update_team() {
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Member)));
        teams.expect_update().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc
            .update(&actor(), Uuid::new_v4(), TeamPatch::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_team() {
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Admin)));
        teams.expect_delete().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc.delete(&actor(), Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_add_member_sends_invite() {
        let me = actor();
        let my_id = me.id;
        let team_id = Uuid::new_v4();
        let invitee = user("new@example.com");
        let invitee_id = invitee.id;

        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == my_id)
            .returning(|_, _| Ok(Some(TeamRole::Admin)));
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == invitee_id)
            .returning(|_, _| Ok(None));
        teams
            .expect_find_by_id()
            .returning(|id| Ok(Some(team(id))));
        teams
            .expect_add_member()
            .with(eq(team_id), eq(invitee_id), eq(TeamRole::Member))
            .times(1)
            .returning(|t, u, r| Ok(member(t, u, r)));
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .with(eq("new@example.com"))
            .returning(move |_| Ok(Some(invitee.clone())));
        let mut notifications = MockNotificationService::new();
        notifications
            .expect_notify()
            .withf(move |n| n.user_id == invitee_id && n.kind == NotificationKind::TeamInvite)
            .times(1)
            .returning(|n| {
                Ok(Notification {
                    id: Uuid::new_v4(),
                    user_id: n.user_id,
                    kind: n.kind,
                    title: n.title,
                    body: n.body,
                    link: n.link,
                    read_at: None,
                    created_at: Utc::now(),
                })
            });

        let svc = manager(TestUnitOfWork::new().with_teams(teams).with_users(users), notifications);
        let added = svc
            .add_member(&me, team_id, " New@Example.com ".to_string(), TeamRole::Member)
            .await
            .unwrap();

        assert_eq!(added.user_id, invitee_id);
    }

    #[tokio::test]
    async fn test_add_existing_member_conflicts() {
        let me = actor();
        let my_id = me.id;
        let invitee = user("dup@example.com");
        let invitee_id = invitee.id;

        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == my_id)
            .returning(|_, _| Ok(Some(TeamRole::Admin)));
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == invitee_id)
            .returning(|_, _| Ok(Some(TeamRole::Member)));
        teams.expect_add_member().never();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(invitee.clone())));
        let mut notifications = MockNotificationService::new();
        notifications.expect_notify().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams).with_users(users), notifications);
        let result = svc
            .add_member(&me, Uuid::new_v4(), "dup@example.com".to_string(), TeamRole::Viewer)
            .await;

        match result {
            Err(err @ AppError::Conflict(_)) => {
                assert_eq!(err.status(), axum::http::StatusCode::CONFLICT)
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_owner_role_cannot_be_changed() {
        let me = actor();
        let my_id = me.id;
        let owner_id = Uuid::new_v4();
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == my_id)
            .returning(|_, _| Ok(Some(TeamRole::Admin)));
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == owner_id)
            .returning(|_, _| Ok(Some(TeamRole::Owner)));
        teams.expect_update_member_role().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc
            .update_member_role(&me, Uuid::new_v4(), owner_id, TeamRole::Viewer)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_update_member_role() {
        let member_id = Uuid::new_v4();
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id != member_id)
            .returning(|_, _| Ok(Some(TeamRole::Owner)));
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == member_id)
            .returning(|_, _| Ok(Some(TeamRole::Viewer)));
        teams
            .expect_update_member_role()
            .with(mockall::predicate::always(), eq(member_id), eq(TeamRole::Admin))
            .times(1)
            .returning(|t, u, r| Ok(member(t, u, r)));

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let updated = svc
            .update_member_role(&actor(), Uuid::new_v4(), member_id, TeamRole::Admin)
            .await
            .unwrap();

        assert_eq!(updated.role, TeamRole::Admin);
    }

    #[tokio::test]
    async fn test_create_seeds_owner_and_workflow() {
        let me = actor();
        let team_id = Uuid::new_v4();
        let now = Utc::now();
        let statuses = default_statuses(team_id).into_iter().map(|s| {
            vec![status::Model {
                id: Uuid::new_v4(),
                team_id,
                name: s.name,
                category: s.category.as_str().to_string(),
                color: s.color,
                position: s.position,
                created_at: now,
            }]
        });
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![team_entity::Model {
                id: team_id,
                name: "Platform Team".to_string(),
                slug: "platform-team".to_string(),
                description: Some("Core services".to_string()),
                owner_id: me.id,
                created_at: now,
                updated_at: now,
            }]])
            .append_query_results([vec![team_member::Model {
                team_id,
                user_id: me.id,
                role: "owner".to_string(),
                joined_at: now,
            }]])
            .append_query_results(statuses)
            .into_connection();

        let mut teams = MockTeamRepository::new();
        teams.expect_find_by_slug().returning(|_| Ok(None));
        let uow = TestUnitOfWork::new().with_teams(teams).with_database(db);

        let svc = manager(uow, MockNotificationService::new());
        let created = svc
            .create(
                &me,
                CreateTeam {
                    name: "  Platform Team ".to_string(),
                    slug: None,
                    description: Some("Core services".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.role, TeamRole::Owner);
        assert_eq!(created.team.id, team_id);
        assert_eq!(created.team.owner_id, me.id);
    }

    #[tokio::test]
    async fn test_update_clears_description() {
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Admin)));
        teams
            .expect_update()
            .withf(|_, patch| patch.name.is_none() && patch.description == Some(None))
            .times(1)
            .returning(|id, _| Ok(team(id)));

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let patch = TeamPatch {
            name: None,
            description: Some(Some("   ".to_string())),
        };
        let updated = svc.update(&actor(), Uuid::new_v4(), patch).await.unwrap();

        assert!(updated.description.is_none());
    }

    #[tokio::test]
    async fn test_owner_role_cannot_be_granted() {
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Owner)));
        teams.expect_add_member().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc
            .add_member(&actor(), Uuid::new_v4(), "x@example.com".to_string(), TeamRole::Owner)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let my_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == my_id)
            .returning(|_, _| Ok(Some(TeamRole::Admin)));
        teams
            .expect_membership()
            .withf(move |_, user_id| *user_id == owner_id)
            .returning(|_, _| Ok(Some(TeamRole::Owner)));
        teams.expect_remove_member().never();

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        let result = svc.remove_member(&actor_with_id(my_id), Uuid::new_v4(), owner_id).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_viewer_can_leave() {
        let me = actor();
        let my_id = me.id;
        let mut teams = MockTeamRepository::new();
        teams
            .expect_membership()
            .returning(|_, _| Ok(Some(TeamRole::Viewer)));
        teams
            .expect_remove_member()
            .withf(move |_, user_id| *user_id == my_id)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = manager(TestUnitOfWork::new().with_teams(teams), MockNotificationService::new());
        svc.remove_member(&me, Uuid::new_v4(), my_id).await.unwrap();
    }

    fn actor_with_id(id: Uuid) -> Actor {
        Actor::new(id, "lead@example.com", UserRole::User)
    }
}
