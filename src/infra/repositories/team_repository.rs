//! Team and membership persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::team::{self, Entity as TeamEntity};
use super::entities::team_member::{self, Entity as MemberEntity};
use super::entities::user::{self, Entity as UserEntity};
use crate::domain::{NewTeam, Team, TeamMember, TeamMemberResponse, TeamPatch, TeamRole, TeamWithRole};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Team>>;

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Team>>;

    /// Teams the user belongs to, with their role, ordered by name
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<TeamWithRole>>;

    async fn team_ids_for_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn update(&self, id: Uuid, patch: TeamPatch) -> AppResult<Team>;

    /// Hard delete; projects, issues and memberships cascade
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Role of a user in a team, `None` when not a member
    async fn membership(&self, team_id: Uuid, user_id: Uuid) -> AppResult<Option<TeamRole>>;

    async fn list_members(&self, team_id: Uuid) -> AppResult<Vec<TeamMemberResponse>>;

    async fn add_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> AppResult<TeamMember>;

    async fn update_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> AppResult<TeamMember>;

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

pub(crate) async fn insert_team<C: ConnectionTrait>(conn: &C, new: NewTeam) -> AppResult<Team> {
    let now = Utc::now();
    let model = team::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(new.name),
        slug: Set(new.slug),
        description: Set(new.description),
        owner_id: Set(new.owner_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    Ok(Team::from(model))
}

pub(crate) async fn insert_member<C: ConnectionTrait>(
    conn: &C,
    team_id: Uuid,
    user_id: Uuid,
    role: TeamRole,
) -> AppResult<TeamMember> {
    let model = team_member::ActiveModel {
        team_id: Set(team_id),
        user_id: Set(user_id),
        role: Set(role.as_str().to_string()),
        joined_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(TeamMember::from(model))
}

pub struct TeamStore {
    db: DatabaseConnection,
}

impl TeamStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_member(&self, team_id: Uuid, user_id: Uuid) -> AppResult<Option<team_member::Model>> {
        Ok(MemberEntity::find_by_id((team_id, user_id))
            .one(&self.db)
            .await?)
    }
}

#[async_trait]
impl TeamRepository for TeamStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Team>> {
        let result = TeamEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Team::from))
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Team>> {
        let result = TeamEntity::find()
            .filter(team::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;
        Ok(result.map(Team::from))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<TeamWithRole>> {
        let memberships: HashMap<Uuid, TeamRole> = MemberEntity::find()
            .filter(team_member::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| {
                let member = TeamMember::from(m);
                (member.team_id, member.role)
            })
            .collect();

        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let teams = TeamEntity::find()
            .filter(team::Column::Id.is_in(memberships.keys().copied()))
            .order_by_asc(team::Column::Name)
            .all(&self.db)
            .await?;

        Ok(teams
            .into_iter()
            .filter_map(|t| {
                let role = *memberships.get(&t.id)?;
                Some(TeamWithRole {
                    team: Team::from(t),
                    role,
                })
            })
            .collect())
    }

    async fn team_ids_for_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = MemberEntity::find()
            .filter(team_member::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.team_id)
            .collect();
        Ok(ids)
    }

    async fn update(&self, id: Uuid, patch: TeamPatch) -> AppResult<Team> {
        let mut active: team::ActiveModel = TeamEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?
            .into();

        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Team::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = TeamEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn membership(&self, team_id: Uuid, user_id: Uuid) -> AppResult<Option<TeamRole>> {
        Ok(self
            .find_member(team_id, user_id)
            .await?
            .map(|m| TeamMember::from(m).role))
    }

    async fn list_members(&self, team_id: Uuid) -> AppResult<Vec<TeamMemberResponse>> {
        let members = MemberEntity::find()
            .filter(team_member::Column::TeamId.eq(team_id))
            .order_by_asc(team_member::Column::JoinedAt)
            .all(&self.db)
            .await?;

        let users: HashMap<Uuid, user::Model> = UserEntity::find()
            .filter(user::Column::Id.is_in(members.iter().map(|m| m.user_id)))
            .filter(user::Column::DeletedAt.is_null())
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(members
            .into_iter()
            .filter_map(|m| {
                let user = users.get(&m.user_id)?;
                let member = TeamMember::from(m);
                Some(TeamMemberResponse {
                    user_id: member.user_id,
                    email: user.email.clone(),
                    name: user.name.clone(),
                    role: member.role,
                    joined_at: member.joined_at,
                })
            })
            .collect())
    }

    async fn add_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> AppResult<TeamMember> {
        if self.find_member(team_id, user_id).await?.is_some() {
            return Err(AppError::conflict("User is already a member of this team"));
        }
        insert_member(&self.db, team_id, user_id, role).await
    }

    async fn update_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> AppResult<TeamMember> {
        let mut active: team_member::ActiveModel = self
            .find_member(team_id, user_id)
            .await?
            .ok_or(AppError::NotFound)?
            .into();
        active.role = Set(role.as_str().to_string());

        let model = active.update(&self.db).await?;
        Ok(TeamMember::from(model))
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = MemberEntity::delete_by_id((team_id, user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
