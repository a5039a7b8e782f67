//! User service - account lookup and administration.
//!
//! Every operation runs on behalf of an [`Actor`]. Users may read and rename
//! themselves; everything else needs a global admin.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Actor, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::types::{Paginated, PaginationParams};

/// User service trait for dependency injection.
///
/// Lookups exclude soft-deleted users unless stated otherwise.
#[async_trait]
pub trait UserService: Send + Sync {
    /// The actor's own account
    async fn me(&self, actor: &Actor) -> AppResult<User>;

    /// Get a user (self or admin)
    async fn get_user(&self, actor: &Actor, id: Uuid) -> AppResult<User>;

    /// List active users (admin)
    async fn list_users(&self, actor: &Actor, params: PaginationParams) -> AppResult<Paginated<User>>;

    /// Rename a user (self or admin) or change the global role (admin)
    async fn update_user(
        &self,
        actor: &Actor,
        id: Uuid,
        name: Option<String>,
        role: Option<UserRole>,
    ) -> AppResult<User>;

    /// Soft delete a user (admin, never self)
    async fn delete_user(&self, actor: &Actor, id: Uuid) -> AppResult<()>;

    /// Restore a soft-deleted user (admin)
    async fn restore_user(&self, actor: &Actor, id: Uuid) -> AppResult<User>;
}

fn require_admin(actor: &Actor) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn me(&self, actor: &Actor) -> AppResult<User> {
        // A token can outlive its account
        self.uow
            .users()
            .find_by_id(actor.id)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    async fn get_user(&self, actor: &Actor, id: Uuid) -> AppResult<User> {
        if actor.id != id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        self.uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn list_users(&self, actor: &Actor, params: PaginationParams) -> AppResult<Paginated<User>> {
        require_admin(actor)?;

        let (users, total) = self
            .uow
            .users()
            .list(params.offset(), params.limit())
            .await?;
        Ok(Paginated::from_params(users, &params, total))
    }

    async fn update_user(
        &self,
        actor: &Actor,
        id: Uuid,
        name: Option<String>,
        role: Option<UserRole>,
    ) -> AppResult<User> {
        if actor.id != id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }
        if role.is_some() {
            require_admin(actor)?;
        }

        let name = match name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => return Err(AppError::validation("Name cannot be empty")),
            other => other,
        };

        let user = self
            .uow
            .users()
            .update(id, name, role.map(|r| r.to_string()))
            .await?;

        tracing::info!(user_id = %id, actor_id = %actor.id, "User updated");
        Ok(user)
    }

    async fn delete_user(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        require_admin(actor)?;
        if actor.id == id {
            return Err(AppError::validation("You cannot delete your own account"));
        }

        self.uow.users().delete(id).await?;

        tracing::info!(user_id = %id, actor_id = %actor.id, "User deleted");
        Ok(())
    }

    async fn restore_user(&self, actor: &Actor, id: Uuid) -> AppResult<User> {
        require_admin(actor)?;

        let user = self.uow.users().restore(id).await?;

        tracing::info!(user_id = %id, actor_id = %actor.id, "User restored");
        Ok(user)
    }
}
