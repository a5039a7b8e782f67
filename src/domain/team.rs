//! Team (workspace) entities and membership roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Role a user holds inside one team, ordered by privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Viewer => "viewer",
            TeamRole::Member => "member",
            TeamRole::Admin => "admin",
            TeamRole::Owner => "owner",
        }
    }

    /// Whether this role is at least `required`.
    pub fn at_least(&self, required: TeamRole) -> bool {
        *self >= required
    }
}

impl std::str::FromStr for TeamRole {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "viewer" => Ok(TeamRole::Viewer),
            "member" => Ok(TeamRole::Member),
            "admin" => Ok(TeamRole::Admin),
            "owner" => Ok(TeamRole::Owner),
            other => Err(AppError::validation(format!("Unknown team role '{}'", other))),
        }
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team domain entity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A team as seen by one of its members.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamWithRole {
    #[serde(flatten)]
    pub team: Team,
    pub role: TeamRole,
}

/// Team membership row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// Member listing entry with user details
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamMemberResponse {
    pub user_id: Uuid,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// Team creation data
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Partial team update
#[derive(Debug, Clone, Default)]
pub struct TeamPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

/// Derive a URL-safe slug from a display name.
///
/// Lowercases, keeps ASCII alphanumerics, collapses every other run of
/// characters into a single `-` and trims dashes at both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Validate a caller-supplied slug.
pub fn validate_slug(slug: &str) -> AppResult<()> {
    let valid = !slug.is_empty()
        && slug.len() <= 64
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(AppError::validation(
            "Slug must be 1-64 lowercase letters, digits or dashes",
        ))
    }
}
