//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod comment;
pub mod issue;
pub mod issue_label;
pub mod label;
pub mod notification;
pub mod project;
pub mod status;
pub mod team;
pub mod team_member;
pub mod usage_log;
pub mod user;
