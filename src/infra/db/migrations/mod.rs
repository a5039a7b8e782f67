//! Database migrations.
//!
//! Each migration is a separate module following SeaORM conventions.
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240201_000001_create_teams_tables;
mod m20240201_000002_create_workflow_tables;
mod m20240201_000003_create_projects_and_issues;
mod m20240201_000004_create_comments_and_notifications;
mod m20240201_000005_create_ai_usage_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240201_000001_create_teams_tables::Migration),
            Box::new(m20240201_000002_create_workflow_tables::Migration),
            Box::new(m20240201_000003_create_projects_and_issues::Migration),
            Box::new(m20240201_000004_create_comments_and_notifications::Migration),
            Box::new(m20240201_000005_create_ai_usage_logs::Migration),
        ]
    }
}
