//! Migration: projects, issues and issue labels.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users_table::Users;
use super::m20240201_000001_create_teams_tables::Teams;
use super::m20240201_000002_create_workflow_tables::{Labels, Statuses};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Projects::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Projects::Description).text().null())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(16)
                            .not_null()
                            .default("planned"),
                    )
                    .col(ColumnDef::new(Projects::LeadId).uuid().null())
                    .col(ColumnDef::new(Projects::TargetDate).date().null())
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Projects::ArchivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_team")
                            .from(Projects::Table, Projects::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_lead")
                            .from(Projects::Table, Projects::LeadId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Issues::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Issues::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Issues::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Issues::Number).integer().not_null())
                    .col(ColumnDef::new(Issues::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Issues::Description).text().null())
                    .col(ColumnDef::new(Issues::StatusId).uuid().not_null())
                    .col(
                        ColumnDef::new(Issues::Priority)
                            .string_len(16)
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Issues::AssigneeId).uuid().null())
                    .col(ColumnDef::new(Issues::ReporterId).uuid().not_null())
                    .col(ColumnDef::new(Issues::DueDate).date().null())
                    .col(
                        ColumnDef::new(Issues::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_team")
                            .from(Issues::Table, Issues::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_project")
                            .from(Issues::Table, Issues::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_status")
                            .from(Issues::Table, Issues::StatusId)
                            .to(Statuses::Table, Statuses::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_assignee")
                            .from(Issues::Table, Issues::AssigneeId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_reporter")
                            .from(Issues::Table, Issues::ReporterId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_issues_project_number")
                    .table(Issues::Table)
                    .col(Issues::ProjectId)
                    .col(Issues::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issues_team_created")
                    .table(Issues::Table)
                    .col(Issues::TeamId)
                    .col(Issues::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IssueLabels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IssueLabels::IssueId).uuid().not_null())
                    .col(ColumnDef::new(IssueLabels::LabelId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(IssueLabels::IssueId)
                            .col(IssueLabels::LabelId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_labels_issue")
                            .from(IssueLabels::Table, IssueLabels::IssueId)
                            .to(Issues::Table, Issues::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_labels_label")
                            .from(IssueLabels::Table, IssueLabels::LabelId)
                            .to(Labels::Table, Labels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IssueLabels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    TeamId,
    Name,
    Description,
    Status,
    LeadId,
    TargetDate,
    CreatedAt,
    UpdatedAt,
    ArchivedAt,
}

#[derive(Iden)]
pub enum Issues {
    Table,
    Id,
    TeamId,
    ProjectId,
    Number,
    Title,
    Description,
    StatusId,
    Priority,
    AssigneeId,
    ReporterId,
    DueDate,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum IssueLabels {
    Table,
    IssueId,
    LabelId,
}
