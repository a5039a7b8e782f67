//! Migration: per-team statuses and labels.

use sea_orm_migration::prelude::*;

use super::m20240201_000001_create_teams_tables::Teams;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Statuses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Statuses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Statuses::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Statuses::Name).string_len(50).not_null())
                    .col(ColumnDef::new(Statuses::Category).string_len(16).not_null())
                    .col(ColumnDef::new(Statuses::Color).string_len(7).not_null())
                    .col(ColumnDef::new(Statuses::Position).integer().not_null())
                    .col(
                        ColumnDef::new(Statuses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_statuses_team")
                            .from(Statuses::Table, Statuses::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_statuses_team_position")
                    .table(Statuses::Table)
                    .col(Statuses::TeamId)
                    .col(Statuses::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Labels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Labels::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Labels::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Labels::Name).string_len(50).not_null())
                    .col(ColumnDef::new(Labels::Color).string_len(7).not_null())
                    .col(
                        ColumnDef::new(Labels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_labels_team")
                            .from(Labels::Table, Labels::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Label names are unique per team regardless of case.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX uq_labels_team_name ON labels (team_id, LOWER(name))",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Labels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Statuses::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Statuses {
    Table,
    Id,
    TeamId,
    Name,
    Category,
    Color,
    Position,
    CreatedAt,
}

#[derive(Iden)]
pub enum Labels {
    Table,
    Id,
    TeamId,
    Name,
    Color,
    CreatedAt,
}
