//! Migration: assistant usage accounting.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AiUsageLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AiUsageLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AiUsageLogs::UserId).uuid().not_null())
                    .col(ColumnDef::new(AiUsageLogs::TeamId).uuid().null())
                    .col(ColumnDef::new(AiUsageLogs::Model).string_len(100).not_null())
                    .col(
                        ColumnDef::new(AiUsageLogs::PromptTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AiUsageLogs::CompletionTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AiUsageLogs::ToolCalls)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AiUsageLogs::Rounds)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AiUsageLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ai_usage_logs_user")
                            .from(AiUsageLogs::Table, AiUsageLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ai_usage_logs_user_created")
                    .table(AiUsageLogs::Table)
                    .col(AiUsageLogs::UserId)
                    .col(AiUsageLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AiUsageLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AiUsageLogs {
    Table,
    Id,
    UserId,
    TeamId,
    Model,
    PromptTokens,
    CompletionTokens,
    ToolCalls,
    Rounds,
    CreatedAt,
}
