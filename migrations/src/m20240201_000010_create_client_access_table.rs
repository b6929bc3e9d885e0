use sea_orm_migration::prelude::*;

use super::m20240201_000001_create_users_table::Users;
use super::m20240201_000006_create_project_tables::Projects;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClientAccess::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClientAccess::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClientAccess::ClientId).uuid().not_null())
                    .col(ColumnDef::new(ClientAccess::ProjectId).uuid().not_null())
                    .col(
                        ColumnDef::new(ClientAccess::CanViewFiles)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ClientAccess::CanViewTasks)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ClientAccess::CanViewComments)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ClientAccess::CanViewTeam)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ClientAccess::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(ClientAccess::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClientAccess::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_client_access_client")
                            .from(ClientAccess::Table, ClientAccess::ClientId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_client_access_project")
                            .from(ClientAccess::Table, ClientAccess::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One grant per client/project pair
        manager
            .create_index(
                Index::create()
                    .name("uix_client_access_client_project")
                    .table(ClientAccess::Table)
                    .col(ClientAccess::ClientId)
                    .col(ClientAccess::ProjectId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClientAccess::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ClientAccess {
    Table,
    Id,
    ClientId,
    ProjectId,
    CanViewFiles,
    CanViewTasks,
    CanViewComments,
    CanViewTeam,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
