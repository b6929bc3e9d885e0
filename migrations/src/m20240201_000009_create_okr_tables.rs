use sea_orm_migration::prelude::*;

use super::m20240201_000003_create_employees_table::Employees;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Okrs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Okrs::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Okrs::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Okrs::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Okrs::Description).text().null())
                    .col(
                        ColumnDef::new(Okrs::Timeframe)
                            .string_len(20)
                            .not_null()
                            .default("quarterly"),
                    )
                    .col(ColumnDef::new(Okrs::StartDate).date().not_null())
                    .col(ColumnDef::new(Okrs::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(Okrs::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Okrs::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Okrs::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Okrs::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Okrs::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_okrs_employee")
                            .from(Okrs::Table, Okrs::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(KeyResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(KeyResults::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(KeyResults::OkrId).uuid().not_null())
                    .col(ColumnDef::new(KeyResults::Title).string_len(200).not_null())
                    .col(ColumnDef::new(KeyResults::Description).text().null())
                    .col(ColumnDef::new(KeyResults::TargetValue).double().not_null())
                    .col(
                        ColumnDef::new(KeyResults::CurrentValue)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(KeyResults::Unit).string_len(50).null())
                    .col(
                        ColumnDef::new(KeyResults::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(KeyResults::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(KeyResults::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_key_results_okr")
                            .from(KeyResults::Table, KeyResults::OkrId)
                            .to(Okrs::Table, Okrs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KeyResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Okrs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Okrs {
    Table,
    Id,
    EmployeeId,
    Title,
    Description,
    Timeframe,
    StartDate,
    EndDate,
    Status,
    Progress,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum KeyResults {
    Table,
    Id,
    OkrId,
    Title,
    Description,
    TargetValue,
    CurrentValue,
    Unit,
    Progress,
    CreatedAt,
    UpdatedAt,
}
