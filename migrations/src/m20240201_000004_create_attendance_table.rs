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
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attendance::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attendance::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Attendance::Date).date().not_null())
                    .col(ColumnDef::new(Attendance::ClockIn).timestamp().null())
                    .col(ColumnDef::new(Attendance::ClockOut).timestamp().null())
                    .col(
                        ColumnDef::new(Attendance::Status)
                            .string_len(20)
                            .not_null()
                            .default("present"),
                    )
                    .col(
                        ColumnDef::new(Attendance::WorkFrom)
                            .string_len(20)
                            .not_null()
                            .default("office"),
                    )
                    .col(ColumnDef::new(Attendance::Notes).text().null())
                    .col(ColumnDef::new(Attendance::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Attendance::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_employee")
                            .from(Attendance::Table, Attendance::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One attendance record per employee per calendar day
        manager
            .create_index(
                Index::create()
                    .name("uix_attendance_employee_date")
                    .table(Attendance::Table)
                    .col(Attendance::EmployeeId)
                    .col(Attendance::Date)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attendance::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Attendance {
    Table,
    Id,
    EmployeeId,
    Date,
    ClockIn,
    ClockOut,
    Status,
    WorkFrom,
    Notes,
    CreatedAt,
    UpdatedAt,
}
