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
                    .table(Salaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Salaries::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Salaries::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Salaries::BaseSalary).decimal().not_null())
                    .col(
                        ColumnDef::new(Salaries::SalaryType)
                            .string_len(20)
                            .not_null()
                            .default("fixed"),
                    )
                    .col(
                        ColumnDef::new(Salaries::Frequency)
                            .string_len(20)
                            .not_null()
                            .default("monthly"),
                    )
                    .col(ColumnDef::new(Salaries::EffectiveDate).date().not_null())
                    .col(ColumnDef::new(Salaries::EndDate).date().null())
                    .col(ColumnDef::new(Salaries::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Salaries::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Salaries::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_salaries_employee")
                            .from(Salaries::Table, Salaries::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_salaries_employee_effective")
                    .table(Salaries::Table)
                    .col(Salaries::EmployeeId)
                    .col(Salaries::EffectiveDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payrolls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payrolls::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payrolls::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Payrolls::PeriodStart).date().not_null())
                    .col(ColumnDef::new(Payrolls::PeriodEnd).date().not_null())
                    .col(ColumnDef::new(Payrolls::BaseSalary).decimal().not_null())
                    .col(
                        ColumnDef::new(Payrolls::OvertimeHours)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Payrolls::OvertimeAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Payrolls::Bonus)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Payrolls::BonusDescription).text().null())
                    .col(
                        ColumnDef::new(Payrolls::Deductions)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Payrolls::DeductionDescription).text().null())
                    .col(
                        ColumnDef::new(Payrolls::Tax)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Payrolls::NetAmount).decimal().not_null())
                    .col(
                        ColumnDef::new(Payrolls::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Payrolls::PaymentDate).date().null())
                    .col(ColumnDef::new(Payrolls::Notes).text().null())
                    .col(ColumnDef::new(Payrolls::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Payrolls::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Payrolls::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payrolls_employee")
                            .from(Payrolls::Table, Payrolls::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payrolls_employee_period")
                    .table(Payrolls::Table)
                    .col(Payrolls::EmployeeId)
                    .col(Payrolls::PeriodEnd)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payrolls::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Salaries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Salaries {
    Table,
    Id,
    EmployeeId,
    BaseSalary,
    SalaryType,
    Frequency,
    EffectiveDate,
    EndDate,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Payrolls {
    Table,
    Id,
    EmployeeId,
    PeriodStart,
    PeriodEnd,
    BaseSalary,
    OvertimeHours,
    OvertimeAmount,
    Bonus,
    BonusDescription,
    Deductions,
    DeductionDescription,
    Tax,
    NetAmount,
    Status,
    PaymentDate,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
