use sea_orm_migration::prelude::*;

use super::m20240201_000003_create_employees_table::Employees;
use super::m20240201_000006_create_project_tables::Projects;
use super::m20240201_000007_create_task_tables::Tasks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MoodEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MoodEntries::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MoodEntries::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(MoodEntries::Mood).string_len(20).not_null())
                    .col(ColumnDef::new(MoodEntries::Note).text().null())
                    .col(ColumnDef::new(MoodEntries::Date).date().not_null())
                    .col(
                        ColumnDef::new(MoodEntries::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MoodEntries::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mood_entries_employee")
                            .from(MoodEntries::Table, MoodEntries::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uix_mood_entries_employee_date")
                    .table(MoodEntries::Table)
                    .col(MoodEntries::EmployeeId)
                    .col(MoodEntries::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PerformanceFeedback::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PerformanceFeedback::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PerformanceFeedback::EmployeeId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PerformanceFeedback::ReviewerId).uuid().null())
                    .col(
                        ColumnDef::new(PerformanceFeedback::FeedbackType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PerformanceFeedback::Content).text().not_null())
                    .col(ColumnDef::new(PerformanceFeedback::Strengths).text().null())
                    .col(
                        ColumnDef::new(PerformanceFeedback::AreasOfImprovement)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(PerformanceFeedback::Rating).integer().null())
                    .col(
                        ColumnDef::new(PerformanceFeedback::IsDraft)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PerformanceFeedback::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PerformanceFeedback::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_performance_feedback_employee")
                            .from(PerformanceFeedback::Table, PerformanceFeedback::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskRewards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TaskRewards::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TaskRewards::TaskId).uuid().not_null())
                    .col(
                        ColumnDef::new(TaskRewards::RewardType)
                            .string_len(20)
                            .not_null()
                            .default("points"),
                    )
                    .col(
                        ColumnDef::new(TaskRewards::Points)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(TaskRewards::Name).string_len(100).not_null())
                    .col(ColumnDef::new(TaskRewards::Description).text().null())
                    .col(ColumnDef::new(TaskRewards::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(TaskRewards::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TaskRewards::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_rewards_task")
                            .from(TaskRewards::Table, TaskRewards::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmployeeRewards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmployeeRewards::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmployeeRewards::EmployeeId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmployeeRewards::TaskRewardId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmployeeRewards::Claimed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(EmployeeRewards::EarnedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmployeeRewards::ClaimedAt).timestamp().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_rewards_employee")
                            .from(EmployeeRewards::Table, EmployeeRewards::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_rewards_reward")
                            .from(EmployeeRewards::Table, EmployeeRewards::TaskRewardId)
                            .to(TaskRewards::Table, TaskRewards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HrQueries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HrQueries::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HrQueries::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(HrQueries::Query).text().not_null())
                    .col(ColumnDef::new(HrQueries::Response).text().null())
                    .col(
                        ColumnDef::new(HrQueries::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(HrQueries::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(HrQueries::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_hr_queries_employee")
                            .from(HrQueries::Table, HrQueries::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RagUpdates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RagUpdates::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RagUpdates::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(RagUpdates::Status).string_len(10).not_null())
                    .col(ColumnDef::new(RagUpdates::UpdateDate).date().not_null())
                    .col(ColumnDef::new(RagUpdates::Description).text().not_null())
                    .col(ColumnDef::new(RagUpdates::ActionItems).text().null())
                    .col(ColumnDef::new(RagUpdates::UpdatedBy).uuid().not_null())
                    .col(ColumnDef::new(RagUpdates::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(RagUpdates::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rag_updates_project")
                            .from(RagUpdates::Table, RagUpdates::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rag_updates_project_date")
                    .table(RagUpdates::Table)
                    .col(RagUpdates::ProjectId)
                    .col(RagUpdates::UpdateDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RagUpdates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HrQueries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmployeeRewards::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskRewards::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PerformanceFeedback::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MoodEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MoodEntries {
    Table,
    Id,
    EmployeeId,
    Mood,
    Note,
    Date,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum PerformanceFeedback {
    Table,
    Id,
    EmployeeId,
    ReviewerId,
    FeedbackType,
    Content,
    Strengths,
    AreasOfImprovement,
    Rating,
    IsDraft,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum TaskRewards {
    Table,
    Id,
    TaskId,
    RewardType,
    Points,
    Name,
    Description,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum EmployeeRewards {
    Table,
    Id,
    EmployeeId,
    TaskRewardId,
    Claimed,
    EarnedAt,
    ClaimedAt,
}

#[derive(DeriveIden)]
pub enum HrQueries {
    Table,
    Id,
    EmployeeId,
    Query,
    Response,
    IsPrivate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum RagUpdates {
    Table,
    Id,
    ProjectId,
    Status,
    UpdateDate,
    Description,
    ActionItems,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}
