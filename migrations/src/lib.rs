pub use sea_orm_migration::prelude::*;

mod m20240201_000001_create_users_table;
mod m20240201_000002_create_departments_table;
mod m20240201_000003_create_employees_table;
mod m20240201_000004_create_attendance_table;
mod m20240201_000005_create_leave_requests_table;
mod m20240201_000006_create_project_tables;
mod m20240201_000007_create_task_tables;
mod m20240201_000008_create_payroll_tables;
mod m20240201_000009_create_okr_tables;
mod m20240201_000010_create_client_access_table;
mod m20240201_000011_create_engagement_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240201_000001_create_users_table::Migration),
            Box::new(m20240201_000002_create_departments_table::Migration),
            Box::new(m20240201_000003_create_employees_table::Migration),
            Box::new(m20240201_000004_create_attendance_table::Migration),
            Box::new(m20240201_000005_create_leave_requests_table::Migration),
            Box::new(m20240201_000006_create_project_tables::Migration),
            Box::new(m20240201_000007_create_task_tables::Migration),
            Box::new(m20240201_000008_create_payroll_tables::Migration),
            Box::new(m20240201_000009_create_okr_tables::Migration),
            Box::new(m20240201_000010_create_client_access_table::Migration),
            Box::new(m20240201_000011_create_engagement_tables::Migration),
        ]
    }
}
