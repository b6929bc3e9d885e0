use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payroll run for one employee and pay period.
/// Status moves draft -> processed -> paid, with cancelled reachable from
/// draft and processed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "payrolls")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub employee_id: Uuid,
    pub period_start: Date,
    pub period_end: Date,
    pub base_salary: Decimal,
    pub overtime_hours: f64,
    pub overtime_amount: Decimal,
    pub bonus: Decimal,
    pub deductions: Decimal,
    pub tax: Decimal,
    pub bonus_description: Option<String>,
    pub deduction_description: Option<String>,
    pub net_amount: Decimal,
    pub status: String,
    pub payment_date: Option<Date>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id"
    )]
    Employee,
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}
