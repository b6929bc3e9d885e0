use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A reward earned by an employee. Claiming is one-shot.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "employee_rewards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub employee_id: Uuid,
    pub task_reward_id: Uuid,
    pub claimed: bool,
    pub earned_at: DateTime,
    pub claimed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id"
    )]
    Employee,
    #[sea_orm(
        belongs_to = "super::task_reward::Entity",
        from = "Column::TaskRewardId",
        to = "super::task_reward::Column::Id"
    )]
    TaskReward,
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::task_reward::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskReward.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}
