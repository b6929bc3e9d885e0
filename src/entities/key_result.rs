use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "key_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub okr_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: Option<String>,
    pub progress: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::okr::Entity",
        from = "Column::OkrId",
        to = "super::okr::Column::Id"
    )]
    Okr,
}

impl Related<super::okr::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Okr.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {}
