use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One attendance record per employee per calendar day.
/// Status is present, absent, or half-day; work_from is office, home, or
/// remote.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: Date,
    pub clock_in: Option<DateTime>,
    pub clock_out: Option<DateTime>,
    pub status: String,
    pub work_from: String,
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Model {
    /// Hours between clock in and clock out, rounded to two decimals.
    /// None until both timestamps exist.
    pub fn hours_worked(&self) -> Option<f64> {
        match (self.clock_in, self.clock_out) {
            (Some(clock_in), Some(clock_out)) => {
                let seconds = (clock_out - clock_in).num_seconds().max(0) as f64;
                Some((seconds / 3600.0 * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(clock_in: Option<DateTime>, clock_out: Option<DateTime>) -> Model {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Model {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            clock_in,
            clock_out,
            status: "present".into(),
            work_from: "office".into(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn hours_worked_requires_both_timestamps() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let clock_in = date.and_hms_opt(9, 0, 0).unwrap();
        let clock_out = date.and_hms_opt(17, 45, 0).unwrap();

        assert_eq!(record(None, None).hours_worked(), None);
        assert_eq!(record(Some(clock_in), None).hours_worked(), None);
        assert_eq!(
            record(Some(clock_in), Some(clock_out)).hours_worked(),
            Some(8.75)
        );
    }
}
