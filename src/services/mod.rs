pub mod attendance;
pub mod billing;
pub mod client_portal;
pub mod dashboard;
pub mod employees;
pub mod engagement;
pub mod leave;
pub mod okr;
pub mod payroll;
pub mod projects;
pub mod reports;
pub mod tasks;

use chrono::{Datelike, NaiveDate, Weekday};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::employee;
use crate::errors::ServiceError;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Normalize page and limit query parameters.
pub(crate) fn paginate(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Count of weekdays in the inclusive date range. Zero when end precedes
/// start.
pub(crate) fn business_days_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    let mut count = 0;
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    count
}

/// Inclusive overlap test for two date ranges.
pub(crate) fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Parse a YYYY-MM-DD query parameter.
pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ServiceError::BadRequest("Invalid date format. Use YYYY-MM-DD".to_string()))
}

/// Load the employee profile backing the authenticated user.
pub(crate) async fn employee_for_user(
    db: &DbPool,
    auth: &AuthUser,
) -> Result<employee::Model, ServiceError> {
    employee::Entity::find()
        .filter(employee::Column::UserId.eq(auth.id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Employee profile".to_string()))
}

/// Visibility rule shared by attendance, leave, and reporting: admin and HR
/// see everyone, managers see their direct reports and themselves, everyone
/// else sees only themselves.
pub(crate) fn can_view_employee(
    viewer: &AuthUser,
    viewer_employee_id: Option<Uuid>,
    target: &employee::Model,
) -> bool {
    if viewer.is_people_ops() {
        return true;
    }
    match viewer_employee_id {
        Some(own_id) => {
            if target.id == own_id {
                return true;
            }
            viewer.has_role("manager") && target.manager_id == Some(own_id)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pagination_clamps_inputs() {
        assert_eq!(paginate(None, None), (1, 20));
        assert_eq!(paginate(Some(0), Some(0)), (1, 1));
        assert_eq!(paginate(Some(3), Some(500)), (3, 100));
    }

    // Mon 2024-03-04 through Fri 2024-03-08 is a full work week.
    #[test_case::test_case(date(2024, 3, 4), date(2024, 3, 8), 5; "full week")]
    #[test_case::test_case(date(2024, 3, 8), date(2024, 3, 11), 2; "over a weekend")]
    #[test_case::test_case(date(2024, 3, 9), date(2024, 3, 9), 0; "saturday only")]
    #[test_case::test_case(date(2024, 3, 8), date(2024, 3, 4), 0; "inverted range")]
    fn business_days_skip_weekends(start: NaiveDate, end: NaiveDate, expected: u32) {
        assert_eq!(business_days_between(start, end), expected);
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = (date(2024, 3, 4), date(2024, 3, 8));
        assert!(ranges_overlap(a.0, a.1, date(2024, 3, 8), date(2024, 3, 12)));
        assert!(ranges_overlap(a.0, a.1, date(2024, 3, 1), date(2024, 3, 4)));
        assert!(!ranges_overlap(a.0, a.1, date(2024, 3, 9), date(2024, 3, 12)));
    }

    #[test]
    fn date_parsing_rejects_bad_input() {
        assert!(parse_date("2024-03-04").is_ok());
        assert!(parse_date("04/03/2024").is_err());
        assert!(parse_date("not-a-date").is_err());
    }
}
