use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{employee, leave_request};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{business_days_between, can_view_employee, employee_for_user, paginate};

pub const LEAVE_TYPES: &[&str] = &[
    "annual",
    "sick",
    "personal",
    "maternity",
    "paternity",
    "bereavement",
    "unpaid",
    "other",
];

pub const LEAVE_STATUSES: &[&str] = &["pending", "approved", "rejected", "cancelled"];

#[derive(Clone)]
pub struct LeaveService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize)]
pub struct LeaveListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateLeaveRequest {
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Defaults to the weekday count of the range.
    pub days: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateLeaveRequest {
    pub leave_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub days: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LeaveActionRequest {
    /// approve or reject
    pub action: String,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LeaveBalance {
    pub year: i32,
    pub annual: LeaveTypeBalance,
    pub sick: LeaveTypeBalance,
    pub personal: LeaveTypeBalance,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LeaveTypeBalance {
    pub entitled: f64,
    pub taken: f64,
    pub pending: f64,
    pub remaining: f64,
}

fn validate_leave_type(value: &str) -> Result<(), ServiceError> {
    if LEAVE_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "Invalid leave type: {}",
            value
        )))
    }
}

/// Annual entitlement grows by one day per completed year of service,
/// starting at 20 and capped at 30.
pub(crate) fn annual_entitlement(date_of_joining: NaiveDate, today: NaiveDate) -> f64 {
    let mut years = today.year() - date_of_joining.year();
    let anniversary_passed = (today.month(), today.day())
        >= (date_of_joining.month(), date_of_joining.day());
    if !anniversary_passed {
        years -= 1;
    }
    let years = years.max(0) as f64;
    (20.0 + years).min(30.0)
}

impl LeaveService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        LeaveService { db, event_sender }
    }

    async fn load(&self, id: Uuid) -> Result<leave_request::Model, ServiceError> {
        leave_request::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Leave request".to_string()))
    }

    async fn team_ids(&self, manager_employee_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let mut ids: Vec<Uuid> = employee::Entity::find()
            .filter(employee::Column::ManagerId.eq(manager_employee_id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        ids.push(manager_employee_id);
        Ok(ids)
    }

    async fn has_overlap(
        &self,
        employee_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let mut finder = leave_request::Entity::find()
            .filter(leave_request::Column::EmployeeId.eq(employee_id))
            .filter(leave_request::Column::Status.is_not_in(["rejected", "cancelled"]))
            .filter(leave_request::Column::StartDate.lte(end))
            .filter(leave_request::Column::EndDate.gte(start));
        if let Some(id) = exclude {
            finder = finder.filter(leave_request::Column::Id.ne(id));
        }
        Ok(finder.one(self.db.as_ref()).await?.is_some())
    }

    #[instrument(skip(self, auth, query))]
    pub async fn list(
        &self,
        auth: &AuthUser,
        query: LeaveListQuery,
    ) -> Result<PaginatedResponse<leave_request::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = leave_request::Entity::find();

        if !auth.is_people_ops() {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            if auth.has_role("manager") {
                let team = self.team_ids(own.id).await?;
                if let Some(requested) = query.employee_id {
                    if !team.contains(&requested) {
                        return Err(ServiceError::Forbidden(
                            "You don't have permission to view this leave request".to_string(),
                        ));
                    }
                    finder = finder.filter(leave_request::Column::EmployeeId.eq(requested));
                } else {
                    finder = finder.filter(leave_request::Column::EmployeeId.is_in(team));
                }
            } else {
                if let Some(requested) = query.employee_id {
                    if requested != own.id {
                        return Err(ServiceError::Forbidden(
                            "You don't have permission to view this leave request".to_string(),
                        ));
                    }
                }
                finder = finder.filter(leave_request::Column::EmployeeId.eq(own.id));
            }
        } else if let Some(requested) = query.employee_id {
            finder = finder.filter(leave_request::Column::EmployeeId.eq(requested));
        }

        if let Some(status) = query.status.as_deref() {
            if !LEAVE_STATUSES.contains(&status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Invalid status: {}",
                    status
                )));
            }
            finder = finder.filter(leave_request::Column::Status.eq(status));
        }
        if let Some(start) = query.start_date {
            finder = finder.filter(leave_request::Column::EndDate.gte(start));
        }
        if let Some(end) = query.end_date {
            finder = finder.filter(leave_request::Column::StartDate.lte(end));
        }

        let paginator = finder
            .order_by_desc(leave_request::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth), fields(leave_id = %id))]
    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<leave_request::Model, ServiceError> {
        let request = self.load(id).await?;
        let owner = employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        if !can_view_employee(auth, auth.employee_id, &owner) {
            return Err(ServiceError::Forbidden(
                "You don't have permission to view this leave request".to_string(),
            ));
        }
        Ok(request)
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create(
        &self,
        auth: &AuthUser,
        request: CreateLeaveRequest,
    ) -> Result<leave_request::Model, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        validate_leave_type(&request.leave_type)?;

        if request.start_date > request.end_date {
            return Err(ServiceError::BadRequest(
                "Start date must be before end date".to_string(),
            ));
        }
        let today = Utc::now().naive_utc().date();
        if request.start_date < today {
            return Err(ServiceError::BadRequest(
                "Cannot request leave for past dates".to_string(),
            ));
        }
        if self
            .has_overlap(employee.id, request.start_date, request.end_date, None)
            .await?
        {
            return Err(ServiceError::BadRequest(
                "You already have a leave request for this period".to_string(),
            ));
        }

        let days = request
            .days
            .unwrap_or_else(|| business_days_between(request.start_date, request.end_date) as f64);
        if days <= 0.0 {
            return Err(ServiceError::BadRequest(
                "Leave must cover at least one day".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let model = leave_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(employee.id),
            leave_type: Set(request.leave_type),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            days: Set(days),
            reason: Set(request.reason),
            status: Set("pending".to_string()),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            review_note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::LeaveRequested {
                    leave_id: model.id,
                    employee_id: employee.id,
                })
                .await?;
        }
        info!(leave_id = %model.id, "leave requested");
        Ok(model)
    }

    #[instrument(skip(self, auth, update), fields(leave_id = %id))]
    pub async fn update(
        &self,
        auth: &AuthUser,
        id: Uuid,
        update: UpdateLeaveRequest,
    ) -> Result<leave_request::Model, ServiceError> {
        let existing = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;

        if existing.employee_id != employee.id {
            return Err(ServiceError::Forbidden(
                "You can only update your own leave requests".to_string(),
            ));
        }
        if existing.status != "pending" {
            return Err(ServiceError::BadRequest(
                "Only pending leave requests can be updated".to_string(),
            ));
        }

        let start = update.start_date.unwrap_or(existing.start_date);
        let end = update.end_date.unwrap_or(existing.end_date);
        if start > end {
            return Err(ServiceError::BadRequest(
                "Start date must be before end date".to_string(),
            ));
        }
        let dates_changed = start != existing.start_date || end != existing.end_date;
        if dates_changed
            && self
                .has_overlap(employee.id, start, end, Some(existing.id))
                .await?
        {
            return Err(ServiceError::BadRequest(
                "You already have a leave request for this period".to_string(),
            ));
        }

        let days = match update.days {
            Some(days) => days,
            None if dates_changed => business_days_between(start, end) as f64,
            None => existing.days,
        };

        let mut active: leave_request::ActiveModel = existing.into();
        if let Some(leave_type) = update.leave_type {
            validate_leave_type(&leave_type)?;
            active.leave_type = Set(leave_type);
        }
        active.start_date = Set(start);
        active.end_date = Set(end);
        active.days = Set(days);
        if let Some(reason) = update.reason {
            active.reason = Set(Some(reason));
        }
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, auth), fields(leave_id = %id))]
    pub async fn cancel(&self, auth: &AuthUser, id: Uuid) -> Result<leave_request::Model, ServiceError> {
        let existing = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;

        if existing.employee_id != employee.id {
            return Err(ServiceError::Forbidden(
                "You can only cancel your own leave requests".to_string(),
            ));
        }
        if existing.status == "rejected" || existing.status == "cancelled" {
            return Err(ServiceError::BadRequest(format!(
                "Leave request is already {}",
                existing.status
            )));
        }
        let today = Utc::now().naive_utc().date();
        if existing.status == "approved" && existing.start_date <= today {
            return Err(ServiceError::BadRequest(
                "Cannot cancel past approved leaves".to_string(),
            ));
        }

        let mut active: leave_request::ActiveModel = existing.into();
        active.status = Set("cancelled".to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender.send(Event::LeaveCancelled { leave_id: id }).await?;
        }
        Ok(model)
    }

    /// Approve or reject a pending request. HR and admin can review anyone;
    /// managers only their direct reports.
    #[instrument(skip(self, auth, action), fields(leave_id = %id))]
    pub async fn review(
        &self,
        auth: &AuthUser,
        id: Uuid,
        action: LeaveActionRequest,
    ) -> Result<(leave_request::Model, String), ServiceError> {
        if action.action != "approve" && action.action != "reject" {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid action: {}",
                action.action
            )));
        }

        let existing = self.load(id).await?;
        if existing.status != "pending" {
            return Err(ServiceError::BadRequest(
                "Only pending leave requests can be reviewed".to_string(),
            ));
        }

        let reviewer = employee_for_user(self.db.as_ref(), auth)
            .await
            .map_err(|_| ServiceError::NotFound("Reviewer profile".to_string()))?;

        if !auth.is_people_ops() {
            let owner = employee::Entity::find_by_id(existing.employee_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;
            let is_direct_report =
                auth.has_role("manager") && owner.manager_id == Some(reviewer.id);
            if !is_direct_report {
                return Err(ServiceError::Forbidden(
                    "You don't have permission to review this leave request".to_string(),
                ));
            }
        }

        let new_status = if action.action == "approve" {
            "approved"
        } else {
            "rejected"
        };
        let now = Utc::now().naive_utc();
        let mut active: leave_request::ActiveModel = existing.into();
        active.status = Set(new_status.to_string());
        active.reviewed_by = Set(Some(reviewer.id));
        active.reviewed_at = Set(Some(now));
        active.review_note = Set(action.note);
        active.updated_at = Set(now);
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            let event = if new_status == "approved" {
                Event::LeaveApproved {
                    leave_id: id,
                    reviewer_id: reviewer.id,
                }
            } else {
                Event::LeaveRejected {
                    leave_id: id,
                    reviewer_id: reviewer.id,
                }
            };
            sender.send(event).await?;
        }

        let message = format!("Leave request {}d successfully", action.action);
        info!(leave_id = %id, status = new_status, "leave reviewed");
        Ok((model, message))
    }

    /// Leave balance for the current year. Annual entitlement depends on
    /// tenure; sick and personal are flat allowances.
    #[instrument(skip(self, auth))]
    pub async fn balance(
        &self,
        auth: &AuthUser,
        employee_id: Option<Uuid>,
    ) -> Result<LeaveBalance, ServiceError> {
        let target = match employee_id {
            None => employee_for_user(self.db.as_ref(), auth).await?,
            Some(id) => {
                let target = employee::Entity::find_by_id(id)
                    .one(self.db.as_ref())
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;
                if !can_view_employee(auth, auth.employee_id, &target) {
                    return Err(ServiceError::Forbidden(
                        "You don't have permission to view this employee's leave balance"
                            .to_string(),
                    ));
                }
                target
            }
        };

        let today = Utc::now().naive_utc().date();
        let year = today.year();
        let year_start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| ServiceError::InternalError("invalid year".to_string()))?;
        let year_end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| ServiceError::InternalError("invalid year".to_string()))?;

        let requests = leave_request::Entity::find()
            .filter(leave_request::Column::EmployeeId.eq(target.id))
            .filter(leave_request::Column::StartDate.lte(year_end))
            .filter(leave_request::Column::EndDate.gte(year_start))
            .filter(
                Condition::any()
                    .add(leave_request::Column::Status.eq("approved"))
                    .add(leave_request::Column::Status.eq("pending")),
            )
            .all(self.db.as_ref())
            .await?;

        let taken = |leave_type: &str| -> f64 {
            requests
                .iter()
                .filter(|r| r.leave_type == leave_type && r.status == "approved")
                .map(|r| r.days)
                .sum()
        };
        let pending_annual: f64 = requests
            .iter()
            .filter(|r| r.leave_type == "annual" && r.status == "pending")
            .map(|r| r.days)
            .sum();

        let annual_entitled = annual_entitlement(target.date_of_joining, today);
        let annual_taken = taken("annual");
        let sick_taken = taken("sick");
        let personal_taken = taken("personal");

        Ok(LeaveBalance {
            year,
            annual: LeaveTypeBalance {
                entitled: annual_entitled,
                taken: annual_taken,
                pending: pending_annual,
                remaining: annual_entitled - annual_taken - pending_annual,
            },
            sick: LeaveTypeBalance {
                entitled: 15.0,
                taken: sick_taken,
                pending: 0.0,
                remaining: 15.0 - sick_taken,
            },
            personal: LeaveTypeBalance {
                entitled: 3.0,
                taken: personal_taken,
                pending: 0.0,
                remaining: 3.0 - personal_taken,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn entitlement_grows_with_tenure() {
        // Hired less than a year ago
        assert_eq!(
            annual_entitlement(date(2024, 1, 15), date(2024, 6, 1)),
            20.0
        );
        // Five full years
        assert_eq!(
            annual_entitlement(date(2019, 1, 15), date(2024, 6, 1)),
            25.0
        );
        // Anniversary not yet reached this year
        assert_eq!(
            annual_entitlement(date(2019, 9, 15), date(2024, 6, 1)),
            24.0
        );
        // Capped at 30
        assert_eq!(
            annual_entitlement(date(2000, 1, 15), date(2024, 6, 1)),
            30.0
        );
    }

    #[test]
    fn leave_type_validation() {
        assert!(validate_leave_type("annual").is_ok());
        assert!(validate_leave_type("bereavement").is_ok());
        assert!(validate_leave_type("sabbatical").is_err());
    }
}
