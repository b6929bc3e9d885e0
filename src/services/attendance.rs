use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{attendance, employee};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{can_view_employee, employee_for_user, paginate, parse_date};

/// Clock-ins at or after this time count as late for punctuality stats.
const ON_TIME_CUTOFF: (u32, u32) = (9, 30);

#[derive(Clone)]
pub struct AttendanceService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ClockInRequest {
    /// office, home, or remote. Defaults to office.
    pub work_from: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ClockOutRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RecordRequest {
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub clock_in: Option<chrono::NaiveDateTime>,
    pub clock_out: Option<chrono::NaiveDateTime>,
    pub status: Option<String>,
    pub work_from: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct RecordUpdateRequest {
    pub clock_in: Option<chrono::NaiveDateTime>,
    pub clock_out: Option<chrono::NaiveDateTime>,
    pub status: Option<String>,
    pub work_from: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttendanceRecord {
    #[serde(flatten)]
    pub record: attendance::Model,
    pub hours_worked: Option<f64>,
}

impl From<attendance::Model> for AttendanceRecord {
    fn from(record: attendance::Model) -> Self {
        let hours_worked = record.hours_worked();
        AttendanceRecord {
            record,
            hours_worked,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodayStatus {
    /// not_started, in_progress, or completed
    pub status: String,
    pub clock_in: Option<chrono::NaiveDateTime>,
    pub clock_out: Option<chrono::NaiveDateTime>,
    pub work_from: Option<String>,
    pub hours_worked: Option<f64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttendanceReport {
    pub period: ReportPeriod,
    pub attendance: AttendanceCounts,
    pub work_hours: WorkHours,
    pub location: LocationDays,
    pub punctuality: Punctuality,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub working_days: u32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttendanceCounts {
    pub present: u32,
    pub absent: u32,
    pub half_day: u32,
    pub unrecorded: u32,
    pub attendance_rate: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WorkHours {
    pub total: f64,
    pub average: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LocationDays {
    pub office: u32,
    pub home: u32,
    pub remote: u32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Punctuality {
    pub on_time: u32,
    pub late: u32,
    pub punctuality_rate: f64,
}

fn validate_work_from(value: &str) -> Result<(), ServiceError> {
    match value {
        "office" | "home" | "remote" => Ok(()),
        other => Err(ServiceError::InvalidInput(format!(
            "Invalid work location: {}",
            other
        ))),
    }
}

fn validate_status(value: &str) -> Result<(), ServiceError> {
    match value {
        "present" | "absent" | "half-day" => Ok(()),
        other => Err(ServiceError::InvalidStatus(other.to_string())),
    }
}

/// Percentage of working days attended, counting half days at half weight.
pub(crate) fn attendance_rate(present: u32, half_day: u32, working_days: u32) -> f64 {
    if working_days == 0 {
        return 0.0;
    }
    let attended = present as f64 + half_day as f64 * 0.5;
    (attended / working_days as f64 * 100.0 * 100.0).round() / 100.0
}

impl AttendanceService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        AttendanceService { db, event_sender }
    }

    async fn today_record(
        &self,
        employee_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<attendance::Model>, ServiceError> {
        Ok(attendance::Entity::find()
            .filter(attendance::Column::EmployeeId.eq(employee_id))
            .filter(attendance::Column::Date.eq(today))
            .one(self.db.as_ref())
            .await?)
    }

    #[instrument(skip(self, auth, request))]
    pub async fn clock_in(
        &self,
        auth: &AuthUser,
        request: ClockInRequest,
    ) -> Result<AttendanceRecord, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let now = Utc::now().naive_utc();
        let today = now.date();

        let work_from = request.work_from.unwrap_or_else(|| "office".to_string());
        validate_work_from(&work_from)?;

        let record = match self.today_record(employee.id, today).await? {
            Some(existing) if existing.clock_in.is_some() => {
                return Err(ServiceError::BadRequest(
                    "Already clocked in today".to_string(),
                ));
            }
            Some(existing) => {
                let mut active: attendance::ActiveModel = existing.into();
                active.clock_in = Set(Some(now));
                active.work_from = Set(work_from);
                if let Some(notes) = request.notes {
                    active.notes = Set(Some(notes));
                }
                active.updated_at = Set(now);
                active.update(self.db.as_ref()).await?
            }
            None => {
                attendance::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    employee_id: Set(employee.id),
                    date: Set(today),
                    clock_in: Set(Some(now)),
                    clock_out: Set(None),
                    status: Set("present".to_string()),
                    work_from: Set(work_from),
                    notes: Set(request.notes),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(self.db.as_ref())
                .await?
            }
        };

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::ClockedIn {
                    employee_id: employee.id,
                    date: today,
                })
                .await?;
        }
        info!(employee_id = %employee.id, "clocked in");
        Ok(record.into())
    }

    #[instrument(skip(self, auth, request))]
    pub async fn clock_out(
        &self,
        auth: &AuthUser,
        request: ClockOutRequest,
    ) -> Result<AttendanceRecord, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let now = Utc::now().naive_utc();
        let today = now.date();

        let existing = self
            .today_record(employee.id, today)
            .await?
            .filter(|r| r.clock_in.is_some())
            .ok_or_else(|| ServiceError::BadRequest("Not yet clocked in today".to_string()))?;

        if existing.clock_out.is_some() {
            return Err(ServiceError::BadRequest(
                "Already clocked out today".to_string(),
            ));
        }

        let merged_notes = match (&existing.notes, &request.notes) {
            (Some(old), Some(new)) => Some(format!("{}\n{}", old, new)),
            (None, Some(new)) => Some(new.clone()),
            (old, None) => old.clone(),
        };

        let mut active: attendance::ActiveModel = existing.into();
        active.clock_out = Set(Some(now));
        active.notes = Set(merged_notes);
        active.updated_at = Set(now);
        let record = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::ClockedOut {
                    employee_id: employee.id,
                    date: today,
                })
                .await?;
        }
        Ok(record.into())
    }

    pub async fn today_status(&self, auth: &AuthUser) -> Result<TodayStatus, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let today = Utc::now().naive_utc().date();

        Ok(match self.today_record(employee.id, today).await? {
            None => TodayStatus {
                status: "not_started".to_string(),
                clock_in: None,
                clock_out: None,
                work_from: None,
                hours_worked: None,
            },
            Some(record) => {
                let status = if record.clock_out.is_some() {
                    "completed"
                } else if record.clock_in.is_some() {
                    "in_progress"
                } else {
                    "not_started"
                };
                TodayStatus {
                    status: status.to_string(),
                    clock_in: record.clock_in,
                    clock_out: record.clock_out,
                    work_from: Some(record.work_from.clone()),
                    hours_worked: record.hours_worked(),
                }
            }
        })
    }

    /// Resolve which employee's records the caller may read.
    async fn resolve_target(
        &self,
        auth: &AuthUser,
        employee_id: Option<Uuid>,
    ) -> Result<employee::Model, ServiceError> {
        match employee_id {
            None => employee_for_user(self.db.as_ref(), auth).await,
            Some(id) => {
                let target = employee::Entity::find_by_id(id)
                    .one(self.db.as_ref())
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;
                if !can_view_employee(auth, auth.employee_id, &target) {
                    return Err(ServiceError::Forbidden(
                        "You don't have permission to view this employee's attendance".to_string(),
                    ));
                }
                Ok(target)
            }
        }
    }

    #[instrument(skip(self, auth, query))]
    pub async fn history(
        &self,
        auth: &AuthUser,
        query: HistoryQuery,
    ) -> Result<PaginatedResponse<AttendanceRecord>, ServiceError> {
        let target = self.resolve_target(auth, query.employee_id).await?;
        let (page, limit) = paginate(query.page, query.limit);

        let today = Utc::now().naive_utc().date();
        let start = match query.start_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => today.with_day(1).unwrap_or(today),
        };
        let end = match query.end_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => today,
        };

        let paginator = attendance::Entity::find()
            .filter(attendance::Column::EmployeeId.eq(target.id))
            .filter(attendance::Column::Date.gte(start))
            .filter(attendance::Column::Date.lte(end))
            .order_by_desc(attendance::Column::Date)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(AttendanceRecord::from)
            .collect();

        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    // Manual record management for HR.

    #[instrument(skip(self, request))]
    pub async fn create_record(
        &self,
        request: RecordRequest,
    ) -> Result<AttendanceRecord, ServiceError> {
        let employee = employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        if self.today_record(employee.id, request.date).await?.is_some() {
            return Err(ServiceError::BadRequest(format!(
                "Attendance record already exists for {}",
                request.date
            )));
        }

        let status = request.status.unwrap_or_else(|| "present".to_string());
        validate_status(&status)?;
        let work_from = request.work_from.unwrap_or_else(|| "office".to_string());
        validate_work_from(&work_from)?;

        let now = Utc::now().naive_utc();
        let record = attendance::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(employee.id),
            date: Set(request.date),
            clock_in: Set(request.clock_in),
            clock_out: Set(request.clock_out),
            status: Set(status),
            work_from: Set(work_from),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        Ok(record.into())
    }

    #[instrument(skip(self, request), fields(record_id = %id))]
    pub async fn update_record(
        &self,
        id: Uuid,
        request: RecordUpdateRequest,
    ) -> Result<AttendanceRecord, ServiceError> {
        let existing = attendance::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Attendance record".to_string()))?;

        let mut active: attendance::ActiveModel = existing.into();
        if let Some(clock_in) = request.clock_in {
            active.clock_in = Set(Some(clock_in));
        }
        if let Some(clock_out) = request.clock_out {
            active.clock_out = Set(Some(clock_out));
        }
        if let Some(status) = request.status {
            validate_status(&status)?;
            active.status = Set(status);
        }
        if let Some(work_from) = request.work_from {
            validate_work_from(&work_from)?;
            active.work_from = Set(work_from);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(self.db.as_ref()).await?.into())
    }

    pub async fn delete_record(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = attendance::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Attendance record".to_string()))?;
        attendance::Entity::delete_by_id(existing.id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Per-employee attendance statistics over a date range, defaulting to
    /// the last 30 days.
    #[instrument(skip(self, auth))]
    pub async fn report(
        &self,
        auth: &AuthUser,
        employee_id: Option<Uuid>,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<AttendanceReport, ServiceError> {
        let target = self.resolve_target(auth, employee_id).await?;

        let today = Utc::now().naive_utc().date();
        let end = match end_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => today,
        };
        let start = match start_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => end - Duration::days(30),
        };

        let records = attendance::Entity::find()
            .filter(attendance::Column::EmployeeId.eq(target.id))
            .filter(attendance::Column::Date.gte(start))
            .filter(attendance::Column::Date.lte(end))
            .all(self.db.as_ref())
            .await?;

        let mut working_days = 0u32;
        let mut working_dates = HashSet::new();
        let mut day = start;
        while day <= end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                working_days += 1;
                working_dates.insert(day);
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        let mut present = 0u32;
        let mut absent = 0u32;
        let mut half_day = 0u32;
        let mut office = 0u32;
        let mut home = 0u32;
        let mut remote = 0u32;
        let mut on_time = 0u32;
        let mut late = 0u32;
        let mut total_hours = 0.0;
        let mut hours_count = 0u32;
        let cutoff = NaiveTime::from_hms_opt(ON_TIME_CUTOFF.0, ON_TIME_CUTOFF.1, 0)
            .unwrap_or(NaiveTime::MIN);

        for record in &records {
            working_dates.remove(&record.date);
            match record.status.as_str() {
                "present" => present += 1,
                "absent" => absent += 1,
                "half-day" => half_day += 1,
                _ => {}
            }
            match record.work_from.as_str() {
                "home" => home += 1,
                "remote" => remote += 1,
                _ => office += 1,
            }
            if let Some(hours) = record.hours_worked() {
                total_hours += hours;
                hours_count += 1;
            }
            if record.status == "present" {
                if let Some(clock_in) = record.clock_in {
                    if clock_in.time() < cutoff {
                        on_time += 1;
                    } else {
                        late += 1;
                    }
                }
            }
        }

        let unrecorded = working_dates.len() as u32;
        let average = if hours_count > 0 {
            (total_hours / hours_count as f64 * 100.0).round() / 100.0
        } else {
            0.0
        };
        let punctuality_rate = if present > 0 {
            (on_time as f64 / present as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(AttendanceReport {
            period: ReportPeriod {
                start_date: start,
                end_date: end,
                working_days,
            },
            attendance: AttendanceCounts {
                present,
                absent,
                half_day,
                unrecorded,
                attendance_rate: attendance_rate(present, half_day, working_days),
            },
            work_hours: WorkHours {
                total: (total_hours * 100.0).round() / 100.0,
                average,
            },
            location: LocationDays {
                office,
                home,
                remote,
            },
            punctuality: Punctuality {
                on_time,
                late,
                punctuality_rate,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_rate_weights_half_days() {
        assert_eq!(attendance_rate(18, 2, 20), 95.0);
        assert_eq!(attendance_rate(0, 0, 20), 0.0);
        assert_eq!(attendance_rate(5, 0, 0), 0.0);
    }

    #[test]
    fn work_location_validation() {
        assert!(validate_work_from("office").is_ok());
        assert!(validate_work_from("home").is_ok());
        assert!(validate_work_from("remote").is_ok());
        assert!(validate_work_from("beach").is_err());
    }

    #[test]
    fn status_validation() {
        assert!(validate_status("present").is_ok());
        assert!(validate_status("half-day").is_ok());
        assert!(validate_status("vacation").is_err());
    }
}
