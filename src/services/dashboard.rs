use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{
    attendance, employee, leave_request, project, project_member, task,
};
use crate::errors::ServiceError;

use super::{business_days_between, employee_for_user};

use crate::services::leave::LEAVE_STATUSES;
use crate::services::projects::PROJECT_STATUSES;
use crate::services::tasks::{TASK_PRIORITIES, TASK_STATUSES};

/// Role-shaped aggregates for the landing page. The payload differs per
/// role, so the service returns structured JSON rather than one DTO.
#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DbPool>,
}

fn zeroed_counts(keys: &[&str]) -> HashMap<String, u64> {
    keys.iter().map(|k| (k.to_string(), 0)).collect()
}

fn count_by<'a, I>(keys: &[&str], values: I) -> HashMap<String, u64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = zeroed_counts(keys);
    for value in values {
        if let Some(entry) = counts.get_mut(value) {
            *entry += 1;
        }
    }
    counts
}

pub(crate) fn completion_rate(counts: &HashMap<String, u64>) -> f64 {
    let total: u64 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let completed = counts.get("completed").copied().unwrap_or(0);
    (completed as f64 / total as f64 * 10_000.0).round() / 100.0
}

pub(crate) fn avg_attendance_rate(present: &[u64], absent: &[u64], half: &[u64]) -> f64 {
    let mut rates = Vec::new();
    for ((p, a), h) in present.iter().zip(absent).zip(half) {
        let total = p + a + h;
        if total > 0 {
            rates.push((*p as f64 + *h as f64 * 0.5) / total as f64 * 100.0);
        }
    }
    if rates.is_empty() {
        return 0.0;
    }
    ((rates.iter().sum::<f64>() / rates.len() as f64) * 100.0).round() / 100.0
}

impl DashboardService {
    pub fn new(db: Arc<DbPool>) -> Self {
        DashboardService { db }
    }

    async fn team_ids(&self, manager_employee_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let reports = employee::Entity::find()
            .filter(employee::Column::ManagerId.eq(manager_employee_id))
            .all(self.db.as_ref())
            .await?;
        let mut ids: Vec<Uuid> = reports.into_iter().map(|e| e.id).collect();
        ids.push(manager_employee_id);
        Ok(ids)
    }

    async fn member_project_ids(&self, employee_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let memberships = project_member::Entity::find()
            .filter(project_member::Column::EmployeeId.eq(employee_id))
            .all(self.db.as_ref())
            .await?;
        Ok(memberships.into_iter().map(|m| m.project_id).collect())
    }

    #[instrument(skip(self, auth))]
    pub async fn overview(&self, auth: &AuthUser) -> Result<Value, ServiceError> {
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        if auth.is_people_ops() {
            self.admin_overview().await
        } else if auth.has_role("manager") {
            self.manager_overview(own.id).await
        } else {
            self.employee_overview(own.id).await
        }
    }

    async fn admin_overview(&self) -> Result<Value, ServiceError> {
        let today = Utc::now().naive_utc().date();
        let month_start = today.with_day(1).unwrap_or(today);

        let total_employees = employee::Entity::find().count(self.db.as_ref()).await?;
        let present_today = attendance::Entity::find()
            .filter(attendance::Column::Date.eq(today))
            .filter(attendance::Column::Status.eq("present"))
            .count(self.db.as_ref())
            .await?;
        let absent_today = attendance::Entity::find()
            .filter(attendance::Column::Date.eq(today))
            .filter(attendance::Column::Status.eq("absent"))
            .count(self.db.as_ref())
            .await?;
        let on_leave_today = leave_request::Entity::find()
            .filter(leave_request::Column::StartDate.lte(today))
            .filter(leave_request::Column::EndDate.gte(today))
            .filter(leave_request::Column::Status.eq("approved"))
            .count(self.db.as_ref())
            .await?;

        let month_leaves = leave_request::Entity::find()
            .filter(leave_request::Column::StartDate.gte(month_start))
            .all(self.db.as_ref())
            .await?;
        let leave_stats = count_by(
            LEAVE_STATUSES,
            month_leaves.iter().map(|l| l.status.as_str()),
        );

        let projects = project::Entity::find().all(self.db.as_ref()).await?;
        let project_stats = count_by(
            PROJECT_STATUSES,
            projects.iter().map(|p| p.status.as_str()),
        );

        let tasks = task::Entity::find().all(self.db.as_ref()).await?;
        let task_stats = count_by(TASK_STATUSES, tasks.iter().map(|t| t.status.as_str()));
        let overdue_tasks = tasks
            .iter()
            .filter(|t| t.status != "completed" && t.due_date.is_some_and(|d| d < today))
            .count();

        let recent_joins = employee::Entity::find()
            .order_by_desc(employee::Column::DateOfJoining)
            .limit(5)
            .all(self.db.as_ref())
            .await?;

        let mut birthdays: Vec<&employee::Model> = Vec::new();
        let all_employees = employee::Entity::find().all(self.db.as_ref()).await?;
        for emp in &all_employees {
            if let Some(dob) = emp.date_of_birth {
                if dob.month() == today.month() && dob.day() >= today.day() {
                    birthdays.push(emp);
                }
            }
        }
        birthdays.sort_by_key(|e| e.date_of_birth.map(|d| d.day()).unwrap_or(32));
        birthdays.truncate(5);

        let upcoming_deadlines = project::Entity::find()
            .filter(project::Column::EndDate.gte(today))
            .filter(project::Column::EndDate.lte(today + Duration::days(7)))
            .order_by_asc(project::Column::EndDate)
            .limit(5)
            .all(self.db.as_ref())
            .await?;

        let pending = leave_request::Entity::find()
            .filter(leave_request::Column::Status.eq("pending"))
            .order_by_desc(leave_request::Column::CreatedAt)
            .limit(10)
            .all(self.db.as_ref())
            .await?;
        let pending_requests = self.leave_summaries(&pending).await?;

        Ok(json!({
            "overview": {
                "total_employees": total_employees,
                "present_today": present_today,
                "absent_today": absent_today,
                "on_leave_today": on_leave_today,
                "pending_leaves": leave_stats.get("pending").copied().unwrap_or(0),
                "active_projects": project_stats.get("in_progress").copied().unwrap_or(0),
                "completed_tasks": task_stats.get("completed").copied().unwrap_or(0),
                "overdue_tasks": overdue_tasks,
            },
            "employees": {
                "recent_joins": recent_joins.iter().map(employee_summary).collect::<Vec<_>>(),
                "upcoming_birthdays": birthdays.iter().map(|e| employee_summary(e)).collect::<Vec<_>>(),
            },
            "projects": {
                "upcoming_deadlines": upcoming_deadlines.iter().map(project_summary).collect::<Vec<_>>(),
                "by_status": project_stats,
            },
            "tasks": { "by_status": task_stats },
            "leaves": {
                "by_status": leave_stats,
                "pending_requests": pending_requests,
            },
        }))
    }

    async fn manager_overview(&self, manager_id: Uuid) -> Result<Value, ServiceError> {
        let today = Utc::now().naive_utc().date();
        let team_members = employee::Entity::find()
            .filter(employee::Column::ManagerId.eq(manager_id))
            .all(self.db.as_ref())
            .await?;
        let mut team_ids: Vec<Uuid> = team_members.iter().map(|e| e.id).collect();
        team_ids.push(manager_id);

        let present_today = attendance::Entity::find()
            .filter(attendance::Column::Date.eq(today))
            .filter(attendance::Column::Status.eq("present"))
            .filter(attendance::Column::EmployeeId.is_in(team_ids.clone()))
            .count(self.db.as_ref())
            .await?;
        let on_leave_today = leave_request::Entity::find()
            .filter(leave_request::Column::StartDate.lte(today))
            .filter(leave_request::Column::EndDate.gte(today))
            .filter(leave_request::Column::Status.eq("approved"))
            .filter(leave_request::Column::EmployeeId.is_in(team_ids.clone()))
            .count(self.db.as_ref())
            .await?;

        let project_ids = self.member_project_ids(manager_id).await?;
        let pending_tasks = task::Entity::find()
            .filter(task::Column::ProjectId.is_in(project_ids.clone()))
            .filter(task::Column::Status.ne("completed"))
            .count(self.db.as_ref())
            .await?;

        let team_tasks = task::Entity::find()
            .filter(task::Column::AssigneeId.is_in(team_ids.clone()))
            .all(self.db.as_ref())
            .await?;
        let task_stats = count_by(TASK_STATUSES, team_tasks.iter().map(|t| t.status.as_str()));

        let pending = leave_request::Entity::find()
            .filter(leave_request::Column::EmployeeId.is_in(team_ids))
            .filter(leave_request::Column::Status.eq("pending"))
            .order_by_desc(leave_request::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        let pending_requests = self.leave_summaries(&pending).await?;

        let team_projects = project::Entity::find()
            .filter(project::Column::Id.is_in(project_ids))
            .order_by_asc(project::Column::EndDate)
            .limit(5)
            .all(self.db.as_ref())
            .await?;

        Ok(json!({
            "overview": {
                "team_size": team_members.len(),
                "present_today": present_today,
                "on_leave_today": on_leave_today,
                "pending_tasks": pending_tasks,
                "team_task_completion_rate": completion_rate(&task_stats),
                "pending_leave_requests": pending.len(),
            },
            "team": {
                "members": team_members.iter().map(employee_summary).collect::<Vec<_>>(),
            },
            "tasks": {
                "by_status": task_stats,
                "total": team_tasks.len(),
            },
            "projects": {
                "active": team_projects.iter().map(project_summary).collect::<Vec<_>>(),
            },
            "leaves": { "pending_requests": pending_requests },
        }))
    }

    async fn employee_overview(&self, employee_id: Uuid) -> Result<Value, ServiceError> {
        let today = Utc::now().naive_utc().date();
        let month_start = today.with_day(1).unwrap_or(today);

        let today_attendance = attendance::Entity::find()
            .filter(attendance::Column::EmployeeId.eq(employee_id))
            .filter(attendance::Column::Date.eq(today))
            .one(self.db.as_ref())
            .await?;

        let month_attendance = attendance::Entity::find()
            .filter(attendance::Column::EmployeeId.eq(employee_id))
            .filter(attendance::Column::Date.gte(month_start))
            .filter(attendance::Column::Date.lte(today))
            .all(self.db.as_ref())
            .await?;
        let present_days = month_attendance.iter().filter(|a| a.status == "present").count() as u32;
        let absent_days = month_attendance.iter().filter(|a| a.status == "absent").count() as u32;
        let half_days = month_attendance.iter().filter(|a| a.status == "half-day").count() as u32;
        let business_days = business_days_between(month_start, today);
        let attendance_rate = if business_days > 0 {
            ((present_days as f64 + half_days as f64 * 0.5) / business_days as f64 * 10_000.0)
                .round()
                / 100.0
        } else {
            0.0
        };

        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let approved = leave_request::Entity::find()
            .filter(leave_request::Column::EmployeeId.eq(employee_id))
            .filter(leave_request::Column::Status.eq("approved"))
            .filter(leave_request::Column::StartDate.gte(year_start))
            .all(self.db.as_ref())
            .await?;
        let leave_taken: f64 = approved.iter().map(|l| l.days).sum();

        let my_tasks = task::Entity::find()
            .filter(task::Column::AssigneeId.eq(employee_id))
            .all(self.db.as_ref())
            .await?;
        let task_counts = count_by(TASK_STATUSES, my_tasks.iter().map(|t| t.status.as_str()));

        let mut deadlines: Vec<&task::Model> = my_tasks
            .iter()
            .filter(|t| {
                t.status != "completed"
                    && t.due_date
                        .is_some_and(|d| d >= today && d <= today + Duration::days(7))
            })
            .collect();
        deadlines.sort_by_key(|t| t.due_date);

        let mut deadline_items = Vec::with_capacity(deadlines.len());
        for t in deadlines {
            let project_name = project::Entity::find_by_id(t.project_id)
                .one(self.db.as_ref())
                .await?
                .map(|p| p.name)
                .unwrap_or_default();
            deadline_items.push(json!({
                "id": t.id,
                "title": t.title,
                "project_name": project_name,
                "priority": t.priority,
                "due_date": t.due_date,
                "progress": t.progress,
            }));
        }

        let project_ids = self.member_project_ids(employee_id).await?;
        let my_projects = project::Entity::find()
            .filter(project::Column::Id.is_in(project_ids))
            .all(self.db.as_ref())
            .await?;
        let mut project_items = Vec::with_capacity(my_projects.len());
        for p in &my_projects {
            let my_tasks_count = task::Entity::find()
                .filter(task::Column::ProjectId.eq(p.id))
                .filter(task::Column::AssigneeId.eq(employee_id))
                .count(self.db.as_ref())
                .await?;
            project_items.push(json!({
                "id": p.id,
                "name": p.name,
                "status": p.status,
                "my_tasks_count": my_tasks_count,
            }));
        }

        let recent_leaves = leave_request::Entity::find()
            .filter(leave_request::Column::EmployeeId.eq(employee_id))
            .order_by_desc(leave_request::Column::CreatedAt)
            .limit(5)
            .all(self.db.as_ref())
            .await?;

        Ok(json!({
            "attendance": {
                "today": {
                    "status": today_attendance.as_ref().map(|a| a.status.clone()).unwrap_or_else(|| "not_recorded".to_string()),
                    "clock_in": today_attendance.as_ref().and_then(|a| a.clock_in),
                    "clock_out": today_attendance.as_ref().and_then(|a| a.clock_out),
                    "hours_worked": today_attendance.as_ref().and_then(|a| a.hours_worked()).unwrap_or(0.0),
                },
                "monthly": {
                    "present_days": present_days,
                    "absent_days": absent_days,
                    "half_days": half_days,
                    "not_recorded": business_days.saturating_sub(present_days + absent_days + half_days),
                    "attendance_rate": attendance_rate,
                },
            },
            "leaves": {
                "taken_this_year": leave_taken,
                "recent_requests": recent_leaves.iter().map(|l| json!({
                    "id": l.id,
                    "start_date": l.start_date,
                    "end_date": l.end_date,
                    "days": l.days,
                    "leave_type": l.leave_type,
                    "status": l.status,
                    "created_at": l.created_at,
                })).collect::<Vec<_>>(),
            },
            "tasks": {
                "by_status": task_counts,
                "total": my_tasks.len(),
                "upcoming_deadlines": deadline_items,
            },
            "projects": {
                "count": my_projects.len(),
                "list": project_items,
            },
        }))
    }

    /// Task counts sliced the way the landing page charts want them.
    #[instrument(skip(self, auth))]
    pub async fn task_stats(&self, auth: &AuthUser) -> Result<Value, ServiceError> {
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let today = Utc::now().naive_utc().date();

        if auth.is_people_ops() {
            let tasks = task::Entity::find().all(self.db.as_ref()).await?;
            let status_stats = count_by(TASK_STATUSES, tasks.iter().map(|t| t.status.as_str()));
            let priority_stats =
                count_by(TASK_PRIORITIES, tasks.iter().map(|t| t.priority.as_str()));
            let overdue = tasks
                .iter()
                .filter(|t| t.status != "completed" && t.due_date.is_some_and(|d| d < today))
                .count();
            let week_ago = (today - Duration::days(7)).and_hms_opt(0, 0, 0);
            let recently_completed = tasks
                .iter()
                .filter(|t| {
                    t.status == "completed"
                        && t.completed_at
                            .zip(week_ago)
                            .is_some_and(|(done, cutoff)| done >= cutoff)
                })
                .count();

            Ok(json!({
                "by_priority": priority_stats,
                "by_status": status_stats.clone(),
                "total": tasks.len(),
                "overdue": overdue,
                "recently_completed": recently_completed,
                "completion_rate": completion_rate(&status_stats),
            }))
        } else {
            let tasks = task::Entity::find()
                .filter(task::Column::AssigneeId.eq(own.id))
                .all(self.db.as_ref())
                .await?;
            let status_stats = count_by(TASK_STATUSES, tasks.iter().map(|t| t.status.as_str()));
            let priority_stats =
                count_by(TASK_PRIORITIES, tasks.iter().map(|t| t.priority.as_str()));
            let overdue = tasks
                .iter()
                .filter(|t| t.status != "completed" && t.due_date.is_some_and(|d| d < today))
                .count();

            let mut deadlines: Vec<&task::Model> = tasks
                .iter()
                .filter(|t| {
                    t.status != "completed"
                        && t.due_date
                            .is_some_and(|d| d >= today && d <= today + Duration::days(7))
                })
                .collect();
            deadlines.sort_by_key(|t| t.due_date);
            let mut deadline_items = Vec::with_capacity(deadlines.len());
            for t in deadlines {
                let project_name = project::Entity::find_by_id(t.project_id)
                    .one(self.db.as_ref())
                    .await?
                    .map(|p| p.name)
                    .unwrap_or_default();
                deadline_items.push(json!({
                    "id": t.id,
                    "title": t.title,
                    "project_name": project_name,
                    "project_id": t.project_id,
                    "priority": t.priority,
                    "due_date": t.due_date,
                    "progress": t.progress,
                }));
            }

            Ok(json!({
                "by_priority": priority_stats,
                "by_status": status_stats.clone(),
                "total": tasks.len(),
                "overdue": overdue,
                "completion_rate": completion_rate(&status_stats),
                "upcoming_deadlines": deadline_items,
            }))
        }
    }

    #[instrument(skip(self, auth))]
    pub async fn project_stats(&self, auth: &AuthUser) -> Result<Value, ServiceError> {
        let own = employee_for_user(self.db.as_ref(), auth).await?;

        let projects = if auth.is_people_ops() {
            project::Entity::find().all(self.db.as_ref()).await?
        } else {
            let mut ids = self.member_project_ids(own.id).await?;
            let created = project::Entity::find()
                .filter(project::Column::CreatedBy.eq(own.id))
                .all(self.db.as_ref())
                .await?;
            ids.extend(created.iter().map(|p| p.id));
            ids.sort();
            ids.dedup();
            project::Entity::find()
                .filter(project::Column::Id.is_in(ids))
                .all(self.db.as_ref())
                .await?
        };

        let status_counts = count_by(
            PROJECT_STATUSES,
            projects.iter().map(|p| p.status.as_str()),
        );

        let mut items = Vec::with_capacity(projects.len());
        for p in &projects {
            let total_tasks = task::Entity::find()
                .filter(task::Column::ProjectId.eq(p.id))
                .count(self.db.as_ref())
                .await?;
            let completed_tasks = task::Entity::find()
                .filter(task::Column::ProjectId.eq(p.id))
                .filter(task::Column::Status.eq("completed"))
                .count(self.db.as_ref())
                .await?;
            let members_count = project_member::Entity::find()
                .filter(project_member::Column::ProjectId.eq(p.id))
                .count(self.db.as_ref())
                .await?;
            let rate = if total_tasks > 0 {
                (completed_tasks as f64 / total_tasks as f64 * 10_000.0).round() / 100.0
            } else {
                0.0
            };
            items.push((
                p.end_date,
                json!({
                    "id": p.id,
                    "name": p.name,
                    "status": p.status,
                    "start_date": p.start_date,
                    "end_date": p.end_date,
                    "task_count": total_tasks,
                    "completion_rate": rate,
                    "members_count": members_count,
                }),
            ));
        }
        // Closest deadline first, undated projects last.
        items.sort_by_key(|(end, _)| end.unwrap_or(NaiveDate::MAX));
        let top: Vec<Value> = items.into_iter().take(10).map(|(_, v)| v).collect();

        Ok(json!({
            "by_status": status_counts,
            "total": projects.len(),
            "projects": top,
        }))
    }

    /// Attendance chart series for the day, week, or month views.
    #[instrument(skip(self, auth))]
    pub async fn attendance_stats(
        &self,
        auth: &AuthUser,
        period: Option<String>,
    ) -> Result<Value, ServiceError> {
        let period = period.unwrap_or_else(|| "day".to_string());
        if !["day", "week", "month"].contains(&period.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid period: {}",
                period
            )));
        }
        let today = Utc::now().naive_utc().date();

        let dates: Vec<NaiveDate> = match period.as_str() {
            "week" => (0..7).map(|i| today - Duration::days(6 - i)).collect(),
            "month" => {
                let start = today.with_day(1).unwrap_or(today);
                let mut d = start;
                let mut range = Vec::new();
                while d.month() == start.month() {
                    range.push(d);
                    d += Duration::days(1);
                }
                range
            }
            _ => vec![today],
        };
        let labels: Vec<String> = match period.as_str() {
            "week" => dates.iter().map(|d| d.format("%a").to_string()).collect(),
            "month" => dates.iter().map(|d| d.format("%d").to_string()).collect(),
            _ => (9..18).map(|h| format!("{}:00", h)).collect(),
        };

        if auth.is_people_ops() {
            self.company_attendance_stats(&period, today, &dates, labels)
                .await
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            self.personal_attendance_stats(own.id, &period, today, &dates, labels)
                .await
        }
    }

    async fn company_attendance_stats(
        &self,
        period: &str,
        today: NaiveDate,
        dates: &[NaiveDate],
        labels: Vec<String>,
    ) -> Result<Value, ServiceError> {
        if period == "day" {
            let records = attendance::Entity::find()
                .filter(attendance::Column::Date.eq(today))
                .all(self.db.as_ref())
                .await?;
            let mut data = vec![0u64; labels.len()];
            let mut on_time = 0u64;
            let mut late = 0u64;
            for record in &records {
                if let Some(clock_in) = record.clock_in {
                    let hour = clock_in.time().hour();
                    if (9..18).contains(&hour) {
                        data[(hour - 9) as usize] += 1;
                    }
                    if hour < 10 {
                        on_time += 1;
                    } else {
                        late += 1;
                    }
                }
            }
            let total_employees = employee::Entity::find().count(self.db.as_ref()).await?;
            Ok(json!({
                "period": "day",
                "labels": labels,
                "datasets": [{ "name": "Clock-ins", "data": data }],
                "summary": {
                    "total_attendance": data.iter().sum::<u64>(),
                    "on_time": on_time,
                    "late": late,
                    "absent": total_employees.saturating_sub(on_time + late),
                },
            }))
        } else {
            let records = attendance::Entity::find()
                .filter(attendance::Column::Date.is_in(dates.to_vec()))
                .all(self.db.as_ref())
                .await?;
            let index: HashMap<NaiveDate, usize> =
                dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
            let mut present = vec![0u64; dates.len()];
            let mut absent = vec![0u64; dates.len()];
            let mut half = vec![0u64; dates.len()];
            for record in &records {
                if let Some(&i) = index.get(&record.date) {
                    match record.status.as_str() {
                        "present" => present[i] += 1,
                        "absent" => absent[i] += 1,
                        "half-day" => half[i] += 1,
                        _ => {}
                    }
                }
            }
            Ok(json!({
                "period": period,
                "labels": labels,
                "datasets": [
                    { "name": "Present", "data": present },
                    { "name": "Absent", "data": absent },
                    { "name": "Half-day", "data": half },
                ],
                "summary": {
                    "total_working_days": dates.len(),
                    "avg_attendance_rate": avg_attendance_rate(&present, &absent, &half),
                },
            }))
        }
    }

    async fn personal_attendance_stats(
        &self,
        employee_id: Uuid,
        period: &str,
        today: NaiveDate,
        dates: &[NaiveDate],
        labels: Vec<String>,
    ) -> Result<Value, ServiceError> {
        if period == "day" {
            let record = attendance::Entity::find()
                .filter(attendance::Column::EmployeeId.eq(employee_id))
                .filter(attendance::Column::Date.eq(today))
                .one(self.db.as_ref())
                .await?;
            let clock_in_hour = record.as_ref().and_then(|a| a.clock_in).map(|t| t.time().hour());
            let clock_out_hour = record.as_ref().and_then(|a| a.clock_out).map(|t| t.time().hour());

            let mut hours = vec![0u8; labels.len()];
            if let (Some(start), Some(end)) = (clock_in_hour, clock_out_hour) {
                let from = start.saturating_sub(9) as usize;
                let to = (end.saturating_sub(9) as usize).min(hours.len());
                for slot in hours.iter_mut().take(to).skip(from) {
                    *slot = 1;
                }
            }

            Ok(json!({
                "period": "day",
                "labels": labels,
                "datasets": [{ "name": "Hours Worked", "data": hours }],
                "summary": {
                    "status": record.as_ref().map(|a| a.status.clone()).unwrap_or_else(|| "not_recorded".to_string()),
                    "clock_in": record.as_ref().and_then(|a| a.clock_in),
                    "clock_out": record.as_ref().and_then(|a| a.clock_out),
                    "hours_worked": record.as_ref().and_then(|a| a.hours_worked()).unwrap_or(0.0),
                    "on_time": clock_in_hour.is_some_and(|h| h < 10),
                },
            }))
        } else {
            let records = attendance::Entity::find()
                .filter(attendance::Column::EmployeeId.eq(employee_id))
                .filter(attendance::Column::Date.is_in(dates.to_vec()))
                .all(self.db.as_ref())
                .await?;
            let index: HashMap<NaiveDate, usize> =
                dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
            let mut status_data: Vec<Option<String>> = vec![None; dates.len()];
            let mut hours_data = vec![0.0f64; dates.len()];
            for record in &records {
                if let Some(&i) = index.get(&record.date) {
                    status_data[i] = Some(record.status.clone());
                    hours_data[i] = record.hours_worked().unwrap_or(0.0);
                }
            }
            let count_status = |s: &str| {
                status_data
                    .iter()
                    .filter(|v| v.as_deref() == Some(s))
                    .count()
            };
            Ok(json!({
                "period": period,
                "labels": labels,
                "datasets": [{ "name": "Hours Worked", "data": hours_data }],
                "status_data": status_data,
                "summary": {
                    "present_days": count_status("present"),
                    "absent_days": count_status("absent"),
                    "half_days": count_status("half-day"),
                    "not_recorded": status_data.iter().filter(|v| v.is_none()).count(),
                    "total_hours": hours_data.iter().sum::<f64>(),
                },
            }))
        }
    }

    async fn leave_summaries(
        &self,
        leaves: &[leave_request::Model],
    ) -> Result<Vec<Value>, ServiceError> {
        let mut items = Vec::with_capacity(leaves.len());
        for leave in leaves {
            let name = employee::Entity::find_by_id(leave.employee_id)
                .one(self.db.as_ref())
                .await?
                .map(|e| e.full_name())
                .unwrap_or_default();
            items.push(json!({
                "id": leave.id,
                "employee": name,
                "employee_id": leave.employee_id,
                "start_date": leave.start_date,
                "end_date": leave.end_date,
                "days": leave.days,
                "leave_type": leave.leave_type,
                "created_at": leave.created_at,
            }));
        }
        Ok(items)
    }
}

fn employee_summary(e: &employee::Model) -> Value {
    json!({
        "id": e.id,
        "name": e.full_name(),
        "employee_number": e.employee_number,
        "position": e.position,
        "date_of_joining": e.date_of_joining,
        "date_of_birth": e.date_of_birth,
    })
}

fn project_summary(p: &project::Model) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "status": p.status,
        "start_date": p.start_date,
        "end_date": p.end_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_rounds_to_two_decimals() {
        let mut counts = HashMap::new();
        counts.insert("completed".to_string(), 1u64);
        counts.insert("todo".to_string(), 2u64);
        assert_eq!(completion_rate(&counts), 33.33);
        assert_eq!(completion_rate(&HashMap::new()), 0.0);
    }

    #[test]
    fn avg_attendance_rate_skips_empty_days() {
        let rate = avg_attendance_rate(&[2, 0, 1], &[0, 0, 1], &[0, 0, 0]);
        assert_eq!(rate, 75.0);
    }
}
