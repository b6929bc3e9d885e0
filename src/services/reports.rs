use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{
    attendance, department, employee, leave_request, payroll, project, project_member, task,
};
use crate::errors::ServiceError;

use super::{employee_for_user, parse_date};

/// Tabular exports over the HR data. Each report renders as JSON,
/// CSV, or chart series depending on the requested format.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Chart,
}

impl ReportFormat {
    fn parse(value: Option<&str>) -> Result<Self, ServiceError> {
        match value.unwrap_or("json") {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "chart" => Ok(ReportFormat::Chart),
            other => Err(ServiceError::InvalidInput(format!(
                "Invalid format: {}",
                other
            ))),
        }
    }
}

/// CSV exports carry a download filename alongside the body.
#[derive(Debug)]
pub enum ReportOutput {
    Json(Value),
    Csv { filename: String, content: String },
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub department_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub leave_type: Option<String>,
    pub status: Option<String>,
    pub format: Option<String>,
    pub report_type: Option<String>,
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = headers.join(",");
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

struct ReportRow {
    employee: employee::Model,
    department: String,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        ReportService { db }
    }

    fn resolve_range(
        &self,
        query: &ReportQuery,
        default_start: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate), ServiceError> {
        let today = Utc::now().naive_utc().date();
        let start = match query.start_date.as_deref() {
            Some(s) => parse_date(s)?,
            None => default_start,
        };
        let end = match query.end_date.as_deref() {
            Some(s) => parse_date(s)?,
            None => today,
        };
        Ok((start, end))
    }

    async fn department_names(&self) -> Result<BTreeMap<Uuid, String>, ServiceError> {
        let departments = department::Entity::find().all(self.db.as_ref()).await?;
        Ok(departments.into_iter().map(|d| (d.id, d.name)).collect())
    }

    /// Employee rows scoped to report filters. Managers only see their
    /// own team regardless of the other filters.
    async fn scoped_employees(
        &self,
        auth: &AuthUser,
        department_id: Option<Uuid>,
        employee_id: Option<Uuid>,
    ) -> Result<Vec<ReportRow>, ServiceError> {
        let mut finder = employee::Entity::find();
        if let Some(dept) = department_id {
            finder = finder.filter(employee::Column::DepartmentId.eq(dept));
        }
        if let Some(id) = employee_id {
            finder = finder.filter(employee::Column::Id.eq(id));
        }
        if !auth.is_people_ops() {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            let reports = employee::Entity::find()
                .filter(employee::Column::ManagerId.eq(own.id))
                .all(self.db.as_ref())
                .await?;
            let mut team: Vec<Uuid> = reports.into_iter().map(|e| e.id).collect();
            team.push(own.id);
            finder = finder.filter(employee::Column::Id.is_in(team));
        }

        let names = self.department_names().await?;
        let mut rows: Vec<ReportRow> = finder
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|e| {
                let department = e
                    .department_id
                    .and_then(|id| names.get(&id).cloned())
                    .unwrap_or_else(|| "N/A".to_string());
                ReportRow {
                    employee: e,
                    department,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.employee.last_name.as_str(), a.employee.first_name.as_str())
                .cmp(&(b.employee.last_name.as_str(), b.employee.first_name.as_str()))
        });
        Ok(rows)
    }

    #[instrument(skip(self, auth, query))]
    pub async fn attendance_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let format = ReportFormat::parse(query.format.as_deref())?;
        let report_type = query.report_type.clone().unwrap_or_else(|| "daily".to_string());
        if !["daily", "summary"].contains(&report_type.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Report type '{}' is not supported",
                report_type
            )));
        }

        let today = Utc::now().naive_utc().date();
        let month_start = today.with_day(1).unwrap_or(today);
        let (start, end) = self.resolve_range(&query, month_start)?;

        let rows = self
            .scoped_employees(auth, query.department_id, query.employee_id)
            .await?;
        let employee_ids: Vec<Uuid> = rows.iter().map(|r| r.employee.id).collect();

        let records = attendance::Entity::find()
            .filter(attendance::Column::EmployeeId.is_in(employee_ids))
            .filter(attendance::Column::Date.gte(start))
            .filter(attendance::Column::Date.lte(end))
            .all(self.db.as_ref())
            .await?;

        if report_type == "daily" {
            let mut detailed = Vec::new();
            for row in &rows {
                let mut own: Vec<&attendance::Model> = records
                    .iter()
                    .filter(|a| a.employee_id == row.employee.id)
                    .collect();
                own.sort_by_key(|a| a.date);
                for record in own {
                    detailed.push(json!({
                        "employee_id": row.employee.employee_number,
                        "name": row.employee.full_name(),
                        "department": row.department,
                        "date": record.date,
                        "status": record.status,
                        "clock_in": record.clock_in,
                        "clock_out": record.clock_out,
                        "hours_worked": record.hours_worked().unwrap_or(0.0),
                        "work_from": record.work_from,
                    }));
                }
            }
            self.finish_attendance(format, &report_type, start, end, detailed)
        } else {
            let mut summary_rows = Vec::new();
            for row in &rows {
                let own: Vec<&attendance::Model> = records
                    .iter()
                    .filter(|a| a.employee_id == row.employee.id)
                    .collect();
                if own.is_empty() {
                    continue;
                }
                let count = |s: &str| own.iter().filter(|a| a.status == s).count();
                let from = |w: &str| own.iter().filter(|a| a.work_from == w).count();
                let present = count("present");
                let absent = count("absent");
                let half = count("half-day");
                let total_hours: f64 = own.iter().filter_map(|a| a.hours_worked()).sum();
                let total_days = present + absent + half;
                let rate = if total_days > 0 {
                    round2((present as f64 + half as f64 * 0.5) / total_days as f64 * 100.0)
                } else {
                    0.0
                };
                summary_rows.push(json!({
                    "employee_id": row.employee.employee_number,
                    "name": row.employee.full_name(),
                    "department": row.department,
                    "days_present": present,
                    "days_absent": absent,
                    "days_half": half,
                    "total_hours": round2(total_hours),
                    "work_from_office": from("office"),
                    "work_from_home": from("home"),
                    "work_remote": from("remote"),
                    "attendance_rate": rate,
                }));
            }
            self.finish_attendance(format, &report_type, start, end, summary_rows)
        }
    }

    fn finish_attendance(
        &self,
        format: ReportFormat,
        report_type: &str,
        start: NaiveDate,
        end: NaiveDate,
        result: Vec<Value>,
    ) -> Result<ReportOutput, ServiceError> {
        match format {
            ReportFormat::Json => Ok(ReportOutput::Json(json!({
                "report_type": report_type,
                "detailed": result,
                "meta": {
                    "start_date": start,
                    "end_date": end,
                    "total_records": result.len(),
                },
            }))),
            ReportFormat::Csv => {
                let (headers, rows): (Vec<&str>, Vec<Vec<String>>) = if report_type == "daily" {
                    let headers = vec![
                        "Employee ID", "Name", "Department", "Date", "Status", "Clock In",
                        "Clock Out", "Hours Worked", "Work From",
                    ];
                    let rows = result
                        .iter()
                        .map(|r| {
                            vec![
                                json_str(r, "employee_id"),
                                json_str(r, "name"),
                                json_str(r, "department"),
                                json_str(r, "date"),
                                json_str(r, "status"),
                                json_str(r, "clock_in"),
                                json_str(r, "clock_out"),
                                json_str(r, "hours_worked"),
                                json_str(r, "work_from"),
                            ]
                        })
                        .collect();
                    (headers, rows)
                } else {
                    let headers = vec![
                        "Employee ID", "Name", "Department", "Days Present", "Days Absent",
                        "Half Days", "Total Hours", "Work From Office", "Work From Home",
                        "Work Remote", "Attendance Rate (%)",
                    ];
                    let rows = result
                        .iter()
                        .map(|r| {
                            vec![
                                json_str(r, "employee_id"),
                                json_str(r, "name"),
                                json_str(r, "department"),
                                json_str(r, "days_present"),
                                json_str(r, "days_absent"),
                                json_str(r, "days_half"),
                                json_str(r, "total_hours"),
                                json_str(r, "work_from_office"),
                                json_str(r, "work_from_home"),
                                json_str(r, "work_remote"),
                                json_str(r, "attendance_rate"),
                            ]
                        })
                        .collect();
                    (headers, rows)
                };
                Ok(ReportOutput::Csv {
                    filename: format!("attendance_report_{}_{}_{}.csv", report_type, start, end),
                    content: render_csv(&headers, &rows),
                })
            }
            ReportFormat::Chart => {
                if result.is_empty() {
                    return Err(ServiceError::NotFound(
                        "Attendance data for the specified criteria".to_string(),
                    ));
                }
                if report_type == "daily" {
                    let mut by_date: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();
                    for r in &result {
                        let date = json_str(r, "date");
                        let entry = by_date.entry(date).or_default();
                        match json_str(r, "status").as_str() {
                            "present" => entry.0 += 1,
                            "absent" => entry.1 += 1,
                            "half-day" => entry.2 += 1,
                            _ => {}
                        }
                    }
                    let labels: Vec<&String> = by_date.keys().collect();
                    Ok(ReportOutput::Json(json!({
                        "chart_data": {
                            "attendance_by_date": {
                                "title": "Daily Attendance",
                                "type": "bar",
                                "labels": labels,
                                "datasets": [
                                    { "label": "Present", "data": by_date.values().map(|v| v.0).collect::<Vec<_>>() },
                                    { "label": "Absent", "data": by_date.values().map(|v| v.1).collect::<Vec<_>>() },
                                    { "label": "Half Day", "data": by_date.values().map(|v| v.2).collect::<Vec<_>>() },
                                ],
                            },
                        },
                    })))
                } else {
                    let mut pairs: Vec<(String, f64)> = result
                        .iter()
                        .map(|r| {
                            (
                                json_str(r, "name"),
                                r.get("attendance_rate").and_then(Value::as_f64).unwrap_or(0.0),
                            )
                        })
                        .collect();
                    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
                    pairs.truncate(10);
                    Ok(ReportOutput::Json(json!({
                        "chart_data": {
                            "attendance_rate_by_employee": {
                                "title": "Attendance Rate by Employee",
                                "type": "bar",
                                "labels": pairs.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
                                "datasets": [
                                    { "label": "Attendance Rate (%)", "data": pairs.iter().map(|(_, r)| *r).collect::<Vec<_>>() },
                                ],
                            },
                        },
                    })))
                }
            }
        }
    }

    #[instrument(skip(self, auth, query))]
    pub async fn leave_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let format = ReportFormat::parse(query.format.as_deref())?;
        let today = Utc::now().naive_utc().date();
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let (start, end) = self.resolve_range(&query, year_start)?;

        let rows = self
            .scoped_employees(auth, query.department_id, query.employee_id)
            .await?;
        let employee_ids: Vec<Uuid> = rows.iter().map(|r| r.employee.id).collect();

        let mut finder = leave_request::Entity::find()
            .filter(leave_request::Column::EmployeeId.is_in(employee_ids))
            .filter(leave_request::Column::StartDate.lte(end))
            .filter(leave_request::Column::EndDate.gte(start));
        if let Some(leave_type) = query.leave_type.as_deref() {
            finder = finder.filter(leave_request::Column::LeaveType.eq(leave_type));
        }
        if let Some(status) = query.status.as_deref() {
            finder = finder.filter(leave_request::Column::Status.eq(status));
        }
        let leaves = finder.all(self.db.as_ref()).await?;

        let mut result = Vec::new();
        for row in &rows {
            let mut own: Vec<&leave_request::Model> = leaves
                .iter()
                .filter(|l| l.employee_id == row.employee.id)
                .collect();
            own.sort_by_key(|l| l.start_date);
            for leave in own {
                result.push(json!({
                    "employee_id": row.employee.employee_number,
                    "name": row.employee.full_name(),
                    "department": row.department,
                    "leave_id": leave.id,
                    "leave_type": leave.leave_type,
                    "start_date": leave.start_date,
                    "end_date": leave.end_date,
                    "days": leave.days,
                    "status": leave.status,
                    "reason": leave.reason,
                    "created_at": leave.created_at,
                }));
            }
        }

        match format {
            ReportFormat::Csv => {
                let headers = vec![
                    "Employee ID", "Name", "Department", "Leave ID", "Leave Type",
                    "Start Date", "End Date", "Days", "Status", "Reason", "Created At",
                ];
                let rows: Vec<Vec<String>> = result
                    .iter()
                    .map(|r| {
                        vec![
                            json_str(r, "employee_id"),
                            json_str(r, "name"),
                            json_str(r, "department"),
                            json_str(r, "leave_id"),
                            json_str(r, "leave_type"),
                            json_str(r, "start_date"),
                            json_str(r, "end_date"),
                            json_str(r, "days"),
                            json_str(r, "status"),
                            json_str(r, "reason"),
                            json_str(r, "created_at"),
                        ]
                    })
                    .collect();
                Ok(ReportOutput::Csv {
                    filename: format!("leave_report_{}_{}.csv", start, end),
                    content: render_csv(&headers, &rows),
                })
            }
            ReportFormat::Chart => {
                if result.is_empty() {
                    return Err(ServiceError::NotFound(
                        "Leave data for the specified criteria".to_string(),
                    ));
                }
                let mut by_type: BTreeMap<String, f64> = BTreeMap::new();
                for r in &result {
                    let days = r.get("days").and_then(Value::as_f64).unwrap_or(0.0);
                    *by_type.entry(json_str(r, "leave_type")).or_default() += days;
                }
                Ok(ReportOutput::Json(json!({
                    "chart_data": {
                        "leave_days_by_type": {
                            "title": "Leave Days by Type",
                            "type": "pie",
                            "labels": by_type.keys().collect::<Vec<_>>(),
                            "datasets": [
                                { "label": "Days", "data": by_type.values().collect::<Vec<_>>() },
                            ],
                        },
                    },
                })))
            }
            ReportFormat::Json => {
                let mut by_type: BTreeMap<String, (u64, f64)> = BTreeMap::new();
                let mut by_status: BTreeMap<String, (u64, f64)> = BTreeMap::new();
                let mut total_days = 0.0;
                for r in &result {
                    let days = r.get("days").and_then(Value::as_f64).unwrap_or(0.0);
                    total_days += days;
                    let t = by_type.entry(json_str(r, "leave_type")).or_default();
                    t.0 += 1;
                    t.1 += days;
                    let s = by_status.entry(json_str(r, "status")).or_default();
                    s.0 += 1;
                    s.1 += days;
                }
                let summarize = |m: &BTreeMap<String, (u64, f64)>| -> Value {
                    m.iter()
                        .map(|(k, (count, days))| (k.clone(), json!({ "count": count, "days": days })))
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                };
                Ok(ReportOutput::Json(json!({
                    "detailed": result,
                    "summary": {
                        "total_leave_requests": result.len(),
                        "total_leave_days": total_days,
                        "by_type": summarize(&by_type),
                        "by_status": summarize(&by_status),
                    },
                    "meta": {
                        "start_date": start,
                        "end_date": end,
                        "total_records": result.len(),
                    },
                })))
            }
        }
    }

    #[instrument(skip(self, auth, query))]
    pub async fn payroll_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let format = ReportFormat::parse(query.format.as_deref())?;
        let today = Utc::now().naive_utc().date();
        let month_start = today.with_day(1).unwrap_or(today);
        let (start, end) = self.resolve_range(&query, month_start)?;

        let rows = self
            .scoped_employees(auth, query.department_id, query.employee_id)
            .await?;
        let employee_ids: Vec<Uuid> = rows.iter().map(|r| r.employee.id).collect();

        let mut finder = payroll::Entity::find()
            .filter(payroll::Column::EmployeeId.is_in(employee_ids))
            .filter(payroll::Column::PeriodStart.lte(end))
            .filter(payroll::Column::PeriodEnd.gte(start));
        if let Some(status) = query.status.as_deref() {
            finder = finder.filter(payroll::Column::Status.eq(status));
        }
        let payrolls = finder.all(self.db.as_ref()).await?;

        let mut result = Vec::new();
        for row in &rows {
            let mut own: Vec<&payroll::Model> = payrolls
                .iter()
                .filter(|p| p.employee_id == row.employee.id)
                .collect();
            own.sort_by_key(|p| p.period_end);
            for p in own {
                result.push(json!({
                    "employee_id": row.employee.employee_number,
                    "name": row.employee.full_name(),
                    "department": row.department,
                    "payroll_id": p.id,
                    "period_start": p.period_start,
                    "period_end": p.period_end,
                    "base_salary": p.base_salary,
                    "overtime_hours": p.overtime_hours,
                    "overtime_amount": p.overtime_amount,
                    "bonus": p.bonus,
                    "deductions": p.deductions,
                    "tax": p.tax,
                    "net_amount": p.net_amount,
                    "status": p.status,
                    "payment_date": p.payment_date,
                    "created_at": p.created_at,
                }));
            }
        }

        match format {
            ReportFormat::Csv => {
                let headers = vec![
                    "Employee ID", "Name", "Department", "Payroll ID", "Period Start",
                    "Period End", "Base Salary", "Overtime Hours", "Overtime Amount", "Bonus",
                    "Deductions", "Tax", "Net Amount", "Status", "Payment Date",
                ];
                let rows: Vec<Vec<String>> = result
                    .iter()
                    .map(|r| {
                        vec![
                            json_str(r, "employee_id"),
                            json_str(r, "name"),
                            json_str(r, "department"),
                            json_str(r, "payroll_id"),
                            json_str(r, "period_start"),
                            json_str(r, "period_end"),
                            json_str(r, "base_salary"),
                            json_str(r, "overtime_hours"),
                            json_str(r, "overtime_amount"),
                            json_str(r, "bonus"),
                            json_str(r, "deductions"),
                            json_str(r, "tax"),
                            json_str(r, "net_amount"),
                            json_str(r, "status"),
                            json_str(r, "payment_date"),
                        ]
                    })
                    .collect();
                Ok(ReportOutput::Csv {
                    filename: format!("payroll_report_{}_{}.csv", start, end),
                    content: render_csv(&headers, &rows),
                })
            }
            ReportFormat::Chart => {
                if result.is_empty() {
                    return Err(ServiceError::NotFound(
                        "Payroll data for the specified criteria".to_string(),
                    ));
                }
                let mut by_department: BTreeMap<String, f64> = BTreeMap::new();
                for r in &result {
                    let amount = r
                        .get("net_amount")
                        .and_then(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()).or(v.as_f64()))
                        .unwrap_or(0.0);
                    *by_department.entry(json_str(r, "department")).or_default() += amount;
                }
                Ok(ReportOutput::Json(json!({
                    "chart_data": {
                        "payroll_by_department": {
                            "title": "Payroll by Department",
                            "type": "bar",
                            "labels": by_department.keys().collect::<Vec<_>>(),
                            "datasets": [
                                { "label": "Total Amount", "data": by_department.values().collect::<Vec<_>>() },
                            ],
                        },
                    },
                })))
            }
            ReportFormat::Json => {
                let sum_of = |key: &str| -> f64 {
                    result
                        .iter()
                        .map(|r| {
                            r.get(key)
                                .and_then(|v| {
                                    v.as_str().and_then(|s| s.parse::<f64>().ok()).or(v.as_f64())
                                })
                                .unwrap_or(0.0)
                        })
                        .sum()
                };
                let mut by_department: BTreeMap<String, (u64, f64)> = BTreeMap::new();
                let mut by_status: BTreeMap<String, (u64, f64)> = BTreeMap::new();
                for r in &result {
                    let net = r
                        .get("net_amount")
                        .and_then(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()).or(v.as_f64()))
                        .unwrap_or(0.0);
                    let d = by_department.entry(json_str(r, "department")).or_default();
                    d.0 += 1;
                    d.1 += net;
                    let s = by_status.entry(json_str(r, "status")).or_default();
                    s.0 += 1;
                    s.1 += net;
                }
                let summarize = |m: &BTreeMap<String, (u64, f64)>| -> Value {
                    m.iter()
                        .map(|(k, (count, amount))| {
                            (k.clone(), json!({ "count": count, "amount": amount }))
                        })
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                };
                Ok(ReportOutput::Json(json!({
                    "detailed": result,
                    "summary": {
                        "total_payrolls": result.len(),
                        "total_base_salary": sum_of("base_salary"),
                        "total_overtime": sum_of("overtime_amount"),
                        "total_bonus": sum_of("bonus"),
                        "total_deductions": sum_of("deductions"),
                        "total_tax": sum_of("tax"),
                        "total_net_amount": sum_of("net_amount"),
                        "by_department": summarize(&by_department),
                        "by_status": summarize(&by_status),
                    },
                    "meta": {
                        "start_date": start,
                        "end_date": end,
                        "total_records": result.len(),
                    },
                })))
            }
        }
    }

    #[instrument(skip(self, auth, query))]
    pub async fn project_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let report_type = query
            .report_type
            .clone()
            .unwrap_or_else(|| "projects".to_string());
        match report_type.as_str() {
            "projects" => self.projects_report(auth, query).await,
            "tasks" => self.tasks_report(auth, query).await,
            "team_performance" => self.team_performance_report(auth, query).await,
            other => Err(ServiceError::InvalidInput(format!(
                "Report type '{}' is not supported",
                other
            ))),
        }
    }

    async fn manager_project_ids(&self, auth: &AuthUser) -> Result<Option<Vec<Uuid>>, ServiceError> {
        if auth.is_people_ops() {
            return Ok(None);
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let mut ids: Vec<Uuid> = project::Entity::find()
            .filter(project::Column::CreatedBy.eq(own.id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let member_of = project_member::Entity::find()
            .filter(project_member::Column::EmployeeId.eq(own.id))
            .all(self.db.as_ref())
            .await?;
        ids.extend(member_of.into_iter().map(|m| m.project_id));
        ids.sort();
        ids.dedup();
        Ok(Some(ids))
    }

    async fn projects_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let format = ReportFormat::parse(query.format.as_deref())?;
        let today = Utc::now().naive_utc().date();
        let (start, end) = self.resolve_range(&query, today - Duration::days(90))?;

        let mut finder = project::Entity::find();
        if let Some(id) = query.project_id {
            finder = finder.filter(project::Column::Id.eq(id));
        }
        if let Some(ids) = self.manager_project_ids(auth).await? {
            finder = finder.filter(project::Column::Id.is_in(ids));
        }
        if let Some(status) = query.status.as_deref() {
            finder = finder.filter(project::Column::Status.eq(status));
        }
        let mut projects: Vec<project::Model> = finder
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .filter(|p| {
                let starts_in = p.start_date.is_some_and(|d| d >= start && d <= end);
                let ends_in = p.end_date.is_some_and(|d| d >= start && d <= end);
                let spans = p.start_date.is_some_and(|s| s <= start)
                    && p.end_date.map(|e| e >= end).unwrap_or(true);
                starts_in || ends_in || spans
            })
            .collect();
        projects.sort_by_key(|p| std::cmp::Reverse(p.end_date));

        let tasks = task::Entity::find().all(self.db.as_ref()).await?;
        let employees = employee::Entity::find().all(self.db.as_ref()).await?;

        let mut result = Vec::new();
        for p in &projects {
            let project_tasks: Vec<&task::Model> =
                tasks.iter().filter(|t| t.project_id == p.id).collect();
            let completed = project_tasks.iter().filter(|t| t.status == "completed").count();
            let rate = if project_tasks.is_empty() {
                0.0
            } else {
                round2(completed as f64 / project_tasks.len() as f64 * 100.0)
            };
            let manager = employees
                .iter()
                .find(|e| e.id == p.created_by)
                .map(|e| e.full_name())
                .unwrap_or_default();
            result.push(json!({
                "project_id": p.id,
                "name": p.name,
                "description": p.description,
                "status": p.status,
                "start_date": p.start_date,
                "end_date": p.end_date,
                "budget": p.budget,
                "manager": manager,
                "task_count": project_tasks.len(),
                "completed_tasks": completed,
                "completion_rate": rate,
                "created_at": p.created_at,
            }));
        }

        match format {
            ReportFormat::Csv => {
                let headers = vec![
                    "Project ID", "Name", "Description", "Status", "Start Date", "End Date",
                    "Budget", "Manager", "Task Count", "Completed Tasks", "Completion Rate (%)",
                ];
                let rows: Vec<Vec<String>> = result
                    .iter()
                    .map(|r| {
                        vec![
                            json_str(r, "project_id"),
                            json_str(r, "name"),
                            json_str(r, "description"),
                            json_str(r, "status"),
                            json_str(r, "start_date"),
                            json_str(r, "end_date"),
                            json_str(r, "budget"),
                            json_str(r, "manager"),
                            json_str(r, "task_count"),
                            json_str(r, "completed_tasks"),
                            json_str(r, "completion_rate"),
                        ]
                    })
                    .collect();
                Ok(ReportOutput::Csv {
                    filename: format!("project_report_{}_{}.csv", start, end),
                    content: render_csv(&headers, &rows),
                })
            }
            ReportFormat::Chart => {
                if result.is_empty() {
                    return Err(ServiceError::NotFound(
                        "Project data for the specified criteria".to_string(),
                    ));
                }
                let mut pairs: Vec<(String, f64)> = result
                    .iter()
                    .map(|r| {
                        (
                            json_str(r, "name"),
                            r.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0),
                        )
                    })
                    .collect();
                pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
                pairs.truncate(10);
                Ok(ReportOutput::Json(json!({
                    "chart_data": {
                        "project_completion_rates": {
                            "title": "Project Completion Rates",
                            "type": "bar",
                            "labels": pairs.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
                            "datasets": [
                                { "label": "Completion Rate (%)", "data": pairs.iter().map(|(_, r)| *r).collect::<Vec<_>>() },
                            ],
                        },
                    },
                })))
            }
            ReportFormat::Json => {
                let avg = if result.is_empty() {
                    0.0
                } else {
                    round2(
                        result
                            .iter()
                            .map(|r| r.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0))
                            .sum::<f64>()
                            / result.len() as f64,
                    )
                };
                let mut by_status: BTreeMap<String, (u64, f64)> = BTreeMap::new();
                for r in &result {
                    let rate = r.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0);
                    let entry = by_status.entry(json_str(r, "status")).or_default();
                    entry.0 += 1;
                    entry.1 += rate;
                }
                let by_status: Value = by_status
                    .iter()
                    .map(|(k, (count, total))| {
                        (
                            k.clone(),
                            json!({
                                "count": count,
                                "avg_completion": if *count > 0 { round2(total / *count as f64) } else { 0.0 },
                            }),
                        )
                    })
                    .collect::<serde_json::Map<_, _>>()
                    .into();
                Ok(ReportOutput::Json(json!({
                    "detailed": result,
                    "summary": {
                        "total_projects": result.len(),
                        "avg_completion_rate": avg,
                        "by_status": by_status,
                    },
                    "meta": {
                        "start_date": start,
                        "end_date": end,
                        "total_records": result.len(),
                    },
                })))
            }
        }
    }

    async fn tasks_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let format = ReportFormat::parse(query.format.as_deref())?;
        let today = Utc::now().naive_utc().date();
        let (start, end) = self.resolve_range(&query, today - Duration::days(90))?;
        let window_start = start.and_hms_opt(0, 0, 0);
        let window_end = end.and_hms_opt(23, 59, 59);

        let mut finder = task::Entity::find();
        if let Some(id) = query.project_id {
            finder = finder.filter(task::Column::ProjectId.eq(id));
        }
        if let Some(ids) = self.manager_project_ids(auth).await? {
            finder = finder.filter(task::Column::ProjectId.is_in(ids));
        }
        if let Some(id) = query.employee_id {
            finder = finder.filter(task::Column::AssigneeId.eq(id));
        }
        if let Some(status) = query.status.as_deref() {
            finder = finder.filter(task::Column::Status.eq(status));
        }
        let mut tasks: Vec<task::Model> = finder
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .filter(|t| {
                let created_in = window_start
                    .zip(window_end)
                    .is_some_and(|(s, e)| t.created_at >= s && t.created_at <= e);
                let completed_in = t.completed_at.is_some_and(|c| {
                    window_start.zip(window_end).is_some_and(|(s, e)| c >= s && c <= e)
                });
                let due_in = t.due_date.is_some_and(|d| d >= start && d <= end);
                created_in || completed_in || due_in
            })
            .collect();
        tasks.sort_by_key(|t| t.due_date);

        let projects = project::Entity::find().all(self.db.as_ref()).await?;
        let employees = employee::Entity::find().all(self.db.as_ref()).await?;

        let result: Vec<Value> = tasks
            .iter()
            .map(|t| {
                let project_name = projects
                    .iter()
                    .find(|p| p.id == t.project_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                let assignee = t
                    .assignee_id
                    .and_then(|id| employees.iter().find(|e| e.id == id))
                    .map(|e| e.full_name())
                    .unwrap_or_else(|| "Unassigned".to_string());
                json!({
                    "task_id": t.id,
                    "title": t.title,
                    "status": t.status,
                    "priority": t.priority,
                    "progress": t.progress,
                    "due_date": t.due_date,
                    "created_at": t.created_at,
                    "completed_at": t.completed_at,
                    "project_id": t.project_id,
                    "project_name": project_name,
                    "assignee": assignee,
                })
            })
            .collect();

        match format {
            ReportFormat::Csv => {
                let headers = vec![
                    "Task ID", "Title", "Status", "Priority", "Progress", "Due Date",
                    "Created At", "Completed At", "Project ID", "Project Name", "Assignee",
                ];
                let rows: Vec<Vec<String>> = result
                    .iter()
                    .map(|r| {
                        vec![
                            json_str(r, "task_id"),
                            json_str(r, "title"),
                            json_str(r, "status"),
                            json_str(r, "priority"),
                            json_str(r, "progress"),
                            json_str(r, "due_date"),
                            json_str(r, "created_at"),
                            json_str(r, "completed_at"),
                            json_str(r, "project_id"),
                            json_str(r, "project_name"),
                            json_str(r, "assignee"),
                        ]
                    })
                    .collect();
                Ok(ReportOutput::Csv {
                    filename: format!("task_report_{}_{}.csv", start, end),
                    content: render_csv(&headers, &rows),
                })
            }
            ReportFormat::Chart => {
                if result.is_empty() {
                    return Err(ServiceError::NotFound(
                        "Task data for the specified criteria".to_string(),
                    ));
                }
                let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
                for r in &result {
                    *by_status.entry(json_str(r, "status")).or_default() += 1;
                }
                Ok(ReportOutput::Json(json!({
                    "chart_data": {
                        "tasks_by_status": {
                            "title": "Tasks by Status",
                            "type": "pie",
                            "labels": by_status.keys().collect::<Vec<_>>(),
                            "datasets": [
                                { "label": "Tasks", "data": by_status.values().collect::<Vec<_>>() },
                            ],
                        },
                    },
                })))
            }
            ReportFormat::Json => {
                let completed = result
                    .iter()
                    .filter(|r| json_str(r, "status") == "completed")
                    .count();
                let overdue = tasks
                    .iter()
                    .filter(|t| t.status != "completed" && t.due_date.is_some_and(|d| d < today))
                    .count();
                let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
                let mut by_priority: BTreeMap<String, u64> = BTreeMap::new();
                let mut by_assignee: BTreeMap<String, (u64, u64)> = BTreeMap::new();
                for r in &result {
                    *by_status.entry(json_str(r, "status")).or_default() += 1;
                    *by_priority.entry(json_str(r, "priority")).or_default() += 1;
                    let entry = by_assignee.entry(json_str(r, "assignee")).or_default();
                    entry.0 += 1;
                    if json_str(r, "status") == "completed" {
                        entry.1 += 1;
                    }
                }
                let by_assignee: Value = by_assignee
                    .iter()
                    .map(|(name, (total, done))| {
                        (
                            name.clone(),
                            json!({
                                "total": total,
                                "completed": done,
                                "completion_rate": if *total > 0 {
                                    round2(*done as f64 / *total as f64 * 100.0)
                                } else {
                                    0.0
                                },
                            }),
                        )
                    })
                    .collect::<serde_json::Map<_, _>>()
                    .into();
                Ok(ReportOutput::Json(json!({
                    "detailed": result,
                    "summary": {
                        "total_tasks": result.len(),
                        "completed_tasks": completed,
                        "overdue_tasks": overdue,
                        "by_status": by_status,
                        "by_priority": by_priority,
                        "by_assignee": by_assignee,
                    },
                    "meta": {
                        "start_date": start,
                        "end_date": end,
                        "total_records": result.len(),
                    },
                })))
            }
        }
    }

    async fn team_performance_report(
        &self,
        auth: &AuthUser,
        query: ReportQuery,
    ) -> Result<ReportOutput, ServiceError> {
        let format = ReportFormat::parse(query.format.as_deref())?;
        let today = Utc::now().naive_utc().date();
        let (start, end) = self.resolve_range(&query, today - Duration::days(90))?;
        let window_start = start.and_hms_opt(0, 0, 0);
        let window_end = end.and_hms_opt(23, 59, 59);

        let rows = self
            .scoped_employees(auth, query.department_id, query.employee_id)
            .await?;
        let employee_ids: Vec<Uuid> = rows.iter().map(|r| r.employee.id).collect();

        let tasks: Vec<task::Model> = task::Entity::find()
            .filter(task::Column::AssigneeId.is_in(employee_ids))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .filter(|t| {
                let created_in = window_start
                    .zip(window_end)
                    .is_some_and(|(s, e)| t.created_at >= s && t.created_at <= e);
                let completed_in = t.completed_at.is_some_and(|c| {
                    window_start.zip(window_end).is_some_and(|(s, e)| c >= s && c <= e)
                });
                let due_in = t.due_date.is_some_and(|d| d >= start && d <= end);
                created_in || completed_in || due_in
            })
            .collect();

        let mut result = Vec::new();
        for row in &rows {
            let own: Vec<&task::Model> = tasks
                .iter()
                .filter(|t| t.assignee_id == Some(row.employee.id))
                .collect();
            if own.is_empty() {
                continue;
            }
            let total = own.len();
            let completed = own.iter().filter(|t| t.status == "completed").count();

            let mut on_time = 0usize;
            let mut late = 0usize;
            let mut completion_days = Vec::new();
            for t in &own {
                if t.status == "completed" {
                    if let (Some(done), Some(due)) = (t.completed_at, t.due_date) {
                        if done.date() <= due {
                            on_time += 1;
                        } else {
                            late += 1;
                        }
                    }
                    if let Some(done) = t.completed_at {
                        let delta = done - t.created_at;
                        completion_days.push(delta.num_seconds() as f64 / 86_400.0);
                    }
                }
            }
            let on_time_rate = if completed > 0 {
                round2(on_time as f64 / completed as f64 * 100.0)
            } else {
                0.0
            };
            let avg_completion_time = if completion_days.is_empty() {
                0.0
            } else {
                round2(completion_days.iter().sum::<f64>() / completion_days.len() as f64)
            };
            let high = own
                .iter()
                .filter(|t| t.priority == "high" || t.priority == "urgent")
                .count();
            let high_done = own
                .iter()
                .filter(|t| {
                    (t.priority == "high" || t.priority == "urgent") && t.status == "completed"
                })
                .count();

            result.push(json!({
                "employee_id": row.employee.employee_number,
                "name": row.employee.full_name(),
                "department": row.department,
                "position": row.employee.position.clone().unwrap_or_else(|| "N/A".to_string()),
                "total_tasks": total,
                "completed_tasks": completed,
                "completion_rate": round2(completed as f64 / total as f64 * 100.0),
                "on_time_tasks": on_time,
                "late_tasks": late,
                "on_time_rate": on_time_rate,
                "avg_completion_time": avg_completion_time,
                "high_priority_tasks": high,
                "high_priority_completed": high_done,
                "high_priority_rate": if high > 0 {
                    round2(high_done as f64 / high as f64 * 100.0)
                } else {
                    0.0
                },
            }));
        }
        result.sort_by(|a, b| {
            let ra = a.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0);
            let rb = b.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0);
            rb.total_cmp(&ra)
        });

        match format {
            ReportFormat::Csv => {
                let headers = vec![
                    "Employee ID", "Name", "Department", "Position", "Total Tasks",
                    "Completed Tasks", "Completion Rate (%)", "On-Time Tasks", "Late Tasks",
                    "On-Time Rate (%)", "Avg Completion Time (days)", "High Priority Tasks",
                    "High Priority Completed", "High Priority Rate (%)",
                ];
                let rows: Vec<Vec<String>> = result
                    .iter()
                    .map(|r| {
                        vec![
                            json_str(r, "employee_id"),
                            json_str(r, "name"),
                            json_str(r, "department"),
                            json_str(r, "position"),
                            json_str(r, "total_tasks"),
                            json_str(r, "completed_tasks"),
                            json_str(r, "completion_rate"),
                            json_str(r, "on_time_tasks"),
                            json_str(r, "late_tasks"),
                            json_str(r, "on_time_rate"),
                            json_str(r, "avg_completion_time"),
                            json_str(r, "high_priority_tasks"),
                            json_str(r, "high_priority_completed"),
                            json_str(r, "high_priority_rate"),
                        ]
                    })
                    .collect();
                Ok(ReportOutput::Csv {
                    filename: format!("team_performance_report_{}_{}.csv", start, end),
                    content: render_csv(&headers, &rows),
                })
            }
            ReportFormat::Chart => {
                if result.is_empty() {
                    return Err(ServiceError::NotFound(
                        "Performance data for the specified criteria".to_string(),
                    ));
                }
                let top: Vec<&Value> = result.iter().take(10).collect();
                Ok(ReportOutput::Json(json!({
                    "chart_data": {
                        "team_completion_rates": {
                            "title": "Team Completion Rates",
                            "type": "bar",
                            "labels": top.iter().map(|r| json_str(r, "name")).collect::<Vec<_>>(),
                            "datasets": [
                                {
                                    "label": "Completion Rate (%)",
                                    "data": top.iter()
                                        .map(|r| r.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0))
                                        .collect::<Vec<_>>(),
                                },
                            ],
                        },
                    },
                })))
            }
            ReportFormat::Json => {
                if result.is_empty() {
                    return Ok(ReportOutput::Json(json!({
                        "detailed": [],
                        "summary": {},
                        "meta": {
                            "start_date": start,
                            "end_date": end,
                            "total_records": 0,
                        },
                    })));
                }
                let len = result.len() as f64;
                let avg_of = |key: &str| -> f64 {
                    round2(
                        result
                            .iter()
                            .map(|r| r.get(key).and_then(Value::as_f64).unwrap_or(0.0))
                            .sum::<f64>()
                            / len,
                    )
                };
                let sum_of = |key: &str| -> u64 {
                    result
                        .iter()
                        .map(|r| r.get(key).and_then(Value::as_u64).unwrap_or(0))
                        .sum()
                };
                let mut by_department: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();
                for r in &result {
                    let entry = by_department.entry(json_str(r, "department")).or_default();
                    entry.0 += 1;
                    entry.1 += r.get("total_tasks").and_then(Value::as_u64).unwrap_or(0);
                    entry.2 += r.get("completed_tasks").and_then(Value::as_u64).unwrap_or(0);
                }
                let by_department: Value = by_department
                    .iter()
                    .map(|(k, (emps, total, done))| {
                        (
                            k.clone(),
                            json!({
                                "employees": emps,
                                "total_tasks": total,
                                "completed_tasks": done,
                                "completion_rate": if *total > 0 {
                                    round2(*done as f64 / *total as f64 * 100.0)
                                } else {
                                    0.0
                                },
                            }),
                        )
                    })
                    .collect::<serde_json::Map<_, _>>()
                    .into();
                let top_performers: Vec<Value> = result
                    .iter()
                    .take(3)
                    .map(|r| {
                        json!({
                            "name": json_str(r, "name"),
                            "completion_rate": r.get("completion_rate").and_then(Value::as_f64).unwrap_or(0.0),
                        })
                    })
                    .collect();
                Ok(ReportOutput::Json(json!({
                    "detailed": result,
                    "summary": {
                        "total_employees": result.len(),
                        "total_tasks": sum_of("total_tasks"),
                        "completed_tasks": sum_of("completed_tasks"),
                        "avg_completion_rate": avg_of("completion_rate"),
                        "avg_on_time_rate": avg_of("on_time_rate"),
                        "avg_completion_time": avg_of("avg_completion_time"),
                        "top_performers": top_performers,
                        "by_department": by_department,
                    },
                    "meta": {
                        "start_date": start,
                        "end_date": end,
                        "total_records": result.len(),
                    },
                })))
            }
        }
    }
}

fn json_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_fields_quote_commas_and_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn csv_rendering_includes_header_row() {
        let out = render_csv(
            &["Name", "Days"],
            &[vec!["Ada".to_string(), "3".to_string()]],
        );
        assert_eq!(out, "Name,Days\nAda,3\n");
    }

    #[test]
    fn report_format_parsing() {
        assert_eq!(ReportFormat::parse(None).unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::parse(Some("csv")).unwrap(), ReportFormat::Csv);
        assert!(ReportFormat::parse(Some("pdf")).is_err());
    }
}
