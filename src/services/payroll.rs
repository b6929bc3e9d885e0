use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{department, employee, payroll, salary};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{employee_for_user, paginate};

pub const SALARY_TYPES: &[&str] = &["fixed", "hourly"];
pub const PAY_FREQUENCIES: &[&str] = &["monthly", "biweekly", "weekly"];

#[derive(Clone)]
pub struct PayrollService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateSalaryRequest {
    pub employee_id: Uuid,
    pub base_salary: Decimal,
    pub salary_type: Option<String>,
    pub frequency: Option<String>,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreatePayrollRequest {
    pub employee_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: Decimal,
    #[serde(default)]
    pub overtime_hours: f64,
    #[serde(default)]
    pub overtime_amount: Decimal,
    #[serde(default)]
    pub bonus: Decimal,
    #[serde(default)]
    pub deductions: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    pub bonus_description: Option<String>,
    pub deduction_description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdatePayrollRequest {
    pub base_salary: Option<Decimal>,
    pub overtime_hours: Option<f64>,
    pub overtime_amount: Option<Decimal>,
    pub bonus: Option<Decimal>,
    pub deductions: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub bonus_description: Option<String>,
    pub deduction_description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayrollListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PayslipRequest {
    pub payroll_id: Uuid,
    #[serde(default = "default_true")]
    pub include_breakdown: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Payslip {
    pub employee: PayslipEmployee,
    pub period: String,
    pub base_salary: Decimal,
    pub overtime_hours: f64,
    pub overtime_amount: Decimal,
    pub bonus: Decimal,
    pub bonus_description: Option<String>,
    pub deductions: Decimal,
    pub deduction_description: Option<String>,
    pub tax: Decimal,
    pub net_amount: Decimal,
    pub include_breakdown: bool,
    pub generated_at: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PayslipEmployee {
    pub name: String,
    pub employee_number: String,
    pub position: Option<String>,
    pub department: Option<String>,
}

/// Net pay is always derived server side.
pub(crate) fn net_amount(
    base: Decimal,
    overtime: Decimal,
    bonus: Decimal,
    deductions: Decimal,
    tax: Decimal,
) -> Decimal {
    base + overtime + bonus - deductions - tax
}

const PAYROLL_STATUSES: &[&str] = &["draft", "processed", "paid", "cancelled"];

impl PayrollService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        PayrollService { db, event_sender }
    }

    async fn load(&self, id: Uuid) -> Result<payroll::Model, ServiceError> {
        payroll::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payroll".to_string()))
    }

    // Salaries.

    pub async fn list_salaries(
        &self,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<PaginatedResponse<salary::Model>, ServiceError> {
        let (page, limit) = paginate(page, limit);
        let paginator = salary::Entity::find()
            .order_by_desc(salary::Column::EffectiveDate)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    /// Salaries with no end date, one per employee.
    pub async fn current_salaries(&self) -> Result<Vec<salary::Model>, ServiceError> {
        Ok(salary::Entity::find()
            .filter(salary::Column::EndDate.is_null())
            .order_by_desc(salary::Column::EffectiveDate)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn salary_history(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<salary::Model>, ServiceError> {
        employee::Entity::find_by_id(employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;
        Ok(salary::Entity::find()
            .filter(salary::Column::EmployeeId.eq(employee_id))
            .order_by_desc(salary::Column::EffectiveDate)
            .all(self.db.as_ref())
            .await?)
    }

    /// Creating a salary closes the employee's current open salary the day
    /// before the new one takes effect.
    #[instrument(skip(self, auth, request))]
    pub async fn create_salary(
        &self,
        auth: &AuthUser,
        request: CreateSalaryRequest,
    ) -> Result<salary::Model, ServiceError> {
        let creator = employee_for_user(self.db.as_ref(), auth).await?;
        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        let salary_type = request.salary_type.unwrap_or_else(|| "fixed".to_string());
        if !SALARY_TYPES.contains(&salary_type.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid salary type: {}",
                salary_type
            )));
        }
        let frequency = request.frequency.unwrap_or_else(|| "monthly".to_string());
        if !PAY_FREQUENCIES.contains(&frequency.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid pay frequency: {}",
                frequency
            )));
        }

        let current = salary::Entity::find()
            .filter(salary::Column::EmployeeId.eq(request.employee_id))
            .filter(salary::Column::EndDate.is_null())
            .one(self.db.as_ref())
            .await?;
        if let Some(current) = current {
            if current.effective_date < request.effective_date {
                let mut active: salary::ActiveModel = current.into();
                active.end_date = Set(Some(request.effective_date - Duration::days(1)));
                active.updated_at = Set(Utc::now().naive_utc());
                active.update(self.db.as_ref()).await?;
            }
        }

        let now = Utc::now().naive_utc();
        let model = salary::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            base_salary: Set(request.base_salary),
            salary_type: Set(salary_type),
            frequency: Set(frequency),
            effective_date: Set(request.effective_date),
            end_date: Set(request.end_date),
            created_by: Set(creator.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(salary_id = %model.id, "salary created");
        Ok(model)
    }

    // Payrolls.

    pub async fn list_payrolls(
        &self,
        query: PayrollListQuery,
    ) -> Result<PaginatedResponse<payroll::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = payroll::Entity::find();
        if let Some(employee_id) = query.employee_id {
            finder = finder.filter(payroll::Column::EmployeeId.eq(employee_id));
        }
        if let Some(status) = query.status.as_deref() {
            if !PAYROLL_STATUSES.contains(&status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Invalid status: {}",
                    status
                )));
            }
            finder = finder.filter(payroll::Column::Status.eq(status));
        }

        let paginator = finder
            .order_by_desc(payroll::Column::PeriodEnd)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    pub async fn get_payroll(
        &self,
        auth: &AuthUser,
        id: Uuid,
    ) -> Result<payroll::Model, ServiceError> {
        let record = self.load(id).await?;
        if !auth.is_people_ops() && auth.employee_id != Some(record.employee_id) {
            return Err(ServiceError::Forbidden(
                "You don't have permission to view this payroll".to_string(),
            ));
        }
        Ok(record)
    }

    pub async fn my_payrolls(
        &self,
        auth: &AuthUser,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<PaginatedResponse<payroll::Model>, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let (page, limit) = paginate(page, limit);
        let paginator = payroll::Entity::find()
            .filter(payroll::Column::EmployeeId.eq(employee.id))
            .order_by_desc(payroll::Column::PeriodEnd)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create_payroll(
        &self,
        auth: &AuthUser,
        request: CreatePayrollRequest,
    ) -> Result<payroll::Model, ServiceError> {
        let creator = employee_for_user(self.db.as_ref(), auth).await?;
        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        if request.period_start > request.period_end {
            return Err(ServiceError::BadRequest(
                "Period start must be before period end".to_string(),
            ));
        }

        let net = net_amount(
            request.base_salary,
            request.overtime_amount,
            request.bonus,
            request.deductions,
            request.tax,
        );

        let now = Utc::now().naive_utc();
        let model = payroll::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            period_start: Set(request.period_start),
            period_end: Set(request.period_end),
            base_salary: Set(request.base_salary),
            overtime_hours: Set(request.overtime_hours),
            overtime_amount: Set(request.overtime_amount),
            bonus: Set(request.bonus),
            deductions: Set(request.deductions),
            tax: Set(request.tax),
            bonus_description: Set(request.bonus_description),
            deduction_description: Set(request.deduction_description),
            net_amount: Set(net),
            status: Set("draft".to_string()),
            payment_date: Set(None),
            notes: Set(request.notes),
            created_by: Set(creator.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(payroll_id = %model.id, "payroll created");
        Ok(model)
    }

    #[instrument(skip(self, request), fields(payroll_id = %id))]
    pub async fn update_payroll(
        &self,
        id: Uuid,
        request: UpdatePayrollRequest,
    ) -> Result<payroll::Model, ServiceError> {
        let existing = self.load(id).await?;
        if existing.status == "paid" {
            return Err(ServiceError::BadRequest(
                "Cannot update a payroll that has been paid".to_string(),
            ));
        }

        let base = request.base_salary.unwrap_or(existing.base_salary);
        let overtime = request.overtime_amount.unwrap_or(existing.overtime_amount);
        let bonus = request.bonus.unwrap_or(existing.bonus);
        let deductions = request.deductions.unwrap_or(existing.deductions);
        let tax = request.tax.unwrap_or(existing.tax);

        let mut active: payroll::ActiveModel = existing.into();
        active.base_salary = Set(base);
        if let Some(hours) = request.overtime_hours {
            active.overtime_hours = Set(hours);
        }
        active.overtime_amount = Set(overtime);
        active.bonus = Set(bonus);
        active.deductions = Set(deductions);
        active.tax = Set(tax);
        if let Some(desc) = request.bonus_description {
            active.bonus_description = Set(Some(desc));
        }
        if let Some(desc) = request.deduction_description {
            active.deduction_description = Set(Some(desc));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.net_amount = Set(net_amount(base, overtime, bonus, deductions, tax));
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(self.db.as_ref()).await?)
    }

    #[instrument(skip(self), fields(payroll_id = %id))]
    pub async fn process(&self, id: Uuid) -> Result<payroll::Model, ServiceError> {
        let existing = self.load(id).await?;
        if existing.status != "draft" {
            return Err(ServiceError::InvalidStatus(
                "Only draft payrolls can be processed".to_string(),
            ));
        }
        let employee_id = existing.employee_id;
        let mut active: payroll::ActiveModel = existing.into();
        active.status = Set("processed".to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::PayrollProcessed {
                    payroll_id: id,
                    employee_id,
                })
                .await?;
        }
        Ok(model)
    }

    #[instrument(skip(self), fields(payroll_id = %id))]
    pub async fn mark_paid(&self, id: Uuid) -> Result<payroll::Model, ServiceError> {
        let existing = self.load(id).await?;
        if existing.status != "processed" {
            return Err(ServiceError::InvalidStatus(
                "Only processed payrolls can be marked as paid".to_string(),
            ));
        }
        let employee_id = existing.employee_id;
        let mut active: payroll::ActiveModel = existing.into();
        active.status = Set("paid".to_string());
        active.payment_date = Set(Some(Utc::now().naive_utc().date()));
        active.updated_at = Set(Utc::now().naive_utc());
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::PayrollPaid {
                    payroll_id: id,
                    employee_id,
                })
                .await?;
        }
        Ok(model)
    }

    #[instrument(skip(self), fields(payroll_id = %id))]
    pub async fn cancel(&self, id: Uuid) -> Result<payroll::Model, ServiceError> {
        let existing = self.load(id).await?;
        if existing.status == "paid" {
            return Err(ServiceError::InvalidStatus(
                "Cannot cancel a payroll that has been paid".to_string(),
            ));
        }
        let mut active: payroll::ActiveModel = existing.into();
        active.status = Set("cancelled".to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Payslip as structured JSON. PDF rendering is left to callers.
    #[instrument(skip(self, auth, request))]
    pub async fn generate_payslip(
        &self,
        auth: &AuthUser,
        request: PayslipRequest,
    ) -> Result<Payslip, ServiceError> {
        let record = self.load(request.payroll_id).await?;
        let employee = employee::Entity::find_by_id(record.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        if !auth.is_people_ops() && employee.user_id != auth.id {
            return Err(ServiceError::Forbidden(
                "You don't have permission to generate this payslip".to_string(),
            ));
        }

        let dept_name = match employee.department_id {
            Some(dept_id) => department::Entity::find_by_id(dept_id)
                .one(self.db.as_ref())
                .await?
                .map(|d| d.name),
            None => None,
        };

        Ok(Payslip {
            employee: PayslipEmployee {
                name: employee.full_name(),
                employee_number: employee.employee_number,
                position: employee.position,
                department: dept_name,
            },
            period: format!("{} to {}", record.period_start, record.period_end),
            base_salary: record.base_salary,
            overtime_hours: record.overtime_hours,
            overtime_amount: record.overtime_amount,
            bonus: record.bonus,
            bonus_description: record.bonus_description,
            deductions: record.deductions,
            deduction_description: record.deduction_description,
            tax: record.tax,
            net_amount: record.net_amount,
            include_breakdown: request.include_breakdown,
            generated_at: Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn net_amount_combines_components() {
        assert_eq!(
            net_amount(dec!(5000), dec!(250), dec!(500), dec!(100), dec!(1200)),
            dec!(4450)
        );
        assert_eq!(
            net_amount(dec!(3000), dec!(0), dec!(0), dec!(0), dec!(0)),
            dec!(3000)
        );
    }
}
