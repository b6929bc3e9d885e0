use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, AuthUser};
use crate::db::DbPool;
use crate::entities::{department, employee, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{can_view_employee, employee_for_user, paginate};

/// Accounts created without an explicit password start with this value and
/// are expected to change it at first login.
const DEFAULT_INITIAL_PASSWORD: &str = "changeme";

#[derive(Clone)]
pub struct EmployeeService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateEmployeeRequest {
    #[validate(email)]
    pub email: String,
    pub password: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(length(min = 1, max = 20))]
    pub employee_number: String,
    pub position: Option<String>,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_joining: NaiveDate,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateEmployeeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub department_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EmployeeDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_number: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub position: Option<String>,
    pub department_id: Option<Uuid>,
    pub department: Option<String>,
    pub manager_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_joining: NaiveDate,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub profile_image: Option<String>,
}

impl EmployeeDto {
    fn from_model(model: employee::Model, department: Option<String>) -> Self {
        EmployeeDto {
            id: model.id,
            user_id: model.user_id,
            employee_number: model.employee_number.clone(),
            full_name: model.full_name(),
            first_name: model.first_name,
            last_name: model.last_name,
            position: model.position,
            department_id: model.department_id,
            department,
            manager_id: model.manager_id,
            date_of_birth: model.date_of_birth,
            date_of_joining: model.date_of_joining,
            phone_number: model.phone_number,
            address: model.address,
            gender: model.gender,
            profile_image: model.profile_image,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct DepartmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

impl EmployeeService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        EmployeeService { db, event_sender }
    }

    async fn department_name(&self, id: Option<Uuid>) -> Result<Option<String>, ServiceError> {
        match id {
            Some(dept_id) => Ok(department::Entity::find_by_id(dept_id)
                .one(self.db.as_ref())
                .await?
                .map(|d| d.name)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: EmployeeListQuery,
    ) -> Result<PaginatedResponse<EmployeeDto>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = employee::Entity::find();
        if let Some(dept_id) = query.department_id {
            finder = finder.filter(employee::Column::DepartmentId.eq(dept_id));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            finder = finder.filter(
                Condition::any()
                    .add(employee::Column::FirstName.contains(search))
                    .add(employee::Column::LastName.contains(search))
                    .add(employee::Column::EmployeeNumber.contains(search))
                    .add(employee::Column::Position.contains(search)),
            );
        }

        let paginator = finder
            .order_by_asc(employee::Column::LastName)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut items = Vec::with_capacity(models.len());
        for model in models {
            let dept = self.department_name(model.department_id).await?;
            items.push(EmployeeDto::from_model(model, dept));
        }

        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth), fields(employee_id = %id))]
    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<EmployeeDto, ServiceError> {
        let target = employee::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        if !can_view_employee(auth, auth.employee_id, &target) {
            return Err(ServiceError::Forbidden(
                "You don't have permission to view this employee".to_string(),
            ));
        }

        let dept = self.department_name(target.department_id).await?;
        Ok(EmployeeDto::from_model(target, dept))
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateEmployeeRequest) -> Result<EmployeeDto, ServiceError> {
        request.validate()?;

        if user::Entity::find()
            .filter(user::Column::Email.eq(&request.email))
            .one(self.db.as_ref())
            .await?
            .is_some()
        {
            return Err(ServiceError::BadRequest("Email already exists".to_string()));
        }
        if employee::Entity::find()
            .filter(employee::Column::EmployeeNumber.eq(&request.employee_number))
            .one(self.db.as_ref())
            .await?
            .is_some()
        {
            return Err(ServiceError::BadRequest(
                "Employee ID already exists".to_string(),
            ));
        }

        let password = request
            .password
            .as_deref()
            .unwrap_or(DEFAULT_INITIAL_PASSWORD);
        let password_hash =
            hash_password(password).map_err(|e| ServiceError::HashError(e.to_string()))?;

        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;

        let new_user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(request.email),
            password_hash: Set(password_hash),
            role: Set("employee".to_string()),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let new_employee = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new_user.id),
            department_id: Set(request.department_id),
            first_name: Set(request.first_name),
            last_name: Set(request.last_name),
            employee_number: Set(request.employee_number),
            position: Set(request.position),
            date_of_birth: Set(request.date_of_birth),
            date_of_joining: Set(request.date_of_joining),
            phone_number: Set(request.phone_number),
            address: Set(request.address),
            gender: Set(request.gender),
            manager_id: Set(request.manager_id),
            profile_image: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit employee creation");
            ServiceError::DatabaseError(e)
        })?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::EmployeeCreated {
                    employee_id: new_employee.id,
                })
                .await?;
        }
        info!(employee_id = %new_employee.id, "employee created");

        let dept = self.department_name(new_employee.department_id).await?;
        Ok(EmployeeDto::from_model(new_employee, dept))
    }

    /// Field level authorization: admin and HR may change anything, managers
    /// may change contact and name fields of their reports, everyone else may
    /// change only their own contact fields. Disallowed fields are silently
    /// ignored.
    #[instrument(skip(self, auth, request), fields(employee_id = %id))]
    pub async fn update(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateEmployeeRequest,
    ) -> Result<EmployeeDto, ServiceError> {
        let target = employee::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        let is_self = auth.employee_id == Some(target.id);
        let is_report = auth.has_role("manager") && target.manager_id == auth.employee_id;
        if !auth.is_people_ops() && !is_self && !is_report {
            return Err(ServiceError::Forbidden(
                "You don't have permission to update this employee".to_string(),
            ));
        }

        let mut active: employee::ActiveModel = target.into();
        let full_access = auth.is_people_ops();
        let name_access = full_access || is_report;

        if let Some(first_name) = request.first_name.filter(|_| name_access) {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = request.last_name.filter(|_| name_access) {
            active.last_name = Set(last_name);
        }
        if let Some(phone) = request.phone_number {
            active.phone_number = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if full_access {
            if let Some(position) = request.position {
                active.position = Set(Some(position));
            }
            if let Some(dept_id) = request.department_id {
                active.department_id = Set(Some(dept_id));
            }
            if let Some(manager_id) = request.manager_id {
                active.manager_id = Set(Some(manager_id));
            }
            if let Some(dob) = request.date_of_birth {
                active.date_of_birth = Set(Some(dob));
            }
            if let Some(gender) = request.gender {
                active.gender = Set(Some(gender));
            }
            if let Some(image) = request.profile_image {
                active.profile_image = Set(Some(image));
            }
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let updated = active.update(self.db.as_ref()).await?;
        let dept = self.department_name(updated.department_id).await?;
        Ok(EmployeeDto::from_model(updated, dept))
    }

    /// Soft delete: the login account is disabled, the profile and history
    /// stay intact.
    #[instrument(skip(self), fields(employee_id = %id))]
    pub async fn deactivate(&self, id: Uuid) -> Result<(), ServiceError> {
        let target = employee::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        let account = user::Entity::find_by_id(target.user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

        let mut active: user::ActiveModel = account.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::EmployeeDeactivated { employee_id: id })
                .await?;
        }
        info!(employee_id = %id, "employee deactivated");
        Ok(())
    }

    pub async fn my_profile(&self, auth: &AuthUser) -> Result<EmployeeDto, ServiceError> {
        let model = employee_for_user(self.db.as_ref(), auth).await?;
        let dept = self.department_name(model.department_id).await?;
        Ok(EmployeeDto::from_model(model, dept))
    }

    // Departments.

    pub async fn list_departments(&self) -> Result<Vec<department::Model>, ServiceError> {
        Ok(department::Entity::find()
            .order_by_asc(department::Column::Name)
            .all(self.db.as_ref())
            .await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_department(
        &self,
        request: DepartmentRequest,
    ) -> Result<department::Model, ServiceError> {
        request.validate()?;

        if department::Entity::find()
            .filter(department::Column::Name.eq(&request.name))
            .one(self.db.as_ref())
            .await?
            .is_some()
        {
            return Err(ServiceError::BadRequest(
                "Department already exists".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let model = department::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, request), fields(department_id = %id))]
    pub async fn update_department(
        &self,
        id: Uuid,
        request: DepartmentRequest,
    ) -> Result<department::Model, ServiceError> {
        request.validate()?;

        let existing = department::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Department".to_string()))?;

        let clash = department::Entity::find()
            .filter(department::Column::Name.eq(&request.name))
            .filter(department::Column::Id.ne(id))
            .one(self.db.as_ref())
            .await?;
        if clash.is_some() {
            return Err(ServiceError::BadRequest(
                "Department name already exists".to_string(),
            ));
        }

        let mut active: department::ActiveModel = existing.into();
        active.name = Set(request.name);
        active.description = Set(request.description);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    #[instrument(skip(self), fields(department_id = %id))]
    pub async fn delete_department(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = department::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Department".to_string()))?;

        let assigned = employee::Entity::find()
            .filter(employee::Column::DepartmentId.eq(id))
            .count(self.db.as_ref())
            .await?;
        if assigned > 0 {
            return Err(ServiceError::BadRequest(
                "Cannot delete department with assigned employees".to_string(),
            ));
        }

        department::Entity::delete_by_id(existing.id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
