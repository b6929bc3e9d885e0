use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{employee, project, project_member, task};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{employee_for_user, paginate};

pub const PROJECT_STATUSES: &[&str] =
    &["planning", "in_progress", "on_hold", "completed", "cancelled"];

pub const MEMBER_ROLES: &[&str] = &["project manager", "team lead", "member"];

#[derive(Clone)]
pub struct ProjectService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct MemberSpec {
    pub employee_id: Uuid,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct MemberRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProjectDto {
    #[serde(flatten)]
    pub project: project::Model,
    pub task_completion_rate: f64,
    pub members: Vec<ProjectMemberDto>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProjectMemberDto {
    pub employee_id: Uuid,
    pub name: String,
    pub role: String,
    pub joined_at: chrono::NaiveDateTime,
}

fn validate_project_status(value: &str) -> Result<(), ServiceError> {
    if PROJECT_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatus(format!(
            "Invalid status: {}",
            value
        )))
    }
}

fn validate_member_role(value: &str) -> Result<(), ServiceError> {
    if MEMBER_ROLES.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "Invalid member role: {}",
            value
        )))
    }
}

/// Share of completed tasks, as a percentage rounded to two decimals.
pub(crate) fn completion_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

impl ProjectService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        ProjectService { db, event_sender }
    }

    async fn load(&self, id: Uuid) -> Result<project::Model, ServiceError> {
        project::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Project".to_string()))
    }

    async fn membership(
        &self,
        project_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Option<project_member::Model>, ServiceError> {
        Ok(project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_id))
            .filter(project_member::Column::EmployeeId.eq(employee_id))
            .one(self.db.as_ref())
            .await?)
    }

    /// Member of the project, its creator, admin, or HR.
    pub(crate) async fn can_access(
        &self,
        auth: &AuthUser,
        project: &project::Model,
        employee_id: Uuid,
    ) -> Result<bool, ServiceError> {
        if auth.is_people_ops() || project.created_by == employee_id {
            return Ok(true);
        }
        Ok(self.membership(project.id, employee_id).await?.is_some())
    }

    /// Creator, a member with the project manager role, admin, or HR.
    async fn can_manage(
        &self,
        auth: &AuthUser,
        project: &project::Model,
        employee_id: Uuid,
    ) -> Result<bool, ServiceError> {
        if auth.is_people_ops() || project.created_by == employee_id {
            return Ok(true);
        }
        Ok(self
            .membership(project.id, employee_id)
            .await?
            .map(|m| m.role == "project manager")
            .unwrap_or(false))
    }

    async fn member_dtos(&self, project_id: Uuid) -> Result<Vec<ProjectMemberDto>, ServiceError> {
        let memberships = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_id))
            .all(self.db.as_ref())
            .await?;
        let mut members = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let employee = membership
                .find_related(employee::Entity)
                .one(self.db.as_ref())
                .await?;
            if let Some(employee) = employee {
                members.push(ProjectMemberDto {
                    employee_id: employee.id,
                    name: employee.full_name(),
                    role: membership.role,
                    joined_at: membership.joined_at,
                });
            }
        }
        Ok(members)
    }

    async fn to_dto(&self, model: project::Model) -> Result<ProjectDto, ServiceError> {
        let total = task::Entity::find()
            .filter(task::Column::ProjectId.eq(model.id))
            .count(self.db.as_ref())
            .await?;
        let completed = task::Entity::find()
            .filter(task::Column::ProjectId.eq(model.id))
            .filter(task::Column::Status.eq("completed"))
            .count(self.db.as_ref())
            .await?;

        let members = self.member_dtos(model.id).await?;

        Ok(ProjectDto {
            project: model,
            task_completion_rate: completion_rate(completed, total),
            members,
        })
    }

    /// Admin and HR see every project; everyone else sees projects they
    /// created or belong to.
    #[instrument(skip(self, auth, query))]
    pub async fn list(
        &self,
        auth: &AuthUser,
        query: ProjectListQuery,
    ) -> Result<PaginatedResponse<ProjectDto>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);
        let employee = employee_for_user(self.db.as_ref(), auth).await?;

        let mut finder = project::Entity::find();
        if !auth.is_people_ops() {
            let member_project_ids: Vec<Uuid> = project_member::Entity::find()
                .filter(project_member::Column::EmployeeId.eq(employee.id))
                .all(self.db.as_ref())
                .await?
                .into_iter()
                .map(|m| m.project_id)
                .collect();
            finder = finder.filter(
                Condition::any()
                    .add(project::Column::Id.is_in(member_project_ids))
                    .add(project::Column::CreatedBy.eq(employee.id)),
            );
        }

        if let Some(status) = query.status.as_deref() {
            validate_project_status(status)?;
            finder = finder.filter(project::Column::Status.eq(status));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            finder = finder.filter(
                Condition::any()
                    .add(project::Column::Name.contains(search))
                    .add(project::Column::Description.contains(search)),
            );
        }

        let paginator = finder
            .order_by_desc(project::Column::StartDate)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut items = Vec::with_capacity(models.len());
        for model in models {
            items.push(self.to_dto(model).await?);
        }
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth), fields(project_id = %id))]
    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<ProjectDto, ServiceError> {
        let project = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_access(auth, &project, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have access to this project".to_string(),
            ));
        }
        self.to_dto(project).await
    }

    #[instrument(skip(self, auth), fields(project_id = %id))]
    pub async fn list_members(
        &self,
        auth: &AuthUser,
        id: Uuid,
    ) -> Result<Vec<ProjectMemberDto>, ServiceError> {
        let project = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_access(auth, &project, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have access to this project".to_string(),
            ));
        }
        self.member_dtos(project.id).await
    }

    /// Creates the project with the caller as project manager, plus any
    /// extra members, in one transaction.
    #[instrument(skip(self, auth, request))]
    pub async fn create(
        &self,
        auth: &AuthUser,
        request: CreateProjectRequest,
    ) -> Result<ProjectDto, ServiceError> {
        let creator = employee_for_user(self.db.as_ref(), auth).await?;
        let status = request.status.unwrap_or_else(|| "planning".to_string());
        validate_project_status(&status)?;
        if request.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Project name is required".to_string(),
            ));
        }
        for member in &request.members {
            if let Some(role) = member.role.as_deref() {
                validate_member_role(role)?;
            }
        }

        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;

        let model = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            status: Set(status),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            budget: Set(request.budget),
            created_by: Set(creator.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        project_member::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(model.id),
            employee_id: Set(creator.id),
            role: Set("project manager".to_string()),
            joined_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for member in request.members {
            if member.employee_id == creator.id {
                continue;
            }
            project_member::ActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(model.id),
                employee_id: Set(member.employee_id),
                role: Set(member.role.unwrap_or_else(|| "member".to_string())),
                joined_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit project creation");
            ServiceError::DatabaseError(e)
        })?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::ProjectCreated {
                    project_id: model.id,
                })
                .await?;
        }
        info!(project_id = %model.id, "project created");
        self.to_dto(model).await
    }

    #[instrument(skip(self, auth, request), fields(project_id = %id))]
    pub async fn update(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateProjectRequest,
    ) -> Result<ProjectDto, ServiceError> {
        let project = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_manage(auth, &project, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have permission to update this project".to_string(),
            ));
        }

        let mut active: project::ActiveModel = project.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(status) = request.status {
            validate_project_status(&status)?;
            active.status = Set(status);
        }
        if let Some(start_date) = request.start_date {
            active.start_date = Set(Some(start_date));
        }
        if let Some(end_date) = request.end_date {
            active.end_date = Set(Some(end_date));
        }
        if let Some(budget) = request.budget {
            active.budget = Set(Some(budget));
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let updated = active.update(self.db.as_ref()).await?;
        self.to_dto(updated).await
    }

    /// Projects with tasks are marked cancelled instead of removed so the
    /// task history stays intact.
    #[instrument(skip(self, auth), fields(project_id = %id))]
    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> Result<String, ServiceError> {
        let project = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !auth.is_people_ops() && project.created_by != employee.id {
            return Err(ServiceError::Forbidden(
                "You don't have permission to delete this project".to_string(),
            ));
        }

        let task_count = task::Entity::find()
            .filter(task::Column::ProjectId.eq(id))
            .count(self.db.as_ref())
            .await?;

        if task_count > 0 {
            let mut active: project::ActiveModel = project.into();
            active.status = Set("cancelled".to_string());
            active.updated_at = Set(Utc::now().naive_utc());
            active.update(self.db.as_ref()).await?;
            return Ok("Project marked as cancelled because it has associated tasks".to_string());
        }

        project::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok("Project deleted successfully".to_string())
    }

    #[instrument(skip(self, auth), fields(project_id = %project_id))]
    pub async fn add_member(
        &self,
        auth: &AuthUser,
        project_id: Uuid,
        spec: MemberSpec,
    ) -> Result<project_member::Model, ServiceError> {
        let project = self.load(project_id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_manage(auth, &project, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have permission to add members to this project".to_string(),
            ));
        }

        employee::Entity::find_by_id(spec.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        if self.membership(project_id, spec.employee_id).await?.is_some() {
            return Err(ServiceError::BadRequest(
                "Employee is already a member of this project".to_string(),
            ));
        }

        let role = spec.role.unwrap_or_else(|| "member".to_string());
        validate_member_role(&role)?;

        let model = project_member::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id),
            employee_id: Set(spec.employee_id),
            role: Set(role),
            joined_at: Set(Utc::now().naive_utc()),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model)
    }

    #[instrument(skip(self, auth), fields(project_id = %project_id, member_id = %member_employee_id))]
    pub async fn remove_member(
        &self,
        auth: &AuthUser,
        project_id: Uuid,
        member_employee_id: Uuid,
    ) -> Result<(), ServiceError> {
        let project = self.load(project_id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_manage(auth, &project, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have permission to remove members from this project".to_string(),
            ));
        }

        let membership = self
            .membership(project_id, member_employee_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Employee is not a member of this project".to_string())
            })?;

        if project.created_by == member_employee_id && membership.role == "project manager" {
            return Err(ServiceError::BadRequest(
                "Cannot remove the project creator".to_string(),
            ));
        }

        project_member::Entity::delete_by_id(membership.id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    #[instrument(skip(self, auth, request), fields(project_id = %project_id))]
    pub async fn update_member_role(
        &self,
        auth: &AuthUser,
        project_id: Uuid,
        member_employee_id: Uuid,
        request: MemberRoleRequest,
    ) -> Result<project_member::Model, ServiceError> {
        let project = self.load(project_id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_manage(auth, &project, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have permission to update member roles in this project".to_string(),
            ));
        }

        validate_member_role(&request.role)?;
        let membership = self
            .membership(project_id, member_employee_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Employee is not a member of this project".to_string())
            })?;

        let mut active: project_member::ActiveModel = membership.into();
        active.role = Set(request.role);
        Ok(active.update(self.db.as_ref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_handles_empty_projects() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(3, 4), 75.0);
        assert_eq!(completion_rate(1, 3), 33.33);
    }

    #[test]
    fn status_and_role_validation() {
        assert!(validate_project_status("planning").is_ok());
        assert!(validate_project_status("archived").is_err());
        assert!(validate_member_role("team lead").is_ok());
        assert!(validate_member_role("intern").is_err());
    }
}
