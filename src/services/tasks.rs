use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    sea_query::NullOrdering, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{
    employee, employee_reward, project, project_member, task, task_comment, task_reward,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{employee_for_user, paginate};

pub const TASK_STATUSES: &[&str] = &["backlog", "todo", "in_progress", "review", "completed"];
pub const TASK_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

#[derive(Clone)]
pub struct TaskService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub progress: Option<i32>,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub progress: Option<i32>,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CommentRequest {
    pub comment: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskCommentDto {
    #[serde(flatten)]
    pub comment: task_comment::Model,
    pub author: String,
}

fn validate_task_status(value: &str) -> Result<(), ServiceError> {
    if TASK_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatus(format!(
            "Invalid status: {}",
            value
        )))
    }
}

fn validate_priority(value: &str) -> Result<(), ServiceError> {
    if TASK_PRIORITIES.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "Invalid priority: {}",
            value
        )))
    }
}

fn validate_progress(value: i32) -> Result<(), ServiceError> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(
            "Progress must be between 0 and 100".to_string(),
        ))
    }
}

impl TaskService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        TaskService { db, event_sender }
    }

    async fn load(&self, id: Uuid) -> Result<task::Model, ServiceError> {
        task::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task".to_string()))
    }

    async fn load_project(&self, id: Uuid) -> Result<project::Model, ServiceError> {
        project::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Project".to_string()))
    }

    async fn membership_role(
        &self,
        project_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Option<String>, ServiceError> {
        Ok(project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_id))
            .filter(project_member::Column::EmployeeId.eq(employee_id))
            .one(self.db.as_ref())
            .await?
            .map(|m| m.role))
    }

    async fn accessible_project_ids(&self, employee_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let mut ids: Vec<Uuid> = project_member::Entity::find()
            .filter(project_member::Column::EmployeeId.eq(employee_id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|m| m.project_id)
            .collect();
        let created: Vec<Uuid> = project::Entity::find()
            .filter(project::Column::CreatedBy.eq(employee_id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.extend(created);
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn can_access_task(
        &self,
        auth: &AuthUser,
        task: &task::Model,
        employee_id: Uuid,
    ) -> Result<bool, ServiceError> {
        if auth.is_people_ops()
            || task.assignee_id == Some(employee_id)
            || task.created_by == employee_id
        {
            return Ok(true);
        }
        let project = self.load_project(task.project_id).await?;
        if project.created_by == employee_id {
            return Ok(true);
        }
        Ok(self
            .membership_role(task.project_id, employee_id)
            .await?
            .is_some())
    }

    async fn ensure_assignee_in_project(
        &self,
        project: &project::Model,
        assignee_id: Uuid,
    ) -> Result<(), ServiceError> {
        employee::Entity::find_by_id(assignee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Assignee".to_string()))?;

        let is_member = self
            .membership_role(project.id, assignee_id)
            .await?
            .is_some();
        if !is_member && project.created_by != assignee_id {
            return Err(ServiceError::BadRequest(
                "Assignee is not a member of this project".to_string(),
            ));
        }
        Ok(())
    }

    /// On completion, materialize any rewards attached to the task for its
    /// assignee.
    async fn grant_rewards(&self, task: &task::Model) -> Result<(), ServiceError> {
        let Some(assignee_id) = task.assignee_id else {
            return Ok(());
        };
        let rewards = task_reward::Entity::find()
            .filter(task_reward::Column::TaskId.eq(task.id))
            .all(self.db.as_ref())
            .await?;
        for reward in rewards {
            let already = employee_reward::Entity::find()
                .filter(employee_reward::Column::EmployeeId.eq(assignee_id))
                .filter(employee_reward::Column::TaskRewardId.eq(reward.id))
                .one(self.db.as_ref())
                .await?;
            if already.is_none() {
                employee_reward::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    employee_id: Set(assignee_id),
                    task_reward_id: Set(reward.id),
                    claimed: Set(false),
                    earned_at: Set(Utc::now().naive_utc()),
                    claimed_at: Set(None),
                }
                .insert(self.db.as_ref())
                .await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, auth, query))]
    pub async fn list(
        &self,
        auth: &AuthUser,
        query: TaskListQuery,
    ) -> Result<PaginatedResponse<task::Model>, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = task::Entity::find();
        if !auth.is_people_ops() {
            let project_ids = self.accessible_project_ids(employee.id).await?;
            finder = finder.filter(
                Condition::any()
                    .add(task::Column::ProjectId.is_in(project_ids))
                    .add(task::Column::AssigneeId.eq(employee.id))
                    .add(task::Column::CreatedBy.eq(employee.id)),
            );
        }

        if let Some(project_id) = query.project_id {
            finder = finder.filter(task::Column::ProjectId.eq(project_id));
        }
        if let Some(assignee_id) = query.assignee_id {
            finder = finder.filter(task::Column::AssigneeId.eq(assignee_id));
        }
        if let Some(status) = query.status.as_deref() {
            validate_task_status(status)?;
            finder = finder.filter(task::Column::Status.eq(status));
        }
        if let Some(priority) = query.priority.as_deref() {
            validate_priority(priority)?;
            finder = finder.filter(task::Column::Priority.eq(priority));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            finder = finder.filter(
                Condition::any()
                    .add(task::Column::Title.contains(search))
                    .add(task::Column::Description.contains(search)),
            );
        }

        let paginator = finder
            .order_by_with_nulls(task::Column::DueDate, Order::Asc, NullOrdering::Last)
            .order_by_desc(task::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth), fields(task_id = %id))]
    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<task::Model, ServiceError> {
        let task = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_access_task(auth, &task, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have access to this task".to_string(),
            ));
        }
        Ok(task)
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create(
        &self,
        auth: &AuthUser,
        request: CreateTaskRequest,
    ) -> Result<task::Model, ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let project = self.load_project(request.project_id).await?;

        let can_create = auth.is_people_ops()
            || project.created_by == employee.id
            || self
                .membership_role(project.id, employee.id)
                .await?
                .is_some();
        if !can_create {
            return Err(ServiceError::Forbidden(
                "You don't have permission to create tasks in this project".to_string(),
            ));
        }

        if request.title.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Task title is required".to_string(),
            ));
        }
        let status = request.status.unwrap_or_else(|| "todo".to_string());
        validate_task_status(&status)?;
        let priority = request.priority.unwrap_or_else(|| "medium".to_string());
        validate_priority(&priority)?;
        let progress = request.progress.unwrap_or(0);
        validate_progress(progress)?;

        if let Some(assignee_id) = request.assignee_id {
            self.ensure_assignee_in_project(&project, assignee_id)
                .await?;
        }

        let now = Utc::now().naive_utc();
        let completed_at = (status == "completed").then_some(now);
        let model = task::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(request.title),
            description: Set(request.description),
            project_id: Set(project.id),
            assignee_id: Set(request.assignee_id),
            created_by: Set(employee.id),
            status: Set(status),
            priority: Set(priority),
            progress: Set(progress),
            estimated_hours: Set(request.estimated_hours),
            due_date: Set(request.due_date),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(completed_at),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(task_id = %model.id, "task created");
        Ok(model)
    }

    /// Authorization tiers: admin and HR, project managers, the project
    /// creator, and the task creator may change anything. Assignees may only
    /// change status, progress, and estimated hours.
    #[instrument(skip(self, auth, request), fields(task_id = %id))]
    pub async fn update(
        &self,
        auth: &AuthUser,
        id: Uuid,
        mut request: UpdateTaskRequest,
    ) -> Result<task::Model, ServiceError> {
        let existing = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let project = self.load_project(existing.project_id).await?;

        let is_manager = self
            .membership_role(existing.project_id, employee.id)
            .await?
            .map(|r| r == "project manager")
            .unwrap_or(false);
        let full_access = auth.is_people_ops()
            || is_manager
            || project.created_by == employee.id
            || existing.created_by == employee.id;

        if !full_access {
            if existing.assignee_id == Some(employee.id) {
                request.title = None;
                request.description = None;
                request.assignee_id = None;
                request.priority = None;
                request.due_date = None;
            } else {
                return Err(ServiceError::Forbidden(
                    "You don't have permission to update this task".to_string(),
                ));
            }
        }

        if let Some(assignee_id) = request.assignee_id {
            if Some(assignee_id) != existing.assignee_id {
                self.ensure_assignee_in_project(&project, assignee_id)
                    .await?;
            }
        }

        let was_completed = existing.status == "completed";
        let now = Utc::now().naive_utc();
        let mut becomes_completed = false;

        let mut active: task::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(assignee_id) = request.assignee_id {
            active.assignee_id = Set(Some(assignee_id));
        }
        if let Some(status) = request.status {
            validate_task_status(&status)?;
            if status == "completed" && !was_completed {
                active.completed_at = Set(Some(now));
                active.progress = Set(100);
                becomes_completed = true;
            } else if status != "completed" && was_completed {
                active.completed_at = Set(None);
            }
            active.status = Set(status);
        }
        if let Some(priority) = request.priority {
            validate_priority(&priority)?;
            active.priority = Set(priority);
        }
        if let Some(progress) = request.progress {
            validate_progress(progress)?;
            // A completion transition pins progress at 100.
            if !becomes_completed {
                active.progress = Set(progress);
            }
        }
        if let Some(estimated_hours) = request.estimated_hours {
            active.estimated_hours = Set(Some(estimated_hours));
        }
        if let Some(due_date) = request.due_date {
            active.due_date = Set(Some(due_date));
        }
        active.updated_at = Set(now);

        let updated = active.update(self.db.as_ref()).await?;

        if becomes_completed {
            self.grant_rewards(&updated).await?;
            if let Some(sender) = &self.event_sender {
                sender
                    .send(Event::TaskCompleted {
                        task_id: updated.id,
                        project_id: updated.project_id,
                    })
                    .await?;
            }
        }
        Ok(updated)
    }

    #[instrument(skip(self, auth), fields(task_id = %id))]
    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.load(id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let project = self.load_project(existing.project_id).await?;

        let is_manager = self
            .membership_role(existing.project_id, employee.id)
            .await?
            .map(|r| r == "project manager")
            .unwrap_or(false);
        let allowed = auth.is_people_ops()
            || is_manager
            || project.created_by == employee.id
            || existing.created_by == employee.id;
        if !allowed {
            return Err(ServiceError::Forbidden(
                "You don't have permission to delete this task".to_string(),
            ));
        }

        task::Entity::delete_by_id(id).exec(self.db.as_ref()).await?;
        Ok(())
    }

    // Comments.

    pub async fn list_comments(
        &self,
        auth: &AuthUser,
        task_id: Uuid,
    ) -> Result<Vec<TaskCommentDto>, ServiceError> {
        let task = self.load(task_id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_access_task(auth, &task, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have access to this task".to_string(),
            ));
        }

        let comments = task_comment::Entity::find()
            .filter(task_comment::Column::TaskId.eq(task_id))
            .order_by_asc(task_comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        let mut dtos = Vec::with_capacity(comments.len());
        for comment in comments {
            let author = employee::Entity::find_by_id(comment.employee_id)
                .one(self.db.as_ref())
                .await?
                .map(|e| e.full_name())
                .unwrap_or_else(|| "Unknown".to_string());
            dtos.push(TaskCommentDto { comment, author });
        }
        Ok(dtos)
    }

    #[instrument(skip(self, auth, request), fields(task_id = %task_id))]
    pub async fn add_comment(
        &self,
        auth: &AuthUser,
        task_id: Uuid,
        request: CommentRequest,
    ) -> Result<task_comment::Model, ServiceError> {
        if request.comment.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "Comment text is required".to_string(),
            ));
        }
        let task = self.load(task_id).await?;
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        if !self.can_access_task(auth, &task, employee.id).await? {
            return Err(ServiceError::Forbidden(
                "You don't have permission to comment on this task".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let model = task_comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            task_id: Set(task_id),
            employee_id: Set(employee.id),
            comment: Set(request.comment),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model)
    }

    pub async fn update_comment(
        &self,
        auth: &AuthUser,
        task_id: Uuid,
        comment_id: Uuid,
        request: CommentRequest,
    ) -> Result<task_comment::Model, ServiceError> {
        if request.comment.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "Comment text is required".to_string(),
            ));
        }
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let existing = task_comment::Entity::find_by_id(comment_id)
            .one(self.db.as_ref())
            .await?
            .filter(|c| c.task_id == task_id)
            .ok_or_else(|| ServiceError::NotFound("Comment".to_string()))?;

        if existing.employee_id != employee.id {
            return Err(ServiceError::Forbidden(
                "You don't have permission to update this comment".to_string(),
            ));
        }

        let mut active: task_comment::ActiveModel = existing.into();
        active.comment = Set(request.comment);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn delete_comment(
        &self,
        auth: &AuthUser,
        task_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), ServiceError> {
        let employee = employee_for_user(self.db.as_ref(), auth).await?;
        let existing = task_comment::Entity::find_by_id(comment_id)
            .one(self.db.as_ref())
            .await?
            .filter(|c| c.task_id == task_id)
            .ok_or_else(|| ServiceError::NotFound("Comment".to_string()))?;

        if existing.employee_id != employee.id && !auth.is_admin() {
            return Err(ServiceError::Forbidden(
                "You don't have permission to delete this comment".to_string(),
            ));
        }

        task_comment::Entity::delete_by_id(comment_id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_priority_progress_validation() {
        assert!(validate_task_status("in_progress").is_ok());
        assert!(validate_task_status("done").is_err());
        assert!(validate_priority("urgent").is_ok());
        assert!(validate_priority("blocker").is_err());
        assert!(validate_progress(0).is_ok());
        assert!(validate_progress(100).is_ok());
        assert!(validate_progress(101).is_err());
        assert!(validate_progress(-1).is_err());
    }
}
