use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{employee, key_result, okr};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{employee_for_user, paginate};

pub const OKR_STATUSES: &[&str] = &["draft", "active", "completed", "cancelled"];
pub const OKR_TIMEFRAMES: &[&str] = &["monthly", "quarterly", "annual"];

#[derive(Clone)]
pub struct OkrService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateOkrRequest {
    pub employee_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub timeframe: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub key_results: Vec<CreateKeyResultRequest>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateKeyResultRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateOkrRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub timeframe: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateKeyResultRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OkrListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub status: Option<String>,
    pub timeframe: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OkrDto {
    #[serde(flatten)]
    pub okr: okr::Model,
    pub key_results: Vec<key_result::Model>,
}

/// Progress of one key result as whole percent, capped at 100.
pub(crate) fn key_result_progress(current: f64, target: f64) -> i32 {
    if target <= 0.0 {
        return 0;
    }
    (((current / target) * 100.0) as i32).min(100)
}

/// Objective progress is the integer average of its key results.
pub(crate) fn okr_progress(key_results: &[i32]) -> i32 {
    if key_results.is_empty() {
        return 0;
    }
    key_results.iter().sum::<i32>() / key_results.len() as i32
}

impl OkrService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        OkrService { db, event_sender }
    }

    async fn load(&self, id: Uuid) -> Result<okr::Model, ServiceError> {
        okr::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("OKR".to_string()))
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

    /// Admin and HR see everything, managers see their team, everyone
    /// else their own objectives only.
    async fn can_touch(
        &self,
        auth: &AuthUser,
        subject_employee_id: Uuid,
    ) -> Result<bool, ServiceError> {
        if auth.is_people_ops() {
            return Ok(true);
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        if own.id == subject_employee_id {
            return Ok(true);
        }
        if auth.has_role("manager") {
            let team = self.team_ids(own.id).await?;
            return Ok(team.contains(&subject_employee_id));
        }
        Ok(false)
    }

    async fn to_dto(&self, model: okr::Model) -> Result<OkrDto, ServiceError> {
        let key_results = key_result::Entity::find()
            .filter(key_result::Column::OkrId.eq(model.id))
            .order_by_asc(key_result::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(OkrDto {
            okr: model,
            key_results,
        })
    }

    pub async fn list(
        &self,
        auth: &AuthUser,
        query: OkrListQuery,
    ) -> Result<PaginatedResponse<OkrDto>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = okr::Entity::find();
        if auth.is_people_ops() {
            if let Some(employee_id) = query.employee_id {
                finder = finder.filter(okr::Column::EmployeeId.eq(employee_id));
            }
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            if auth.has_role("manager") {
                let team = self.team_ids(own.id).await?;
                if let Some(employee_id) = query.employee_id {
                    if !team.contains(&employee_id) {
                        return Err(ServiceError::Forbidden(
                            "You can only view your own or your team members' OKRs".to_string(),
                        ));
                    }
                    finder = finder.filter(okr::Column::EmployeeId.eq(employee_id));
                } else {
                    finder = finder.filter(okr::Column::EmployeeId.is_in(team));
                }
            } else {
                finder = finder.filter(okr::Column::EmployeeId.eq(own.id));
            }
        }

        if let Some(status) = query.status.as_deref() {
            if !OKR_STATUSES.contains(&status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Invalid status: {}",
                    status
                )));
            }
            finder = finder.filter(okr::Column::Status.eq(status));
        }
        if let Some(timeframe) = query.timeframe.as_deref() {
            if !OKR_TIMEFRAMES.contains(&timeframe) {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid timeframe: {}",
                    timeframe
                )));
            }
            finder = finder.filter(okr::Column::Timeframe.eq(timeframe));
        }

        let paginator = finder
            .order_by_desc(okr::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut items = Vec::with_capacity(models.len());
        for model in models {
            items.push(self.to_dto(model).await?);
        }
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    pub async fn my_okrs(
        &self,
        auth: &AuthUser,
        page: Option<u64>,
        limit: Option<u64>,
        status: Option<String>,
    ) -> Result<PaginatedResponse<OkrDto>, ServiceError> {
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let (page, limit) = paginate(page, limit);

        let mut finder = okr::Entity::find().filter(okr::Column::EmployeeId.eq(own.id));
        if let Some(status) = status.as_deref() {
            if !OKR_STATUSES.contains(&status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Invalid status: {}",
                    status
                )));
            }
            finder = finder.filter(okr::Column::Status.eq(status));
        }

        let paginator = finder
            .order_by_desc(okr::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut items = Vec::with_capacity(models.len());
        for model in models {
            items.push(self.to_dto(model).await?);
        }
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<OkrDto, ServiceError> {
        let model = self.load(id).await?;
        if !self.can_touch(auth, model.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only view your own or your team members' OKRs".to_string(),
            ));
        }
        self.to_dto(model).await
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create(
        &self,
        auth: &AuthUser,
        request: CreateOkrRequest,
    ) -> Result<OkrDto, ServiceError> {
        request.validate()?;
        let creator = employee_for_user(self.db.as_ref(), auth).await?;

        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Target employee".to_string()))?;

        if !self.can_touch(auth, request.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only create OKRs for yourself or your team members".to_string(),
            ));
        }

        if request.start_date > request.end_date {
            return Err(ServiceError::BadRequest(
                "Start date must be before end date".to_string(),
            ));
        }

        let timeframe = request
            .timeframe
            .unwrap_or_else(|| "quarterly".to_string());
        if !OKR_TIMEFRAMES.contains(&timeframe.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid timeframe: {}",
                timeframe
            )));
        }

        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let model = okr::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            title: Set(request.title),
            description: Set(request.description),
            timeframe: Set(timeframe),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            status: Set("draft".to_string()),
            progress: Set(0),
            created_by: Set(creator.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for kr in request.key_results {
            kr.validate()?;
            key_result::ActiveModel {
                id: Set(Uuid::new_v4()),
                okr_id: Set(model.id),
                title: Set(kr.title),
                description: Set(kr.description),
                target_value: Set(kr.target_value),
                current_value: Set(0.0),
                unit: Set(kr.unit),
                progress: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(okr_id = %model.id, "OKR created");
        self.to_dto(model).await
    }

    #[instrument(skip(self, auth, request), fields(okr_id = %id))]
    pub async fn update(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateOkrRequest,
    ) -> Result<OkrDto, ServiceError> {
        let existing = self.load(id).await?;
        if !self.can_touch(auth, existing.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only update your own or your team members' OKRs".to_string(),
            ));
        }
        if existing.status == "completed" {
            return Err(ServiceError::BadRequest(
                "Cannot update a completed OKR".to_string(),
            ));
        }

        if let Some(timeframe) = request.timeframe.as_deref() {
            if !OKR_TIMEFRAMES.contains(&timeframe) {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid timeframe: {}",
                    timeframe
                )));
            }
        }

        let mut active: okr::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(timeframe) = request.timeframe {
            active.timeframe = Set(timeframe);
        }
        if let Some(start_date) = request.start_date {
            active.start_date = Set(start_date);
        }
        if let Some(end_date) = request.end_date {
            active.end_date = Set(end_date);
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let model = active.update(self.db.as_ref()).await?;
        self.to_dto(model).await
    }

    #[instrument(skip(self, auth), fields(okr_id = %id))]
    pub async fn activate(&self, auth: &AuthUser, id: Uuid) -> Result<OkrDto, ServiceError> {
        let existing = self.load(id).await?;
        if !self.can_touch(auth, existing.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only activate your own or your team members' OKRs".to_string(),
            ));
        }
        if existing.status != "draft" {
            return Err(ServiceError::InvalidStatus(
                "Only draft OKRs can be activated".to_string(),
            ));
        }
        let employee_id = existing.employee_id;
        let mut active: okr::ActiveModel = existing.into();
        active.status = Set("active".to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::OkrActivated {
                    okr_id: id,
                    employee_id,
                })
                .await?;
        }
        self.to_dto(model).await
    }

    #[instrument(skip(self, auth), fields(okr_id = %id))]
    pub async fn complete(&self, auth: &AuthUser, id: Uuid) -> Result<OkrDto, ServiceError> {
        let existing = self.load(id).await?;
        if !self.can_touch(auth, existing.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only complete your own or your team members' OKRs".to_string(),
            ));
        }
        if existing.status != "active" {
            return Err(ServiceError::InvalidStatus(
                "Only active OKRs can be completed".to_string(),
            ));
        }
        let employee_id = existing.employee_id;
        let mut active: okr::ActiveModel = existing.into();
        active.status = Set("completed".to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::OkrCompleted {
                    okr_id: id,
                    employee_id,
                })
                .await?;
        }
        self.to_dto(model).await
    }

    #[instrument(skip(self, auth), fields(okr_id = %id))]
    pub async fn cancel(&self, auth: &AuthUser, id: Uuid) -> Result<OkrDto, ServiceError> {
        let existing = self.load(id).await?;
        if !self.can_touch(auth, existing.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only cancel your own or your team members' OKRs".to_string(),
            ));
        }
        if existing.status == "completed" {
            return Err(ServiceError::InvalidStatus(
                "Cannot cancel a completed OKR".to_string(),
            ));
        }
        let mut active: okr::ActiveModel = existing.into();
        active.status = Set("cancelled".to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        let model = active.update(self.db.as_ref()).await?;
        self.to_dto(model).await
    }

    /// Updating a key result's current value recomputes its progress and the
    /// parent objective's progress.
    #[instrument(skip(self, auth, request), fields(key_result_id = %id))]
    pub async fn update_key_result(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateKeyResultRequest,
    ) -> Result<OkrDto, ServiceError> {
        let existing = key_result::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Key result".to_string()))?;
        let parent = self.load(existing.okr_id).await?;

        if !self.can_touch(auth, parent.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only update your own or your team members' key results".to_string(),
            ));
        }
        if parent.status == "completed" {
            return Err(ServiceError::BadRequest(
                "Cannot update key results in a completed OKR".to_string(),
            ));
        }

        let current_changed = request.current_value.is_some();
        let target = request.target_value.unwrap_or(existing.target_value);
        let current = request.current_value.unwrap_or(existing.current_value);

        let mut active: key_result::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(unit) = request.unit {
            active.unit = Set(Some(unit));
        }
        active.target_value = Set(target);
        active.current_value = Set(current);
        if current_changed {
            active.progress = Set(key_result_progress(current, target));
        }
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(self.db.as_ref()).await?;

        if current_changed {
            let all = key_result::Entity::find()
                .filter(key_result::Column::OkrId.eq(parent.id))
                .all(self.db.as_ref())
                .await?;
            let progresses: Vec<i32> = all.iter().map(|kr| kr.progress).collect();
            let mut parent_active: okr::ActiveModel = parent.clone().into();
            parent_active.progress = Set(okr_progress(&progresses));
            parent_active.updated_at = Set(Utc::now().naive_utc());
            parent_active.update(self.db.as_ref()).await?;
        }

        let refreshed = self.load(parent.id).await?;
        self.to_dto(refreshed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_result_progress_is_capped() {
        assert_eq!(key_result_progress(50.0, 100.0), 50);
        assert_eq!(key_result_progress(150.0, 100.0), 100);
        assert_eq!(key_result_progress(10.0, 0.0), 0);
    }

    #[test]
    fn okr_progress_averages_with_integer_division() {
        assert_eq!(okr_progress(&[100, 50, 25]), 58);
        assert_eq!(okr_progress(&[]), 0);
    }
}
