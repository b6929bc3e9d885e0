use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{
    employee, employee_reward, hr_query, mood_entry, performance_feedback, project,
    project_member, rag_update, task, task_reward,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::PaginatedResponse;

use super::{employee_for_user, paginate, parse_date};

pub const MOODS: &[&str] = &["very_happy", "happy", "neutral", "unhappy", "very_unhappy"];
pub const FEEDBACK_TYPES: &[&str] = &["manager", "peer", "self", "ai_generated"];
pub const REWARD_TYPES: &[&str] = &["points", "badge", "gift"];
pub const RAG_STATUSES: &[&str] = &["red", "amber", "green"];

/// Mood tracking, performance feedback, gamified rewards, the HR
/// assistant, and RAG project health live together here.
#[derive(Clone)]
pub struct EngagementService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

// Mood DTOs.

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RecordMoodRequest {
    pub employee_id: Uuid,
    pub mood: String,
    pub note: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateMoodRequest {
    pub mood: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoodListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub mood: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoodDashboardQuery {
    pub days: Option<i64>,
    pub department_id: Option<Uuid>,
}

// Feedback DTOs.

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateFeedbackRequest {
    pub employee_id: Uuid,
    pub reviewer_id: Option<Uuid>,
    pub feedback_type: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub strengths: Option<String>,
    pub areas_of_improvement: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    pub is_draft: Option<bool>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateFeedbackRequest {
    pub content: Option<String>,
    pub strengths: Option<String>,
    pub areas_of_improvement: Option<String>,
    pub rating: Option<i32>,
    pub is_draft: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub feedback_type: Option<String>,
    pub is_draft: Option<bool>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GenerateFeedbackRequest {
    pub employee_id: Uuid,
    pub timeframe: String,
    #[serde(default)]
    pub metrics_to_include: Vec<String>,
}

// Reward DTOs.

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateTaskRewardRequest {
    pub task_id: Uuid,
    pub reward_type: String,
    #[serde(default)]
    pub points: i32,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AwardRewardRequest {
    pub employee_id: Uuid,
    pub task_reward_id: Uuid,
    #[serde(default)]
    pub claimed: bool,
}

#[derive(Debug, Deserialize)]
pub struct TaskRewardListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub task_id: Option<Uuid>,
    pub reward_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeRewardListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
    pub claimed: Option<bool>,
}

// HR query DTOs.

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateHrQueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
    pub is_private: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RespondHrQueryRequest {
    #[validate(length(min = 1))]
    pub response: String,
}

// RAG DTOs.

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateRagUpdateRequest {
    pub project_id: Uuid,
    pub status: String,
    pub update_date: Option<NaiveDate>,
    #[validate(length(min = 1))]
    pub description: String,
    pub action_items: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RagListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FeedbackDraft {
    pub content: String,
    pub strengths: String,
    pub areas_of_improvement: String,
    pub rating: i32,
}

/// Assistant replies are keyword matched against a fixed policy set.
/// Anything unmatched is acknowledged for manual follow-up.
pub(crate) fn assistant_reply(query: &str) -> &'static str {
    let q = query.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| q.contains(w));
    if mentions(&["leave", "vacation", "time off"]) {
        "According to our policy, regular employees are entitled to 15 days of annual leave, 10 days of sick leave, and 5 personal days per year. Please submit leave requests through the leave management system at least 2 days in advance for approval."
    } else if mentions(&["salary", "pay", "compensation"]) {
        "Salary reviews are conducted annually in June. Your compensation is determined based on performance reviews, market standards, and company budget. For specific queries about your salary, please schedule a private meeting with HR."
    } else if mentions(&["benefits", "insurance", "healthcare"]) {
        "Our benefits package includes health insurance, dental coverage, vision care, 401(k) matching up to 5%, and wellness programs. Detailed information can be found in the benefits handbook in the company portal."
    } else if mentions(&["work hours", "schedule", "flexible"]) {
        "Standard work hours are 9:00 AM to 5:00 PM with a 1-hour lunch break. We offer flexible scheduling with core hours from 10:00 AM to 3:00 PM. Remote work options are available based on department policies and manager approval."
    } else {
        "Thank you for your query. I've recorded it and will have someone from HR follow up with you directly."
    }
}

/// Deterministic stand-in for a collaboration metric, derived from the
/// employee id so repeated generations agree.
pub(crate) fn collaboration_score(employee_id: Uuid) -> u32 {
    let bytes = employee_id.as_bytes();
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    (sum % 10) + 1
}

pub(crate) fn normalized_rating(raw: i32, metrics_count: usize) -> i32 {
    let count = metrics_count.max(1) as f64;
    let avg = (raw as f64 / count).round() as i32;
    avg.clamp(1, 5)
}

impl EngagementService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        EngagementService { db, event_sender }
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

    // Mood tracking.

    pub async fn list_moods(
        &self,
        auth: &AuthUser,
        query: MoodListQuery,
    ) -> Result<PaginatedResponse<mood_entry::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = mood_entry::Entity::find();
        if auth.is_people_ops() {
            if let Some(id) = query.employee_id {
                finder = finder.filter(mood_entry::Column::EmployeeId.eq(id));
            }
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            if auth.has_role("manager") {
                let team = self.team_ids(own.id).await?;
                if let Some(id) = query.employee_id {
                    if !team.contains(&id) {
                        return Err(ServiceError::Forbidden(
                            "You can only view your own or your team members' mood records"
                                .to_string(),
                        ));
                    }
                    finder = finder.filter(mood_entry::Column::EmployeeId.eq(id));
                } else {
                    finder = finder.filter(mood_entry::Column::EmployeeId.is_in(team));
                }
            } else {
                finder = finder.filter(mood_entry::Column::EmployeeId.eq(own.id));
            }
        }

        if let Some(start) = query.start_date.as_deref() {
            finder = finder.filter(mood_entry::Column::Date.gte(parse_date(start)?));
        }
        if let Some(end) = query.end_date.as_deref() {
            finder = finder.filter(mood_entry::Column::Date.lte(parse_date(end)?));
        }
        if let Some(mood) = query.mood.as_deref() {
            if !MOODS.contains(&mood) {
                return Err(ServiceError::InvalidInput(format!(
                    "Mood must be one of: {}",
                    MOODS.join(", ")
                )));
            }
            finder = finder.filter(mood_entry::Column::Mood.eq(mood));
        }

        let paginator = finder
            .order_by_desc(mood_entry::Column::Date)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    /// One mood entry per employee per day.
    #[instrument(skip(self, auth, request))]
    pub async fn record_mood(
        &self,
        auth: &AuthUser,
        request: RecordMoodRequest,
    ) -> Result<mood_entry::Model, ServiceError> {
        if !MOODS.contains(&request.mood.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Mood must be one of: {}",
                MOODS.join(", ")
            )));
        }
        if !self.can_touch(auth, request.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only create mood records for yourself or your team members".to_string(),
            ));
        }
        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;

        let date = request.date.unwrap_or_else(|| Utc::now().naive_utc().date());
        let existing = mood_entry::Entity::find()
            .filter(mood_entry::Column::EmployeeId.eq(request.employee_id))
            .filter(mood_entry::Column::Date.eq(date))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A mood record already exists for this employee on {}",
                date
            )));
        }

        let now = Utc::now().naive_utc();
        let model = mood_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            mood: Set(request.mood),
            note: Set(request.note),
            date: Set(date),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::MoodRecorded {
                    employee_id: model.employee_id,
                    date,
                })
                .await?;
        }
        Ok(model)
    }

    #[instrument(skip(self, auth, request), fields(mood_id = %id))]
    pub async fn update_mood(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateMoodRequest,
    ) -> Result<mood_entry::Model, ServiceError> {
        let existing = mood_entry::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Mood record".to_string()))?;
        if !self.can_touch(auth, existing.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only update your own or your team members' mood records".to_string(),
            ));
        }
        if let Some(mood) = request.mood.as_deref() {
            if !MOODS.contains(&mood) {
                return Err(ServiceError::InvalidInput(format!(
                    "Mood must be one of: {}",
                    MOODS.join(", ")
                )));
            }
        }

        let mut active: mood_entry::ActiveModel = existing.into();
        if let Some(mood) = request.mood {
            active.mood = Set(mood);
        }
        if let Some(note) = request.note {
            active.note = Set(Some(note));
        }
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Mood counts and per-day trend for the sentiment dashboard.
    #[instrument(skip(self, auth, query))]
    pub async fn mood_dashboard(
        &self,
        auth: &AuthUser,
        query: MoodDashboardQuery,
    ) -> Result<Value, ServiceError> {
        let days = query.days.unwrap_or(30).clamp(1, 365);
        let end = Utc::now().naive_utc().date();
        let start = end - Duration::days(days);

        let mut finder = mood_entry::Entity::find()
            .filter(mood_entry::Column::Date.gte(start))
            .filter(mood_entry::Column::Date.lte(end));
        if auth.is_people_ops() {
            if let Some(dept) = query.department_id {
                let members = employee::Entity::find()
                    .filter(employee::Column::DepartmentId.eq(dept))
                    .all(self.db.as_ref())
                    .await?;
                let ids: Vec<Uuid> = members.into_iter().map(|e| e.id).collect();
                finder = finder.filter(mood_entry::Column::EmployeeId.is_in(ids));
            }
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            let team = self.team_ids(own.id).await?;
            finder = finder.filter(mood_entry::Column::EmployeeId.is_in(team));
        }
        let entries = finder.all(self.db.as_ref()).await?;

        let mut mood_counts: BTreeMap<&str, u64> = MOODS.iter().map(|m| (*m, 0)).collect();
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<&str, u64>> = BTreeMap::new();
        for entry in &entries {
            let Some(key) = MOODS.iter().copied().find(|m| *m == entry.mood) else {
                continue;
            };
            *mood_counts.entry(key).or_insert(0) += 1;
            let day = by_date
                .entry(entry.date)
                .or_insert_with(|| MOODS.iter().map(|m| (*m, 0)).collect());
            *day.entry(key).or_default() += 1;
        }

        let trend_data: Vec<Value> = by_date
            .iter()
            .map(|(date, counts)| {
                let mut obj = serde_json::Map::new();
                obj.insert("date".to_string(), json!(date));
                for (mood, count) in counts {
                    obj.insert((*mood).to_string(), json!(count));
                }
                Value::Object(obj)
            })
            .collect();

        let total: u64 = mood_counts.values().sum();
        let summary = if total > 0 {
            let positive = mood_counts["very_happy"] + mood_counts["happy"];
            let negative = mood_counts["unhappy"] + mood_counts["very_unhappy"];
            let neutral = mood_counts["neutral"];
            let pct = |n: u64| ((n as f64 / total as f64) * 10_000.0).round() / 100.0;
            let most_common = mood_counts
                .iter()
                .max_by_key(|(_, count)| **count)
                .map(|(mood, _)| *mood)
                .unwrap_or("neutral");
            json!({
                "total_records": total,
                "positive_percentage": pct(positive),
                "neutral_percentage": pct(neutral),
                "negative_percentage": pct(negative),
                "most_common_mood": most_common,
            })
        } else {
            json!({})
        };

        Ok(json!({
            "date_range": { "start": start, "end": end },
            "mood_counts": mood_counts,
            "trend_data": trend_data,
            "summary": summary,
        }))
    }

    // Performance feedback.

    pub async fn list_feedback(
        &self,
        auth: &AuthUser,
        query: FeedbackListQuery,
    ) -> Result<PaginatedResponse<performance_feedback::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = performance_feedback::Entity::find();
        if auth.is_people_ops() {
            if let Some(id) = query.employee_id {
                finder = finder.filter(performance_feedback::Column::EmployeeId.eq(id));
            }
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            if auth.has_role("manager") {
                let team = self.team_ids(own.id).await?;
                if let Some(id) = query.employee_id {
                    if !team.contains(&id) {
                        return Err(ServiceError::Forbidden(
                            "You can only view your own or your team members' feedback"
                                .to_string(),
                        ));
                    }
                    finder = finder.filter(performance_feedback::Column::EmployeeId.eq(id));
                } else {
                    finder = finder.filter(
                        performance_feedback::Column::EmployeeId
                            .is_in(team)
                            .or(performance_feedback::Column::ReviewerId.eq(own.id)),
                    );
                }
            } else {
                // Subjects never see drafts written about them.
                finder = finder.filter(
                    performance_feedback::Column::ReviewerId.eq(own.id).or(
                        performance_feedback::Column::EmployeeId
                            .eq(own.id)
                            .and(performance_feedback::Column::IsDraft.eq(false)),
                    ),
                );
            }
        }

        if let Some(feedback_type) = query.feedback_type.as_deref() {
            if !FEEDBACK_TYPES.contains(&feedback_type) {
                return Err(ServiceError::InvalidInput(format!(
                    "Type must be one of: {}",
                    FEEDBACK_TYPES.join(", ")
                )));
            }
            finder = finder.filter(performance_feedback::Column::FeedbackType.eq(feedback_type));
        }
        if let Some(is_draft) = query.is_draft {
            finder = finder.filter(performance_feedback::Column::IsDraft.eq(is_draft));
        }

        let paginator = finder
            .order_by_desc(performance_feedback::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create_feedback(
        &self,
        auth: &AuthUser,
        request: CreateFeedbackRequest,
    ) -> Result<performance_feedback::Model, ServiceError> {
        request.validate()?;
        if !FEEDBACK_TYPES.contains(&request.feedback_type.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Type must be one of: {}",
                FEEDBACK_TYPES.join(", ")
            )));
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Target employee".to_string()))?;

        if !auth.is_people_ops() {
            match request.feedback_type.as_str() {
                "manager" => {
                    if !auth.has_role("manager") {
                        return Err(ServiceError::Forbidden(
                            "Only managers can provide manager feedback".to_string(),
                        ));
                    }
                    let team = self.team_ids(own.id).await?;
                    if request.employee_id == own.id || !team.contains(&request.employee_id) {
                        return Err(ServiceError::Forbidden(
                            "You can only provide manager feedback to your team members"
                                .to_string(),
                        ));
                    }
                }
                "peer" => {
                    if request.employee_id == own.id {
                        return Err(ServiceError::BadRequest(
                            "You cannot provide peer feedback for yourself".to_string(),
                        ));
                    }
                }
                "self" => {
                    if request.employee_id != own.id {
                        return Err(ServiceError::Forbidden(
                            "You can only provide self feedback for yourself".to_string(),
                        ));
                    }
                }
                "ai_generated" => {
                    if !auth.has_role("manager") {
                        return Err(ServiceError::Forbidden(
                            "You don't have permission to create AI-generated feedback"
                                .to_string(),
                        ));
                    }
                }
                _ => unreachable!(),
            }
        }

        let reviewer_id = if request.feedback_type == "ai_generated" {
            request.reviewer_id
        } else {
            Some(request.reviewer_id.unwrap_or(own.id))
        };

        let now = Utc::now().naive_utc();
        let model = performance_feedback::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            reviewer_id: Set(reviewer_id),
            feedback_type: Set(request.feedback_type),
            content: Set(request.content),
            strengths: Set(request.strengths),
            areas_of_improvement: Set(request.areas_of_improvement),
            rating: Set(request.rating),
            is_draft: Set(request.is_draft.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(feedback_id = %model.id, "performance feedback created");
        Ok(model)
    }

    #[instrument(skip(self, auth, request), fields(feedback_id = %id))]
    pub async fn update_feedback(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateFeedbackRequest,
    ) -> Result<performance_feedback::Model, ServiceError> {
        let existing = performance_feedback::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Performance feedback".to_string()))?;

        if !auth.is_people_ops() {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            if existing.reviewer_id != Some(own.id) {
                return Err(ServiceError::Forbidden(
                    "You can only update feedback you've created".to_string(),
                ));
            }
        }
        if let Some(rating) = request.rating {
            if !(1..=5).contains(&rating) {
                return Err(ServiceError::ValidationError(
                    "Rating must be between 1 and 5".to_string(),
                ));
            }
        }

        let mut active: performance_feedback::ActiveModel = existing.into();
        if let Some(content) = request.content {
            active.content = Set(content);
        }
        if let Some(strengths) = request.strengths {
            active.strengths = Set(Some(strengths));
        }
        if let Some(areas) = request.areas_of_improvement {
            active.areas_of_improvement = Set(Some(areas));
        }
        if let Some(rating) = request.rating {
            active.rating = Set(Some(rating));
        }
        if let Some(is_draft) = request.is_draft {
            active.is_draft = Set(is_draft);
        }
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Drafts AI feedback from the employee's task record. The text is
    /// assembled locally from fixed templates, not an external model.
    #[instrument(skip(self, auth, request))]
    pub async fn generate_feedback(
        &self,
        auth: &AuthUser,
        request: GenerateFeedbackRequest,
    ) -> Result<performance_feedback::Model, ServiceError> {
        if !self.can_touch(auth, request.employee_id).await? {
            return Err(ServiceError::Forbidden(
                "You can only generate feedback for yourself or your team members".to_string(),
            ));
        }
        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Target employee".to_string()))?;

        let metrics = if request.metrics_to_include.is_empty() {
            vec!["tasks".to_string(), "collaboration".to_string()]
        } else {
            request.metrics_to_include.clone()
        };

        let mut strengths = Vec::new();
        let mut improvements = Vec::new();
        let mut paragraphs = Vec::new();
        let mut rating = 0;

        if metrics.iter().any(|m| m == "tasks") {
            let tasks = task::Entity::find()
                .filter(task::Column::AssigneeId.eq(request.employee_id))
                .all(self.db.as_ref())
                .await?;
            let completed = tasks.iter().filter(|t| t.status == "completed").count();
            let completion_rate = if tasks.is_empty() {
                0.0
            } else {
                completed as f64 / tasks.len() as f64
            };
            if completion_rate > 0.8 {
                strengths.push("Excellent task completion rate");
                paragraphs.push(format!(
                    "Has completed {:.1}% of assigned tasks, demonstrating strong reliability and productivity.",
                    completion_rate * 100.0
                ));
                rating += 5;
            } else if completion_rate > 0.6 {
                strengths.push("Good task management");
                paragraphs.push(format!(
                    "Maintains a solid task completion rate of {:.1}%, showing consistent productivity.",
                    completion_rate * 100.0
                ));
                rating += 4;
            } else {
                improvements.push("Task completion needs improvement");
                paragraphs.push(format!(
                    "Current task completion rate is {:.1}%. Consider implementing a more structured approach to task management.",
                    completion_rate * 100.0
                ));
                rating += 2;
            }
        }

        if metrics.iter().any(|m| m == "collaboration") {
            let score = collaboration_score(request.employee_id);
            if score > 7 {
                strengths.push("Strong team collaboration");
                paragraphs.push(
                    "Consistently demonstrates excellent collaboration with team members, contributes positively to group discussions, and helps others when needed.".to_string(),
                );
                rating += 5;
            } else if score > 4 {
                strengths.push("Effective collaboration skills");
                paragraphs.push(
                    "Works well with others and contributes to team objectives. Could occasionally take more initiative in group settings.".to_string(),
                );
                rating += 3;
            } else {
                improvements.push("Collaboration and teamwork");
                paragraphs.push(
                    "Would benefit from more active participation in team activities and improving communication with colleagues.".to_string(),
                );
                rating += 1;
            }
        }

        let bullets = |items: &[&str]| -> String {
            if items.is_empty() {
                String::new()
            } else {
                items
                    .iter()
                    .map(|s| format!("- {}", s))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        let now = Utc::now().naive_utc();
        let model = performance_feedback::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            reviewer_id: Set(None),
            feedback_type: Set("ai_generated".to_string()),
            content: Set(paragraphs.join("\n\n")),
            strengths: Set(Some(bullets(&strengths))),
            areas_of_improvement: Set(Some(bullets(&improvements))),
            rating: Set(Some(normalized_rating(rating, metrics.len()))),
            is_draft: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(feedback_id = %model.id, "AI feedback drafted");
        Ok(model)
    }

    // Task rewards.

    pub async fn list_task_rewards(
        &self,
        query: TaskRewardListQuery,
    ) -> Result<PaginatedResponse<task_reward::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);
        let mut finder = task_reward::Entity::find();
        if let Some(task_id) = query.task_id {
            finder = finder.filter(task_reward::Column::TaskId.eq(task_id));
        }
        if let Some(reward_type) = query.reward_type.as_deref() {
            if !REWARD_TYPES.contains(&reward_type) {
                return Err(ServiceError::InvalidInput(format!(
                    "Type must be one of: {}",
                    REWARD_TYPES.join(", ")
                )));
            }
            finder = finder.filter(task_reward::Column::RewardType.eq(reward_type));
        }
        let paginator = finder
            .order_by_desc(task_reward::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create_task_reward(
        &self,
        auth: &AuthUser,
        request: CreateTaskRewardRequest,
    ) -> Result<task_reward::Model, ServiceError> {
        if !REWARD_TYPES.contains(&request.reward_type.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "Type must be one of: {}",
                REWARD_TYPES.join(", ")
            )));
        }
        if request.points < 0 {
            return Err(ServiceError::ValidationError(
                "Points cannot be negative".to_string(),
            ));
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let task = task::Entity::find_by_id(request.task_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task".to_string()))?;

        if !auth.is_people_ops() {
            let owns = project::Entity::find_by_id(task.project_id)
                .one(self.db.as_ref())
                .await?
                .map(|p| p.created_by == own.id)
                .unwrap_or(false);
            let member = project_member::Entity::find()
                .filter(project_member::Column::ProjectId.eq(task.project_id))
                .filter(project_member::Column::EmployeeId.eq(own.id))
                .one(self.db.as_ref())
                .await?
                .is_some();
            if !owns && !member {
                return Err(ServiceError::Forbidden(
                    "You don't have permission to add rewards to this task".to_string(),
                ));
            }
        }

        let now = Utc::now().naive_utc();
        let model = task_reward::ActiveModel {
            id: Set(Uuid::new_v4()),
            task_id: Set(request.task_id),
            reward_type: Set(request.reward_type),
            points: Set(request.points),
            name: Set(request.name),
            description: Set(request.description),
            created_by: Set(own.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model)
    }

    // Employee rewards.

    pub async fn list_employee_rewards(
        &self,
        auth: &AuthUser,
        query: EmployeeRewardListQuery,
    ) -> Result<PaginatedResponse<employee_reward::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = employee_reward::Entity::find();
        if auth.is_people_ops() {
            if let Some(id) = query.employee_id {
                finder = finder.filter(employee_reward::Column::EmployeeId.eq(id));
            }
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            if auth.has_role("manager") {
                let team = self.team_ids(own.id).await?;
                if let Some(id) = query.employee_id {
                    if !team.contains(&id) {
                        return Err(ServiceError::Forbidden(
                            "You can only view your own or your team members' rewards".to_string(),
                        ));
                    }
                    finder = finder.filter(employee_reward::Column::EmployeeId.eq(id));
                } else {
                    finder = finder.filter(employee_reward::Column::EmployeeId.is_in(team));
                }
            } else {
                finder = finder.filter(employee_reward::Column::EmployeeId.eq(own.id));
            }
        }
        if let Some(claimed) = query.claimed {
            finder = finder.filter(employee_reward::Column::Claimed.eq(claimed));
        }

        let paginator = finder
            .order_by_desc(employee_reward::Column::EarnedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth, request))]
    pub async fn award_reward(
        &self,
        auth: &AuthUser,
        request: AwardRewardRequest,
    ) -> Result<employee_reward::Model, ServiceError> {
        employee::Entity::find_by_id(request.employee_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee".to_string()))?;
        task_reward::Entity::find_by_id(request.task_reward_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task reward".to_string()))?;

        if !auth.is_people_ops() {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            let team = self.team_ids(own.id).await?;
            if !team.contains(&request.employee_id) {
                return Err(ServiceError::Forbidden(
                    "You can only award rewards to your team members".to_string(),
                ));
            }
        }

        let now = Utc::now().naive_utc();
        let model = employee_reward::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(request.employee_id),
            task_reward_id: Set(request.task_reward_id),
            claimed: Set(request.claimed),
            earned_at: Set(now),
            claimed_at: Set(if request.claimed { Some(now) } else { None }),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model)
    }

    /// Claiming is one shot; a claimed reward stays claimed.
    #[instrument(skip(self, auth), fields(reward_id = %id))]
    pub async fn claim_reward(
        &self,
        auth: &AuthUser,
        id: Uuid,
    ) -> Result<employee_reward::Model, ServiceError> {
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let existing = employee_reward::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Reward".to_string()))?;
        if existing.employee_id != own.id {
            return Err(ServiceError::Forbidden(
                "You can only claim your own rewards".to_string(),
            ));
        }
        if existing.claimed {
            return Err(ServiceError::Conflict(
                "This reward has already been claimed".to_string(),
            ));
        }

        let employee_id = existing.employee_id;
        let mut active: employee_reward::ActiveModel = existing.into();
        active.claimed = Set(true);
        active.claimed_at = Set(Some(Utc::now().naive_utc()));
        let model = active.update(self.db.as_ref()).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send(Event::RewardClaimed {
                    employee_reward_id: id,
                    employee_id,
                })
                .await?;
        }
        Ok(model)
    }

    // HR assistant.

    pub async fn list_hr_queries(
        &self,
        auth: &AuthUser,
        page: Option<u64>,
        limit: Option<u64>,
        employee_id: Option<Uuid>,
    ) -> Result<PaginatedResponse<hr_query::Model>, ServiceError> {
        let (page, limit) = paginate(page, limit);
        let mut finder = hr_query::Entity::find();
        if auth.is_people_ops() {
            if let Some(id) = employee_id {
                finder = finder.filter(hr_query::Column::EmployeeId.eq(id));
            }
        } else {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            finder = finder.filter(hr_query::Column::EmployeeId.eq(own.id));
        }
        let paginator = finder
            .order_by_desc(hr_query::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    /// The assistant answers immediately from its canned policy set; HR
    /// can overwrite the response later.
    #[instrument(skip(self, auth, request))]
    pub async fn create_hr_query(
        &self,
        auth: &AuthUser,
        request: CreateHrQueryRequest,
    ) -> Result<hr_query::Model, ServiceError> {
        request.validate()?;
        let own = employee_for_user(self.db.as_ref(), auth).await?;

        let response = assistant_reply(&request.query);
        let now = Utc::now().naive_utc();
        let model = hr_query::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(own.id),
            query: Set(request.query),
            response: Set(Some(response.to_string())),
            is_private: Set(request.is_private.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model)
    }

    #[instrument(skip(self, request), fields(query_id = %id))]
    pub async fn respond_hr_query(
        &self,
        id: Uuid,
        request: RespondHrQueryRequest,
    ) -> Result<hr_query::Model, ServiceError> {
        request.validate()?;
        let existing = hr_query::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("HR query".to_string()))?;
        let mut active: hr_query::ActiveModel = existing.into();
        active.response = Set(Some(request.response));
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    // RAG project health.

    async fn accessible_project_ids(
        &self,
        auth: &AuthUser,
    ) -> Result<Option<Vec<Uuid>>, ServiceError> {
        if auth.is_people_ops() {
            return Ok(None);
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let mut ids: Vec<Uuid> = project_member::Entity::find()
            .filter(project_member::Column::EmployeeId.eq(own.id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|m| m.project_id)
            .collect();
        if auth.has_role("manager") {
            let created = project::Entity::find()
                .filter(project::Column::CreatedBy.eq(own.id))
                .all(self.db.as_ref())
                .await?;
            ids.extend(created.into_iter().map(|p| p.id));
        }
        ids.sort();
        ids.dedup();
        Ok(Some(ids))
    }

    pub async fn list_rag_updates(
        &self,
        auth: &AuthUser,
        query: RagListQuery,
    ) -> Result<PaginatedResponse<rag_update::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = rag_update::Entity::find();
        if let Some(status) = query.status.as_deref() {
            if !RAG_STATUSES.contains(&status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Status must be one of: {}",
                    RAG_STATUSES.join(", ")
                )));
            }
            finder = finder.filter(rag_update::Column::Status.eq(status));
        }

        if let Some(accessible) = self.accessible_project_ids(auth).await? {
            if let Some(project_id) = query.project_id {
                if !accessible.contains(&project_id) {
                    return Err(ServiceError::Forbidden(
                        "You can only view health updates for projects you're a member of"
                            .to_string(),
                    ));
                }
                finder = finder.filter(rag_update::Column::ProjectId.eq(project_id));
            } else {
                finder = finder.filter(rag_update::Column::ProjectId.is_in(accessible));
            }
        } else if let Some(project_id) = query.project_id {
            finder = finder.filter(rag_update::Column::ProjectId.eq(project_id));
        }

        let paginator = finder
            .order_by_desc(rag_update::Column::UpdateDate)
            .order_by_desc(rag_update::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create_rag_update(
        &self,
        auth: &AuthUser,
        request: CreateRagUpdateRequest,
    ) -> Result<rag_update::Model, ServiceError> {
        request.validate()?;
        if !RAG_STATUSES.contains(&request.status.as_str()) {
            return Err(ServiceError::InvalidStatus(format!(
                "Status must be one of: {}",
                RAG_STATUSES.join(", ")
            )));
        }
        if !auth.is_admin() && !auth.has_role("manager") {
            return Err(ServiceError::Forbidden(
                "Only administrators and managers can post project health updates".to_string(),
            ));
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let project = project::Entity::find_by_id(request.project_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Project".to_string()))?;

        if !auth.is_admin() && project.created_by != own.id {
            let member = project_member::Entity::find()
                .filter(project_member::Column::ProjectId.eq(project.id))
                .filter(project_member::Column::EmployeeId.eq(own.id))
                .one(self.db.as_ref())
                .await?
                .is_some();
            if !member {
                return Err(ServiceError::Forbidden(
                    "You don't have permission to create updates for this project".to_string(),
                ));
            }
        }

        let now = Utc::now().naive_utc();
        let model = rag_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(request.project_id),
            status: Set(request.status),
            update_date: Set(request.update_date.unwrap_or_else(|| now.date())),
            description: Set(Some(request.description)),
            action_items: Set(request.action_items),
            updated_by: Set(own.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model)
    }

    /// Latest health status per project, with red/amber/green totals.
    #[instrument(skip(self, auth))]
    pub async fn rag_dashboard(&self, auth: &AuthUser) -> Result<Value, ServiceError> {
        let projects = match self.accessible_project_ids(auth).await? {
            None => project::Entity::find().all(self.db.as_ref()).await?,
            Some(ids) => {
                project::Entity::find()
                    .filter(project::Column::Id.is_in(ids))
                    .all(self.db.as_ref())
                    .await?
            }
        };

        let mut red = 0u64;
        let mut amber = 0u64;
        let mut green = 0u64;
        let mut with_updates = 0u64;
        let mut items = Vec::with_capacity(projects.len());

        for p in &projects {
            let latest = rag_update::Entity::find()
                .filter(rag_update::Column::ProjectId.eq(p.id))
                .order_by_desc(rag_update::Column::UpdateDate)
                .order_by_desc(rag_update::Column::CreatedAt)
                .one(self.db.as_ref())
                .await?;
            match latest {
                Some(update) => {
                    with_updates += 1;
                    match update.status.as_str() {
                        "red" => red += 1,
                        "amber" => amber += 1,
                        "green" => green += 1,
                        _ => {}
                    }
                    let updater = employee::Entity::find_by_id(update.updated_by)
                        .one(self.db.as_ref())
                        .await?
                        .map(|e| json!({ "id": e.id, "name": e.full_name() }));
                    items.push(json!({
                        "id": p.id,
                        "name": p.name,
                        "status": p.status,
                        "rag_status": update.status,
                        "last_update": update.update_date,
                        "description": update.description,
                        "action_items": update.action_items,
                        "updater": updater,
                    }));
                }
                None => {
                    items.push(json!({
                        "id": p.id,
                        "name": p.name,
                        "status": p.status,
                        "rag_status": Value::Null,
                        "last_update": Value::Null,
                        "description": Value::Null,
                        "action_items": Value::Null,
                        "updater": Value::Null,
                    }));
                }
            }
        }

        let mut summary = json!({
            "red": red,
            "amber": amber,
            "green": green,
            "total_projects": projects.len(),
            "projects_with_updates": with_updates,
        });
        if with_updates > 0 {
            let pct = |n: u64| ((n as f64 / with_updates as f64) * 10_000.0).round() / 100.0;
            summary["red_percentage"] = json!(pct(red));
            summary["amber_percentage"] = json!(pct(amber));
            summary["green_percentage"] = json!(pct(green));
        }

        Ok(json!({ "summary": summary, "projects": items }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_matches_policy_keywords() {
        assert!(assistant_reply("How much vacation do I get?").contains("annual leave"));
        assert!(assistant_reply("question about my PAY").contains("Salary reviews"));
        assert!(assistant_reply("what insurance do we have").contains("benefits package"));
        assert!(assistant_reply("are work hours flexible?").contains("core hours"));
        assert!(assistant_reply("where is the office?").contains("follow up"));
    }

    #[test]
    fn collaboration_score_is_stable_and_bounded() {
        let id = Uuid::new_v4();
        let score = collaboration_score(id);
        assert_eq!(score, collaboration_score(id));
        assert!((1..=10).contains(&score));
    }

    #[test]
    fn rating_normalization_clamps_to_scale() {
        assert_eq!(normalized_rating(10, 2), 5);
        assert_eq!(normalized_rating(3, 2), 2);
        assert_eq!(normalized_rating(0, 2), 1);
        assert_eq!(normalized_rating(7, 0), 5);
    }
}
