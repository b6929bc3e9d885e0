use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{
    client_access, employee, project, project_member, task, task_comment, user,
};
use crate::errors::ServiceError;
use crate::PaginatedResponse;

use super::{employee_for_user, paginate};

/// Grants and the read-only project views they unlock for client users.
#[derive(Clone)]
pub struct ClientPortalService {
    db: Arc<DbPool>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateClientAccessRequest {
    pub client_id: Uuid,
    pub project_id: Uuid,
    #[serde(default)]
    pub can_view_files: bool,
    #[serde(default = "default_true")]
    pub can_view_tasks: bool,
    #[serde(default)]
    pub can_view_comments: bool,
    #[serde(default = "default_true")]
    pub can_view_team: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateClientAccessRequest {
    pub can_view_files: Option<bool>,
    pub can_view_tasks: Option<bool>,
    pub can_view_comments: Option<bool>,
    pub can_view_team: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ClientAccessListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PortalMember {
    pub id: Uuid,
    pub name: String,
    pub position: Option<String>,
    pub role: String,
}

/// Project as seen through a client grant. Sections the grant does not
/// allow are omitted from the payload entirely.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClientProjectView {
    pub project: project::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<task::Model>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<PortalMember>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<task_comment::Model>>,
}

impl ClientPortalService {
    pub fn new(db: Arc<DbPool>) -> Self {
        ClientPortalService { db }
    }

    async fn load(&self, id: Uuid) -> Result<client_access::Model, ServiceError> {
        client_access::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Client access record".to_string()))
    }

    /// Managers only administer grants on projects they created.
    async fn ensure_manages_project(
        &self,
        auth: &AuthUser,
        project_id: Uuid,
        denial: &str,
    ) -> Result<(), ServiceError> {
        if auth.is_admin() {
            return Ok(());
        }
        let own = employee_for_user(self.db.as_ref(), auth).await?;
        let owns = project::Entity::find_by_id(project_id)
            .one(self.db.as_ref())
            .await?
            .map(|p| p.created_by == own.id)
            .unwrap_or(false);
        if !owns {
            return Err(ServiceError::Forbidden(denial.to_string()));
        }
        Ok(())
    }

    pub async fn list_access(
        &self,
        auth: &AuthUser,
        query: ClientAccessListQuery,
    ) -> Result<PaginatedResponse<client_access::Model>, ServiceError> {
        let (page, limit) = paginate(query.page, query.limit);

        let mut finder = client_access::Entity::find();
        if let Some(client_id) = query.client_id {
            finder = finder.filter(client_access::Column::ClientId.eq(client_id));
        }
        if let Some(project_id) = query.project_id {
            finder = finder.filter(client_access::Column::ProjectId.eq(project_id));
        }
        if !auth.is_admin() {
            let own = employee_for_user(self.db.as_ref(), auth).await?;
            let managed = project::Entity::find()
                .filter(project::Column::CreatedBy.eq(own.id))
                .all(self.db.as_ref())
                .await?;
            let ids: Vec<Uuid> = managed.into_iter().map(|p| p.id).collect();
            finder = finder.filter(client_access::Column::ProjectId.is_in(ids));
        }

        let paginator = finder
            .order_by_desc(client_access::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    pub async fn get_access(
        &self,
        auth: &AuthUser,
        id: Uuid,
    ) -> Result<client_access::Model, ServiceError> {
        let access = self.load(id).await?;
        if auth.has_role("client") {
            if access.client_id != auth.id {
                return Err(ServiceError::Forbidden(
                    "You don't have permission to view this access record".to_string(),
                ));
            }
        } else if !auth.is_admin() {
            self.ensure_manages_project(
                auth,
                access.project_id,
                "You don't have permission to view this access record",
            )
            .await?;
        }
        Ok(access)
    }

    #[instrument(skip(self, auth, request))]
    pub async fn create_access(
        &self,
        auth: &AuthUser,
        request: CreateClientAccessRequest,
    ) -> Result<client_access::Model, ServiceError> {
        let creator = employee_for_user(self.db.as_ref(), auth).await?;

        let client = user::Entity::find_by_id(request.client_id)
            .one(self.db.as_ref())
            .await?;
        if !client.map(|c| c.role == "client").unwrap_or(false) {
            return Err(ServiceError::BadRequest(
                "User must exist and have the client role".to_string(),
            ));
        }
        project::Entity::find_by_id(request.project_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Project".to_string()))?;
        self.ensure_manages_project(
            auth,
            request.project_id,
            "You can only grant access to projects you manage",
        )
        .await?;

        let existing = client_access::Entity::find()
            .filter(client_access::Column::ClientId.eq(request.client_id))
            .filter(client_access::Column::ProjectId.eq(request.project_id))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "This client already has access to this project".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let model = client_access::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(request.client_id),
            project_id: Set(request.project_id),
            can_view_files: Set(request.can_view_files),
            can_view_tasks: Set(request.can_view_tasks),
            can_view_comments: Set(request.can_view_comments),
            can_view_team: Set(request.can_view_team),
            created_by: Set(creator.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(access_id = %model.id, "client access granted");
        Ok(model)
    }

    #[instrument(skip(self, auth, request), fields(access_id = %id))]
    pub async fn update_access(
        &self,
        auth: &AuthUser,
        id: Uuid,
        request: UpdateClientAccessRequest,
    ) -> Result<client_access::Model, ServiceError> {
        let existing = self.load(id).await?;
        self.ensure_manages_project(
            auth,
            existing.project_id,
            "You can only update access for projects you manage",
        )
        .await?;

        let mut active: client_access::ActiveModel = existing.into();
        if let Some(v) = request.can_view_files {
            active.can_view_files = Set(v);
        }
        if let Some(v) = request.can_view_tasks {
            active.can_view_tasks = Set(v);
        }
        if let Some(v) = request.can_view_comments {
            active.can_view_comments = Set(v);
        }
        if let Some(v) = request.can_view_team {
            active.can_view_team = Set(v);
        }
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, auth), fields(access_id = %id))]
    pub async fn revoke_access(&self, auth: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.load(id).await?;
        self.ensure_manages_project(
            auth,
            existing.project_id,
            "You can only delete access for projects you manage",
        )
        .await?;
        existing.delete(self.db.as_ref()).await?;
        info!(access_id = %id, "client access revoked");
        Ok(())
    }

    // Read-only portal views for client users.

    pub async fn client_projects(
        &self,
        auth: &AuthUser,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<PaginatedResponse<ClientProjectView>, ServiceError> {
        let grants = client_access::Entity::find()
            .filter(client_access::Column::ClientId.eq(auth.id))
            .all(self.db.as_ref())
            .await?;
        let project_ids: Vec<Uuid> = grants.iter().map(|g| g.project_id).collect();

        let (page, limit) = paginate(page, limit);
        let paginator = project::Entity::find()
            .filter(project::Column::Id.is_in(project_ids))
            .order_by_desc(project::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let projects = paginator.fetch_page(page - 1).await?;

        let mut items = Vec::with_capacity(projects.len());
        for p in projects {
            if let Some(grant) = grants.iter().find(|g| g.project_id == p.id) {
                items.push(self.build_view(p, grant).await?);
            }
        }
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    pub async fn client_project(
        &self,
        auth: &AuthUser,
        project_id: Uuid,
    ) -> Result<ClientProjectView, ServiceError> {
        let grant = client_access::Entity::find()
            .filter(client_access::Column::ClientId.eq(auth.id))
            .filter(client_access::Column::ProjectId.eq(project_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::Forbidden("You don't have access to this project".to_string())
            })?;
        let project = project::Entity::find_by_id(project_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Project".to_string()))?;
        self.build_view(project, &grant).await
    }

    async fn build_view(
        &self,
        project: project::Model,
        grant: &client_access::Model,
    ) -> Result<ClientProjectView, ServiceError> {
        let tasks = if grant.can_view_tasks || grant.can_view_comments {
            Some(
                task::Entity::find()
                    .filter(task::Column::ProjectId.eq(project.id))
                    .all(self.db.as_ref())
                    .await?,
            )
        } else {
            None
        };

        let members = if grant.can_view_team {
            let memberships = project_member::Entity::find()
                .filter(project_member::Column::ProjectId.eq(project.id))
                .all(self.db.as_ref())
                .await?;
            let mut list = Vec::with_capacity(memberships.len());
            for m in memberships {
                if let Some(emp) = employee::Entity::find_by_id(m.employee_id)
                    .one(self.db.as_ref())
                    .await?
                {
                    list.push(PortalMember {
                        id: emp.id,
                        name: emp.full_name(),
                        position: emp.position,
                        role: m.role,
                    });
                }
            }
            Some(list)
        } else {
            None
        };

        let comments = if grant.can_view_comments {
            let task_ids: Vec<Uuid> = tasks
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|t| t.id)
                .collect();
            Some(
                task_comment::Entity::find()
                    .filter(task_comment::Column::TaskId.is_in(task_ids))
                    .order_by_asc(task_comment::Column::CreatedAt)
                    .all(self.db.as_ref())
                    .await?,
            )
        } else {
            None
        };

        Ok(ClientProjectView {
            project,
            tasks: if grant.can_view_tasks { tasks } else { None },
            members,
            comments,
        })
    }
}
