pub mod rbac;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{department, employee, user};

pub const TOKEN_SCOPE_ACCESS: &str = "access";
pub const TOKEN_SCOPE_REFRESH: &str = "refresh";

/// Errors surfaced by authentication and authorization.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authentication token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account is disabled")]
    AccountDisabled,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("internal auth error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthError::Validation(errors.to_string())
    }
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::WrongPassword => "wrong_password",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::Conflict(_) => "conflict",
            AuthError::NotFound(_) => "not_found",
            AuthError::Validation(_) => "validation_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::InvalidCredentials
            | AuthError::AccountDisabled
            | AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Conflict(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Internal(detail) => {
                warn!(error = %detail, "auth internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

/// JWT claims for both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub employee_id: Option<Uuid>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
    pub scope: String,
}

/// Access plus refresh token issued at login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Authenticated caller, extracted from request extensions after the auth
/// middleware has validated the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub employee_id: Option<Uuid>,
    pub jti: String,
}

impl AuthUser {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a UUID".to_string()))?;
        Ok(AuthUser {
            id,
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role.clone(),
            permissions: claims.permissions.clone(),
            employee_id: claims.employee_id,
            jti: claims.jti.clone(),
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        rbac::grants(&self.permissions, permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    /// Admin and HR can act on any employee record.
    pub fn is_people_ops(&self) -> bool {
        self.is_admin() || self.has_role("hr")
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Token issuing configuration.
#[derive(Clone)]
pub struct AuthConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_expiry: Duration,
    refresh_expiry: Duration,
    #[allow(dead_code)]
    api_key_prefix: String,
}

impl AuthConfig {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_expiry: Duration,
        refresh_expiry: Duration,
        api_key_prefix: impl Into<String>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(secret.len() >= 32, "jwt secret is too short");
        Ok(AuthConfig {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            access_expiry,
            refresh_expiry,
            api_key_prefix: api_key_prefix.into(),
        })
    }

    pub fn access_expiry_secs(&self) -> u64 {
        self.access_expiry.as_secs()
    }
}

/// Encode claims into a signed JWT.
pub fn encode_token(config: &AuthConfig, claims: &Claims) -> Result<String, AuthError> {
    encode(&Header::default(), claims, &config.encoding_key)
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// Decode and verify a JWT, checking signature, expiry, issuer, audience,
/// and the expected scope.
pub fn decode_token(
    config: &AuthConfig,
    token: &str,
    expected_scope: &str,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    let data = decode::<Claims>(token, &config.decoding_key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        }
    })?;

    if data.claims.scope != expected_scope {
        return Err(AuthError::InvalidToken(format!(
            "expected {} token",
            expected_scope
        )));
    }
    Ok(data.claims)
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone)]
struct BlacklistedToken {
    jti: String,
    exp: i64,
}

/// In-memory revocation list for logged-out tokens. Entries are pruned once
/// their expiry passes.
#[derive(Debug, Default)]
pub struct TokenBlacklist {
    inner: RwLock<Vec<BlacklistedToken>>,
}

impl TokenBlacklist {
    pub async fn revoke(&self, jti: &str, exp: i64) {
        let now = Utc::now().timestamp();
        let mut tokens = self.inner.write().await;
        tokens.retain(|t| t.exp > now);
        tokens.push(BlacklistedToken {
            jti: jti.to_string(),
            exp,
        });
    }

    pub async fn contains(&self, jti: &str) -> bool {
        self.inner.read().await.iter().any(|t| t.jti == jti)
    }
}

/// Authentication service: credential checks, token lifecycle, and the
/// account endpoints under `/auth`.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
    blacklist: Arc<TokenBlacklist>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        AuthService {
            config,
            db,
            blacklist: Arc::new(TokenBlacklist::default()),
        }
    }

    fn build_claims(
        &self,
        user: &user::Model,
        employee: Option<&employee::Model>,
        scope: &str,
    ) -> Claims {
        let now = Utc::now().timestamp();
        let expiry = if scope == TOKEN_SCOPE_REFRESH {
            self.config.refresh_expiry
        } else {
            self.config.access_expiry
        };
        let name = employee
            .map(|e| e.full_name())
            .unwrap_or_else(|| user.email.clone());

        Claims {
            sub: user.id.to_string(),
            name,
            email: user.email.clone(),
            role: user.role.clone(),
            permissions: rbac::permissions_for_role(&user.role),
            employee_id: employee.map(|e| e.id),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + expiry.as_secs() as i64,
            nbf: now,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            scope: scope.to_string(),
        }
    }

    pub fn issue_token_pair(
        &self,
        user: &user::Model,
        employee: Option<&employee::Model>,
    ) -> Result<TokenPair, AuthError> {
        let access = self.build_claims(user, employee, TOKEN_SCOPE_ACCESS);
        let refresh = self.build_claims(user, employee, TOKEN_SCOPE_REFRESH);
        Ok(TokenPair {
            access_token: encode_token(&self.config, &access)?,
            refresh_token: encode_token(&self.config, &refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_expiry_secs(),
        })
    }

    pub async fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode_token(&self.config, token, TOKEN_SCOPE_ACCESS)?;
        if self.blacklist.contains(&claims.jti).await {
            return Err(AuthError::TokenRevoked);
        }
        Ok(claims)
    }

    pub async fn revoke(&self, claims: &Claims) {
        self.blacklist.revoke(&claims.jti, claims.exp).await;
    }

    async fn find_employee(&self, user_id: Uuid) -> Result<Option<employee::Model>, AuthError> {
        Ok(employee::Entity::find()
            .filter(employee::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let employee = self.find_employee(user.id).await?;
        let tokens = self.issue_token_pair(&user, employee.as_ref())?;

        let mut active: user::ActiveModel = user.clone().into();
        active.last_login = Set(Some(Utc::now().naive_utc()));
        active.updated_at = Set(Utc::now().naive_utc());
        let user = active.update(self.db.as_ref()).await?;

        info!(user_id = %user.id, role = %user.role, "user logged in");

        Ok(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            user: UserSummary::new(&user, employee.as_ref()),
        })
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserSummary, AuthError> {
        request.validate()?;

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(&request.email))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }

        let role = request.role.unwrap_or_else(|| "employee".to_string());
        if !rbac::ROLES.contains_key(&role) {
            return Err(AuthError::Validation(format!("Invalid role: {}", role)));
        }

        let now = Utc::now().naive_utc();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(request.email),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(role),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let user = model.insert(self.db.as_ref()).await?;
        info!(user_id = %user.id, role = %user.role, "user registered");

        Ok(UserSummary::new(&user, None))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = decode_token(&self.config, refresh_token, TOKEN_SCOPE_REFRESH)?;
        if self.blacklist.contains(&claims.jti).await {
            return Err(AuthError::TokenRevoked);
        }
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a UUID".to_string()))?;

        let user = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let employee = self.find_employee(user.id).await?;
        self.issue_token_pair(&user, employee.as_ref())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<MeResponse, AuthError> {
        let user = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        let employee = self.find_employee(user.id).await?;
        let department = match employee.as_ref().and_then(|e| e.department_id) {
            Some(dept_id) => department::Entity::find_by_id(dept_id)
                .one(self.db.as_ref())
                .await?,
            None => None,
        };

        Ok(MeResponse {
            id: user.id,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            last_login: user.last_login.map(|t| t.and_utc().to_rfc3339()),
            employee: employee.map(|e| EmployeeProfile {
                id: e.id,
                employee_number: e.employee_number.clone(),
                first_name: e.first_name.clone(),
                last_name: e.last_name.clone(),
                position: e.position.clone(),
                profile_image: e.profile_image.clone(),
                department: department.map(|d| d.name),
            }),
        })
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        request.validate()?;

        let user = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::WrongPassword);
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(self.db.as_ref()).await?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}

/// Build the auth config from app configuration.
pub fn auth_config_from_app(config: &crate::config::AppConfig) -> anyhow::Result<AuthConfig> {
    AuthConfig::new(
        &config.jwt_secret,
        config.auth_issuer.clone(),
        config.auth_audience.clone(),
        Duration::from_secs(config.jwt_expiration),
        Duration::from_secs(config.refresh_expiration),
        config.api_key_prefix.clone(),
    )
    .context("failed to create auth config")
}

// Request and response payloads for the /auth routes.

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<EmployeeSummary>,
}

impl UserSummary {
    fn new(user: &user::Model, employee: Option<&employee::Model>) -> Self {
        UserSummary {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            employee: employee.map(|e| EmployeeSummary {
                id: e.id,
                first_name: e.first_name.clone(),
                last_name: e.last_name.clone(),
                position: e.position.clone(),
                profile_image: e.profile_image.clone(),
            }),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<EmployeeProfile>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EmployeeProfile {
    pub id: Uuid,
    pub employee_number: String,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub profile_image: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

// Middleware.

/// Validates the bearer token and stashes the [`AuthUser`] in request
/// extensions. Expects an `Arc<AuthService>` to already be in extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| AuthError::Internal("auth service not available".to_string()))?;

    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let claims = service.validate_access_token(token).await?;
    let auth_user = AuthUser::from_claims(&claims)?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

async fn require_permission(
    permission: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;
    if !user.has_permission(permission) {
        return Err(AuthError::Forbidden(format!(
            "Missing permission: {}",
            permission
        )));
    }
    Ok(next.run(request).await)
}

async fn require_role(
    role: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;
    if !user.has_role(role) && !user.is_admin() {
        return Err(AuthError::Forbidden(format!("Requires role: {}", role)));
    }
    Ok(next.run(request).await)
}

/// Router extensions for attaching auth and authorization layers.
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &'static str) -> Self;
    fn with_role(self, role: &'static str) -> Self;
}

impl<S: Clone + Send + Sync + 'static> AuthRouterExt for Router<S> {
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    // Layers run outermost-last-added, so auth always runs before the check.
    fn with_permission(self, permission: &'static str) -> Self {
        self.layer(axum::middleware::from_fn(move |req, next| {
            require_permission(permission, req, next)
        }))
        .layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: &'static str) -> Self {
        self.layer(axum::middleware::from_fn(move |req, next| {
            require_role(role, req, next)
        }))
        .layer(axum::middleware::from_fn(auth_middleware))
    }
}

// Route handlers.

#[utoipa::path(
    post,
    path = "/auth/login",
    summary = "Log in with email and password",
    request_body = LoginRequest,
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, description = "Invalid credentials or disabled account"),
    )
)]
pub(crate) async fn login_handler(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    request.validate()?;
    let response = service.login(&request.email, &request.password).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    summary = "Register a new user account (admin only)",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = UserSummary),
        (status = 403, description = "Caller is not an administrator"),
    ),
    security(("Bearer" = []))
)]
pub(crate) async fn register_handler(
    State(service): State<Arc<AuthService>>,
    auth_user: AuthUser,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserSummary>), AuthError> {
    if !auth_user.is_admin() {
        return Err(AuthError::Forbidden(
            "Only administrators can register new users".to_string(),
        ));
    }
    let user = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    summary = "Exchange a refresh token for a new token pair",
    request_body = RefreshRequest,
    responses((status = 200, body = TokenPair), (status = 401))
)]
pub(crate) async fn refresh_handler(
    State(service): State<Arc<AuthService>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = service.refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    summary = "Current account with employee profile",
    responses((status = 200, body = MeResponse)),
    security(("Bearer" = []))
)]
pub(crate) async fn me_handler(
    State(service): State<Arc<AuthService>>,
    auth_user: AuthUser,
) -> Result<Json<MeResponse>, AuthError> {
    let me = service.current_user(auth_user.id).await?;
    Ok(Json(me))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    summary = "Change the current user's password",
    request_body = ChangePasswordRequest,
    responses((status = 200), (status = 401, description = "Current password is incorrect")),
    security(("Bearer" = []))
)]
pub(crate) async fn change_password_handler(
    State(service): State<Arc<AuthService>>,
    auth_user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    service.change_password(auth_user.id, request).await?;
    Ok(Json(
        serde_json::json!({ "message": "Password changed successfully" }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    summary = "Revoke the current access token",
    responses((status = 200)),
    security(("Bearer" = []))
)]
pub(crate) async fn logout_handler(
    State(service): State<Arc<AuthService>>,
    claims: axum::Extension<Claims>,
) -> Result<Json<serde_json::Value>, AuthError> {
    service.revoke(&claims).await;
    Ok(Json(
        serde_json::json!({ "message": "Logged out successfully" }),
    ))
}

/// Routes mounted under `/auth`.
pub fn auth_routes() -> Router<Arc<AuthService>> {
    let public = Router::new()
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_handler));

    let protected = Router::new()
        .route("/register", post(register_handler))
        .route("/me", get(me_handler))
        .route("/change-password", post(change_password_handler))
        .route("/logout", post(logout_handler))
        .with_auth();

    public.merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
            "peopleops-api",
            "peopleops-clients",
            Duration::from_secs(3600),
            Duration::from_secs(604_800),
            "pop_",
        )
        .unwrap()
    }

    fn test_claims(config: &AuthConfig, scope: &str) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4().to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role: "employee".to_string(),
            permissions: rbac::permissions_for_role("employee"),
            employee_id: Some(Uuid::new_v4()),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + 3600,
            nbf: now,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            scope: scope.to_string(),
        }
    }

    #[test]
    fn token_round_trip() {
        let config = test_config();
        let claims = test_claims(&config, TOKEN_SCOPE_ACCESS);
        let token = encode_token(&config, &claims).unwrap();
        let decoded = decode_token(&config, &token, TOKEN_SCOPE_ACCESS).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, "employee");
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let config = test_config();
        let claims = test_claims(&config, TOKEN_SCOPE_REFRESH);
        let token = encode_token(&config, &claims).unwrap();
        assert!(matches!(
            decode_token(&config, &token, TOKEN_SCOPE_ACCESS),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_rejected() {
        let config = test_config();
        let mut claims = test_claims(&config, TOKEN_SCOPE_ACCESS);
        claims.iat -= 7200;
        claims.exp = claims.iat + 10;
        claims.nbf = claims.iat;
        let token = encode_token(&config, &claims).unwrap();
        assert!(matches!(
            decode_token(&config, &token, TOKEN_SCOPE_ACCESS),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn tampered_token_rejected() {
        let config = test_config();
        let claims = test_claims(&config, TOKEN_SCOPE_ACCESS);
        let mut token = encode_token(&config, &claims).unwrap();
        token.push('x');
        assert!(decode_token(&config, &token, TOKEN_SCOPE_ACCESS).is_err());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[tokio::test]
    async fn blacklist_revokes_and_prunes() {
        let blacklist = TokenBlacklist::default();
        let future_exp = Utc::now().timestamp() + 3600;
        blacklist.revoke("token-a", future_exp).await;
        assert!(blacklist.contains("token-a").await);
        assert!(!blacklist.contains("token-b").await);

        // Expired entries are dropped on the next revoke.
        let blacklist = TokenBlacklist::default();
        blacklist.revoke("stale", Utc::now().timestamp() - 10).await;
        blacklist.revoke("fresh", future_exp).await;
        assert!(!blacklist.contains("stale").await);
        assert!(blacklist.contains("fresh").await);
    }

    #[test]
    fn auth_user_permission_checks() {
        let config = test_config();
        let claims = test_claims(&config, TOKEN_SCOPE_ACCESS);
        let user = AuthUser::from_claims(&claims).unwrap();
        assert!(user.has_permission(rbac::perm::ATTENDANCE_CLOCK));
        assert!(!user.has_permission(rbac::perm::PAYROLL_MANAGE));
        assert!(!user.is_admin());
        assert!(!user.is_people_ops());
    }
}
