use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::{NaiveDate, Utc};
use peopleops_api::{
    auth::{self, AuthService},
    config::{AppConfig, DatabaseSection},
    db,
    entities::{employee, user},
    events::{self, EventSender},
    handlers::AppServices,
    request_id, AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Signing key for test tokens only. Long and high-entropy so config
/// validation accepts it.
const TEST_JWT_KEY: &str =
    "integration-harness-jwt-signing-material-Kq8vWx4nZr2tYp7mHb3cJd0gFl6sVu";

/// Helper harness for spinning up an application router backed by a
/// throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    auth_service: Arc<AuthService>,
    admin_token: String,
    pub admin_employee: employee::Model,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("peopleops_test.db");

        let cfg = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 18_080,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
            auto_migrate: true,
            jwt_secret: TEST_JWT_KEY.to_string(),
            jwt_expiration: 3_600,
            refresh_expiration: 86_400,
            auth_issuer: "peopleops-api".to_string(),
            auth_audience: "peopleops-clients".to_string(),
            api_key_prefix: "pk_".to_string(),
            cors_allowed_origins: None,
            cors_allow_any_origin: true,
            billing_webhook_secret: Some("test-billing-webhook-secret".to_string()),
            billing_api_key: None,
            billing_api_base: "https://billing.invalid/v1".to_string(),
            billing_redirect_base: None,
            database: DatabaseSection {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_cfg = auth::auth_config_from_app(&cfg).expect("valid auth config for tests");
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let services = AppServices::new(db_arc.clone(), event_sender.clone(), &cfg);
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let auth_for_layer = auth_service.clone();
        let router = Router::new()
            .nest("/api/v1", peopleops_api::api_v1_routes())
            .nest("/auth", auth::auth_routes().with_state(auth_service.clone()))
            .layer(middleware::from_fn_with_state(
                auth_for_layer,
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: Request<Body>,
                 next: middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .layer(middleware::from_fn(request_id::request_id_middleware))
            .with_state(state.clone());

        let mut app = Self {
            router,
            state,
            auth_service,
            admin_token: String::new(),
            admin_employee: placeholder_employee(),
            _event_task: event_task,
            _db_dir: db_dir,
        };

        // Seed an admin account with an employee profile so admin-only
        // flows that need a reviewer or reporter work out of the box.
        let admin = app
            .seed_user("admin@example.com", "admin", "admin-password-1")
            .await;
        let admin_employee = app.seed_employee_for(&admin, "EMP-0001", "Ada", "Admin").await;
        app.admin_token = app.token_for(&admin, Some(&admin_employee));
        app.admin_employee = admin_employee;
        app
    }

    /// Access the auth service used by the test application.
    #[allow(dead_code)]
    pub fn auth_service(&self) -> Arc<AuthService> {
        self.auth_service.clone()
    }

    /// Bearer token for the seeded admin user.
    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Insert a login account directly, bypassing the admin-only
    /// register endpoint.
    pub async fn seed_user(&self, email: &str, role: &str, password: &str) -> user::Model {
        let now = Utc::now().naive_utc();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(auth::hash_password(password).expect("hash test password")),
            role: Set(role.to_string()),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model
            .insert(self.state.db.as_ref())
            .await
            .expect("seed user for tests")
    }

    /// Insert an employee profile linked to the given account.
    pub async fn seed_employee_for(
        &self,
        account: &user::Model,
        employee_number: &str,
        first_name: &str,
        last_name: &str,
    ) -> employee::Model {
        let now = Utc::now().naive_utc();
        let model = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(account.id),
            department_id: Set(None),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.to_string()),
            employee_number: Set(employee_number.to_string()),
            position: Set(Some("Engineer".to_string())),
            date_of_birth: Set(None),
            date_of_joining: Set(NaiveDate::from_ymd_opt(2023, 1, 9).expect("valid date")),
            phone_number: Set(None),
            address: Set(None),
            gender: Set(None),
            manager_id: Set(None),
            profile_image: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model
            .insert(self.state.db.as_ref())
            .await
            .expect("seed employee for tests")
    }

    /// Issue an access token for a seeded account without going through
    /// the login endpoint.
    pub fn token_for(&self, account: &user::Model, profile: Option<&employee::Model>) -> String {
        self.auth_service
            .issue_token_pair(account, profile)
            .expect("issue test token")
            .access_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for admin-authenticated JSON requests.
    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.admin_token()))
            .await
    }

    /// Send a request with extra headers, used by the request-id and
    /// webhook tests.
    #[allow(dead_code)]
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

fn placeholder_employee() -> employee::Model {
    let now = Utc::now().naive_utc();
    employee::Model {
        id: Uuid::nil(),
        user_id: Uuid::nil(),
        department_id: None,
        first_name: String::new(),
        last_name: String::new(),
        employee_number: String::new(),
        position: None,
        date_of_birth: None,
        date_of_joining: NaiveDate::from_ymd_opt(2023, 1, 9).expect("valid date"),
        phone_number: None,
        address: None,
        gender: None,
        manager_id: None,
        profile_image: None,
        created_at: now,
        updated_at: now,
    }
}

/// Decode a response body into JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is valid json")
}
