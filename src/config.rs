use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Errors raised while loading or validating application configuration.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("configuration io error: {0}")]
    Io(String),
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_jwt_expiration() -> u64 {
    3600
}

fn default_refresh_expiration() -> u64 {
    604_800
}

fn default_auth_issuer() -> String {
    "peopleops-api".to_string()
}

fn default_auth_audience() -> String {
    "peopleops-clients".to_string()
}

fn default_api_key_prefix() -> String {
    "pop_".to_string()
}

fn default_true() -> bool {
    true
}

fn default_billing_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

/// Connection pool tuning.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    #[serde(default = "DatabaseSection::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "DatabaseSection::default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "DatabaseSection::default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "DatabaseSection::default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "DatabaseSection::default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
}

impl DatabaseSection {
    fn default_max_connections() -> u32 {
        16
    }
    fn default_min_connections() -> u32 {
        2
    }
    fn default_connect_timeout_seconds() -> u64 {
        30
    }
    fn default_idle_timeout_seconds() -> u64 {
        600
    }
    fn default_acquire_timeout_seconds() -> u64 {
        8
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            max_connections: Self::default_max_connections(),
            min_connections: Self::default_min_connections(),
            connect_timeout_seconds: Self::default_connect_timeout_seconds(),
            idle_timeout_seconds: Self::default_idle_timeout_seconds(),
            acquire_timeout_seconds: Self::default_acquire_timeout_seconds(),
        }
    }
}

/// Application configuration, sourced from config files plus `APP__*`
/// environment variables.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    /// Signing secret for access and refresh tokens. Never ships a default.
    #[validate(
        length(min = 64, message = "jwt_secret must be at least 64 characters"),
        custom = "validate_jwt_secret"
    )]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    #[serde(default = "default_refresh_expiration")]
    pub refresh_expiration: u64,

    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    #[serde(default = "default_api_key_prefix")]
    pub api_key_prefix: String,

    /// Comma separated list of allowed CORS origins.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Explicit opt-in for permissive CORS outside production.
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Shared secret for verifying billing webhook signatures.
    #[serde(default)]
    pub billing_webhook_secret: Option<String>,

    /// Secret API key for the billing provider. Billing endpoints other
    /// than the webhook report the provider as unconfigured while unset.
    #[serde(default)]
    pub billing_api_key: Option<String>,

    #[serde(default = "default_billing_api_base")]
    pub billing_api_base: String,

    /// Fallback base URL for checkout success/cancel and portal return
    /// redirects when the caller does not supply them.
    #[serde(default)]
    pub billing_redirect_base: Option<String>,

    #[serde(default)]
    #[validate]
    pub database: DatabaseSection,
}

const DISALLOWED_SECRET_FRAGMENTS: &[&str] =
    &["changeme", "password", "default", "12345", "abcdef", "secret"];

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let lowered = secret.to_lowercase();
    for fragment in DISALLOWED_SECRET_FRAGMENTS {
        if lowered.contains(fragment) {
            let mut err = ValidationError::new("weak_jwt_secret");
            err.message = Some("jwt_secret contains a well-known weak fragment".into());
            return Err(err);
        }
    }

    let unique: std::collections::HashSet<char> = secret.chars().collect();
    if unique.len() < 10 {
        let mut err = ValidationError::new("weak_jwt_secret");
        err.message = Some("jwt_secret has too little character variety".into());
        return Err(err);
    }

    Ok(())
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Permissive CORS is only acceptable when explicitly opted in outside
    /// production.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.cors_allow_any_origin && !self.is_production()
    }

    fn validate_additional_constraints(&self) -> Result<(), AppConfigError> {
        if self.is_production() && self.cors_allow_any_origin {
            return Err(AppConfigError::Io(
                "cors_allow_any_origin must not be enabled in production".to_string(),
            ));
        }
        if self.jwt_expiration == 0 || self.refresh_expiration == 0 {
            return Err(AppConfigError::Io(
                "token expirations must be greater than zero".to_string(),
            ));
        }
        if self.refresh_expiration <= self.jwt_expiration {
            return Err(AppConfigError::Io(
                "refresh_expiration must exceed jwt_expiration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    let default_directive = format!("peopleops_api={},tower_http=debug", level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Load configuration from `config/default`, the environment specific file,
/// and `APP__*` environment variables, then validate it.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = std::env::var("RUN_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string());

    let builder = Config::builder()
        .set_default("environment", run_env.clone())?
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let raw = builder.build()?;

    // Fail early with a pointed message rather than a generic deserialize error.
    if raw.get_string("jwt_secret").is_err() && std::env::var("APP__JWT_SECRET").is_err() {
        error!("jwt_secret is not configured");
        error!("Set APP__JWT_SECRET before starting the server");
        error!("Generate a secure secret with: openssl rand -base64 64");
        return Err(AppConfigError::Io("jwt_secret is required".to_string()));
    }

    let config: AppConfig = raw.try_deserialize()?;
    config.validate()?;
    config.validate_additional_constraints()?;

    info!(
        environment = %config.environment,
        port = config.port,
        auto_migrate = config.auto_migrate,
        "configuration loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            host: default_host(),
            port: default_port(),
            environment: "development".to_string(),
            log_level: default_log_level(),
            log_json: false,
            database_url: "sqlite::memory:".to_string(),
            auto_migrate: true,
            jwt_secret: "kX9mQ2vR7nT4wY8zB3cF6hJ1pL5sA0dG9eN2uW7xV4yK8qM3rT6oI1fC5gH0jZ9b".to_string(),
            jwt_expiration: 3600,
            refresh_expiration: 604_800,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            api_key_prefix: default_api_key_prefix(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            billing_webhook_secret: None,
            billing_api_key: None,
            billing_api_base: default_billing_api_base(),
            billing_redirect_base: None,
            database: DatabaseSection::default(),
        }
    }

    #[test]
    fn accepts_strong_secret() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_weak_secret_fragments() {
        let mut cfg = base_config();
        cfg.jwt_secret =
            "password-password-password-password-password-password-password-p".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_low_variety_secret() {
        let mut cfg = base_config();
        cfg.jwt_secret = "ababababababababababababababababababababababababababababababababab".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_short_secret() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn permissive_cors_requires_non_production() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());

        cfg.environment = "production".to_string();
        assert!(!cfg.should_allow_permissive_cors());
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn refresh_must_outlive_access_token() {
        let mut cfg = base_config();
        cfg.refresh_expiration = cfg.jwt_expiration;
        assert!(cfg.validate_additional_constraints().is_err());
    }
}
