use std::time::Duration;

use migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub type DbPool = DatabaseConnection;

/// Database connection settings derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
    pub sqlx_logging: bool,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        DbConfig {
            url: config.database_url.clone(),
            max_connections: config.database.max_connections,
            min_connections: config.database.min_connections,
            connect_timeout: Duration::from_secs(config.database.connect_timeout_seconds),
            idle_timeout: Duration::from_secs(config.database.idle_timeout_seconds),
            acquire_timeout: Duration::from_secs(config.database.acquire_timeout_seconds),
            sqlx_logging: !config.is_production(),
        }
    }
}

pub async fn establish_connection_with_config(config: DbConfig) -> Result<DbPool, DbErr> {
    let mut options = ConnectOptions::new(config.url);
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(config.sqlx_logging);

    Database::connect(options).await
}

pub async fn establish_connection_from_app_config(config: &AppConfig) -> Result<DbPool, DbErr> {
    establish_connection_with_config(DbConfig::from_app_config(config)).await
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("running database migrations");
    Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError)?;
    info!("database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSection;

    #[test]
    fn db_config_mirrors_app_config() {
        let mut cfg = crate::config::AppConfig {
            host: "0.0.0.0".into(),
            port: 8080,
            environment: "development".into(),
            log_level: "info".into(),
            log_json: false,
            database_url: "sqlite::memory:".into(),
            auto_migrate: true,
            jwt_secret: "x".repeat(64),
            jwt_expiration: 3600,
            refresh_expiration: 604_800,
            auth_issuer: "peopleops-api".into(),
            auth_audience: "peopleops-clients".into(),
            api_key_prefix: "pop_".into(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            billing_webhook_secret: None,
            billing_api_key: None,
            billing_api_base: "https://billing.invalid/v1".into(),
            billing_redirect_base: None,
            database: DatabaseSection::default(),
        };
        cfg.database.max_connections = 42;

        let db = DbConfig::from_app_config(&cfg);
        assert_eq!(db.url, "sqlite::memory:");
        assert_eq!(db.max_connections, 42);
        assert_eq!(db.acquire_timeout, Duration::from_secs(8));
        assert!(db.sqlx_logging);

        cfg.environment = "production".into();
        assert!(!DbConfig::from_app_config(&cfg).sqlx_logging);
    }
}
