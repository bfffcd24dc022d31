use std::sync::Arc;

use leadops_core::config::{AppConfig, ConfigError};
use leadops_core::{LeadPipeline, PipelineSettings};
use leadops_db::{
    connect_with_config, migrations, DbPool, SqlFeedbackStore, SqlIdentityResolver,
    SqlLeadHistoryStore,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: LeadPipeline,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let pipeline = build_pipeline(&db_pool, PipelineSettings::from(&config.pipeline));
    info!(
        event_name = "system.bootstrap.pipeline_ready",
        correlation_id = "bootstrap",
        storage_timeout_ms = config.pipeline.storage_timeout_ms,
        read_retry_attempts = config.pipeline.read_retry_attempts,
        "lead pipeline constructed"
    );

    Ok(Application { config, db_pool, pipeline })
}

pub fn build_pipeline(db_pool: &DbPool, settings: PipelineSettings) -> LeadPipeline {
    LeadPipeline::new(
        Arc::new(SqlLeadHistoryStore::new(db_pool.clone())),
        Arc::new(SqlFeedbackStore::new(db_pool.clone())),
        Arc::new(SqlIdentityResolver::new(db_pool.clone())),
        settings,
    )
}

#[cfg(test)]
mod tests {
    use leadops_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use leadops_core::ManagerName;

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_database_urls() {
        let result = bootstrap(overrides("postgres://localhost/leads")).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("database.url"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_the_pipeline() {
        let app = bootstrap(overrides("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed with an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('app_user', 'lead_disposition', 'lead_feedback')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("lead tables should exist after bootstrap");
        assert_eq!(table_count, 3);

        let leads = app
            .pipeline
            .select_current_direct_leads(&ManagerName::new("alice"))
            .await
            .expect("empty database selects nothing");
        assert!(leads.is_empty());
    }
}
