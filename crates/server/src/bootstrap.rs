use std::sync::Arc;

use replog_agent::{ChatPipeline, GroqClient, RuleBasedClient, UnderstandingClient};
use replog_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use replog_core::errors::ApplicationError;
use replog_core::gateway::InteractionGateway;
use replog_db::{connect_with_settings, migrations, DbPool, SqlInteractionRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gateway: Arc<dyn InteractionGateway>,
    pub pipeline: Arc<ChatPipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("understanding client setup failed: {0}")]
    Understanding(#[source] ApplicationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let client: Arc<dyn UnderstandingClient> = match config.llm.provider {
        LlmProvider::Rules => Arc::new(RuleBasedClient::new()),
        _ => Arc::new(
            GroqClient::from_config(&config.llm).map_err(BootstrapError::Understanding)?,
        ),
    };

    let gateway: Arc<dyn InteractionGateway> =
        Arc::new(SqlInteractionRepository::new(db_pool.clone()));
    let pipeline = Arc::new(ChatPipeline::new(client, gateway.clone()));

    Ok(Application { config, db_pool, gateway, pipeline })
}
