use std::sync::Arc;

use roleflow_core::config::{AppConfig, ConfigError, LoadOptions};
use roleflow_core::errors::DialogueError;
use roleflow_db::{connect_with_config, migrations, DbPool, SqlUserRepository};
use roleflow_slack::{
    DialogueService, EventDispatcher, MessageHandler, ReconnectPolicy, RoleHandlers,
    SocketModeRunner, WebApiChatTransport, WebSocketTransport,
};
use thiserror::Error;
use tracing::info;

pub type Dialogues = DialogueService<SqlUserRepository>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dialogues: Arc<Dialogues>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("dialogue graph is invalid: {0}")]
    Dialogue(#[from] DialogueError),
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

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let repo = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let dialogues = Arc::new(DialogueService::new(Arc::clone(&repo), config.dialogue.on_conflict)?);

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(
        RoleHandlers::new(repo, Arc::clone(&dialogues)),
        Arc::clone(&dialogues),
    ));

    let slack_runner = SocketModeRunner::new(
        Arc::new(WebSocketTransport::new(
            config.slack.app_token.clone(),
            config.slack.bot_token.clone(),
        )),
        dispatcher,
        Arc::new(WebApiChatTransport::new(config.slack.bot_token.clone())),
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.slack_wired",
        correlation_id = "bootstrap",
        on_conflict = config.dialogue.on_conflict.as_str(),
        "slack handlers registered"
    );

    Ok(Application { config, db_pool, dialogues, slack_runner })
}
