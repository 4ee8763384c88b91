use std::sync::Arc;

use helsesjekk_core::config::{AppConfig, ConfigError};
use helsesjekk_db::{
    connect_with_settings, migrations, DbPool, SqlAnswerRepository, SqlAskRepository,
    SqlTeamRepository,
};
use helsesjekk_slack::api::{HttpSlackWebApi, SlackWebApi};
use helsesjekk_slack::commands::CommandRouter;
use helsesjekk_slack::events::EventDispatcher;
use helsesjekk_slack::mentions::{MentionCollaborators, MentionRouter};
use helsesjekk_slack::socket::{ReconnectPolicy, SocketModeRunner};
use helsesjekk_slack::survey::{
    AnswerActionHandler, RepositoryQuestionScorer, SlackSurveyWorkflow,
};
use helsesjekk_slack::transport::WebSocketTransport;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
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
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = %config.runtime.environment,
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

    let api: Arc<dyn SlackWebApi> =
        Arc::new(HttpSlackWebApi::new(&config.slack.api_base_url, config.slack.bot_token.clone()));
    let dispatcher = build_dispatcher(&config, &db_pool, api);
    let transport = Arc::new(WebSocketTransport::new(
        &config.slack.api_base_url,
        config.slack.app_token.clone(),
    ));

    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        debug_commands_enabled = config.runtime.debug_commands_enabled(),
        "slack event handlers registered"
    );

    Ok(Application {
        slack_runner: SocketModeRunner::new(transport, dispatcher, ReconnectPolicy::default()),
        config,
        db_pool,
    })
}

/// Wires the routers to SQL repositories and the given web API.
pub fn build_dispatcher(
    config: &AppConfig,
    db_pool: &DbPool,
    api: Arc<dyn SlackWebApi>,
) -> EventDispatcher {
    let teams = Arc::new(SqlTeamRepository::new(db_pool.clone()));
    let asks = Arc::new(SqlAskRepository::new(db_pool.clone()));
    let answers = Arc::new(SqlAnswerRepository::new(db_pool.clone()));
    let workflow = Arc::new(SlackSurveyWorkflow::new(api.clone(), asks.clone(), answers.clone()));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandRouter::new(api.clone(), teams.clone()));
    dispatcher.register(MentionRouter::new(
        config.runtime.debug_commands_enabled(),
        config.runtime.environment.as_str(),
        MentionCollaborators {
            teams: teams.clone(),
            asks: asks.clone(),
            workflow: workflow.clone(),
            scorer: Arc::new(RepositoryQuestionScorer::new(answers.clone())),
            api,
        },
    ));
    dispatcher.register(AnswerActionHandler::new(teams, asks, answers, workflow));
    dispatcher
}
