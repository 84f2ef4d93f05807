use std::sync::Arc;

use replog_agent::{
    ChatPipeline, ChatRequest, GroqClient, RuleBasedClient, UnderstandingClient,
};
use replog_core::config::{AppConfig, LlmProvider, LoadOptions};
use replog_core::domain::interaction::InteractionId;
use replog_db::{connect_with_settings, migrations, SqlInteractionRepository};

use crate::commands::CommandResult;

pub fn run(message: &str, last_interaction_id: Option<i64>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let client: Arc<dyn UnderstandingClient> = match config.llm.provider {
        LlmProvider::Rules => Arc::new(RuleBasedClient::new()),
        _ => match GroqClient::from_config(&config.llm) {
            Ok(client) => Arc::new(client),
            Err(error) => {
                return CommandResult::failure(
                    "chat",
                    "llm_client",
                    format!("understanding client setup failed: {error}"),
                    3,
                );
            }
        },
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let gateway = Arc::new(SqlInteractionRepository::new(pool.clone()));
        let pipeline = ChatPipeline::new(client, gateway);

        let outcome = pipeline
            .handle(ChatRequest {
                message: message.to_string(),
                user_name: None,
                last_interaction_id: last_interaction_id.map(InteractionId),
            })
            .await
            .map_err(|error| ("pipeline", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<String, (&'static str, String, u8)>(outcome.reply)
    });

    match result {
        Ok(reply) => CommandResult::success("chat", reply),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}
