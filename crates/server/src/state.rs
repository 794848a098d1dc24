//! # Application State
//!
//! Builds the shared [`AppState`] from the configuration: instantiates the
//! AI, database and SmartCare providers and wires them into the pipeline.

use crate::config::AppConfig;
use lapor::mapping::SemanticMapping;
use lapor::providers::ai::OllamaProvider;
use lapor::providers::db::ClickHouseProvider;
use lapor::providers::smartcare::{SmartCareClient, SmartCareConfig};
use lapor::session::InMemorySessionStore;
use lapor::{ChatPipeline, ChatPipelineBuilder};
use std::sync::Arc;
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
}

/// Builds the shared application state from the configuration.
pub fn build_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let mut builder = ChatPipelineBuilder::new();

    if let Some(ai) = &config.ai {
        info!("using Ollama provider at {} ({})", ai.api_url, ai.model);
        builder = builder.ai_provider(Box::new(OllamaProvider::new(
            ai.api_url.clone(),
            ai.model.clone(),
        )?));
    } else {
        info!("no AI provider configured, deterministic fallbacks only");
    }

    let database = ClickHouseProvider::new(
        config.clickhouse.url.clone(),
        config.clickhouse.user.clone(),
        config.clickhouse.password.clone(),
        config.clickhouse.database.clone(),
    )?;
    builder = builder.database(Box::new(database));

    if let Some(table) = &config.clickhouse.table {
        builder = builder.mapping(SemanticMapping {
            table_name: table.clone(),
            ..SemanticMapping::default()
        });
    }

    if let Some(smartcare) = &config.smartcare {
        info!("SmartCare client configured for {}", smartcare.query_url);
        builder = builder.smartcare(Box::new(SmartCareClient::new(SmartCareConfig {
            token_url: smartcare.token_url.clone(),
            query_url: smartcare.query_url.clone(),
            app_key: smartcare.app_key.clone(),
            app_secret: smartcare.app_secret.clone(),
            request_uuid: smartcare.request_uuid.clone(),
            user_name: smartcare.user_name.clone(),
        })?));
    } else {
        info!("no SmartCare credentials, live lookups answer with maintenance message");
    }

    builder = builder.session_store(Box::new(InMemorySessionStore::new(config.session_ttl_secs)));

    Ok(AppState {
        pipeline: Arc::new(builder.build()?),
    })
}
