//! # Application Configuration
//!
//! Loads the server configuration from `config.yml` plus environment
//! overrides (prefix `LAPOR`, `__` separator). Only the ClickHouse section
//! is mandatory; the AI and SmartCare sections are optional and the
//! pipeline degrades gracefully without them.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    General(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The AI provider used for classification fallback and text tasks.
    #[serde(default)]
    pub ai: Option<AiConfig>,
    /// The complaint database.
    pub clickhouse: ClickHouseConfig,
    /// The live SmartCare API credentials.
    #[serde(default)]
    pub smartcare: Option<SmartCareSettings>,
    /// Session expiry in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,
}

fn default_port() -> u16 {
    9090
}

fn default_session_ttl() -> i64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    pub api_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
}

fn default_ai_model() -> String {
    "llama3".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClickHouseConfig {
    pub url: String,
    #[serde(default = "default_clickhouse_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

fn default_clickhouse_user() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmartCareSettings {
    pub token_url: String,
    pub query_url: String,
    pub app_key: String,
    pub app_secret: String,
    pub request_uuid: String,
    #[serde(default = "default_smartcare_user")]
    pub user_name: String,
}

fn default_smartcare_user() -> String {
    "admin".to_string()
}

/// Loads the configuration from `config.yml` and the environment.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = ConfigBuilder::builder()
        .add_source(File::with_name("config").format(FileFormat::Yaml).required(false))
        .add_source(Environment::with_prefix("LAPOR").separator("__"))
        .build()?;
    Ok(config.try_deserialize()?)
}
