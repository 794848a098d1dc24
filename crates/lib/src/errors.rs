use thiserror::Error;

/// Custom error types for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Request to AI provider failed: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("Database connection error: {0}")]
    StorageConnection(String),
    #[error("Database query execution failed: {0}")]
    StorageQueryFailed(String),
    #[error("SmartCare token request failed: {0}")]
    SmartCareToken(String),
    #[error("SmartCare API request failed: {0}")]
    SmartCareRequest(String),
    #[error("Database provider is missing")]
    MissingDatabaseProvider,
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("Failed to serialize result: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}
