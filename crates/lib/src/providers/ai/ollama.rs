use crate::{errors::PipelineError, providers::ai::AiProvider};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// --- Ollama generate request and response structures ---

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
}

// --- Ollama provider implementation ---

/// A provider for a local Ollama instance. Classification and enhancement
/// call sites depend on deterministic output, so temperature is pinned to 0.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    client: ReqwestClient,
    api_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(api_url: String, model: String) -> Result<Self, PipelineError> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(PipelineError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            model,
        })
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PipelineError> {
        let request_body = OllamaRequest {
            model: &self.model,
            prompt: format!("{system_prompt}\n\n{user_prompt}"),
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request_body)
            .send()
            .await
            .map_err(PipelineError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::AiApi(error_text));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(PipelineError::AiDeserialization)?;

        Ok(ollama_response.response.trim().to_string())
    }
}
