pub mod ollama;

use crate::errors::PipelineError;
use async_trait::async_trait;
use dyn_clone::DynClone;
pub use ollama::OllamaProvider;
use std::fmt::Debug;

/// A trait for interacting with an AI provider.
///
/// The pipeline uses this seam for classification fallback, follow-up
/// enhancement, free-text date extraction and complaint-text improvement.
/// Every call site has a deterministic local fallback, so implementations
/// are best-effort by contract.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, PipelineError>;
}

dyn_clone::clone_trait_object!(AiProvider);
