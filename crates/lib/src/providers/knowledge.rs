use crate::errors::PipelineError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// Minimum similarity for a knowledge hit to be used at all.
pub const SIMILARITY_FLOOR: f64 = 0.7;

/// One knowledge-base search result.
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    pub content: String,
    pub metadata: serde_json::Value,
    pub similarity: f64,
}

/// A trait for the vector-search knowledge base. The embedding model and
/// index live behind this boundary.
#[async_trait]
pub trait KnowledgeBase: Send + Sync + Debug + DynClone {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeHit>, PipelineError>;
}

dyn_clone::clone_trait_object!(KnowledgeBase);
