#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared mock providers so tests are isolated and repeatable: a scripted
//! AI provider with call history, a scripted complaint database that records
//! every executed query, and a SmartCare mock that records every call.

use async_trait::async_trait;
use lapor::providers::ai::AiProvider;
use lapor::providers::db::{ComplaintDatabase, Row};
use lapor::providers::knowledge::{KnowledgeBase, KnowledgeHit};
use lapor::providers::smartcare::{SmartCareApi, UserHistory};
use lapor::PipelineError;
use std::sync::{Arc, Once, RwLock};

static INIT: Once = Once::new();

/// Initializes the tracing subscriber for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();
    });
}

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub call_history: Arc<RwLock<Vec<(String, String)>>>,
    pub responses: Arc<RwLock<Vec<String>>>,
}

impl MockAiProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            call_history: Arc::new(RwLock::new(Vec::new())),
            responses: Arc::new(RwLock::new(responses.into_iter().rev().collect())),
        }
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PipelineError> {
        self.call_history
            .write()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(response) = self.responses.write().unwrap().pop() {
            Ok(response)
        } else {
            Ok("Default mock response".to_string())
        }
    }
}

/// An AI provider whose every call fails, for exercising fallbacks.
#[derive(Clone, Debug)]
pub struct FailingAiProvider;

#[async_trait]
impl AiProvider for FailingAiProvider {
    async fn generate(&self, _: &str, _: &str) -> Result<String, PipelineError> {
        Err(PipelineError::AiApi("mock AI outage".to_string()))
    }
}

// --- Mock Complaint Database ---

#[derive(Clone, Debug)]
pub struct MockComplaintDatabase {
    pub queries: Arc<RwLock<Vec<String>>>,
    pub results: Arc<RwLock<Vec<Vec<Row>>>>,
}

impl MockComplaintDatabase {
    pub fn new(results: Vec<Vec<Row>>) -> Self {
        Self {
            queries: Arc::new(RwLock::new(Vec::new())),
            results: Arc::new(RwLock::new(results.into_iter().rev().collect())),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.queries.read().unwrap().clone()
    }
}

#[async_trait]
impl ComplaintDatabase for MockComplaintDatabase {
    fn name(&self) -> &str {
        "MockDB"
    }

    async fn execute_query(&self, sql: &str) -> Result<Vec<Row>, PipelineError> {
        self.queries.write().unwrap().push(sql.to_string());
        Ok(self.results.write().unwrap().pop().unwrap_or_default())
    }
}

/// A database whose every query fails.
#[derive(Clone, Debug)]
pub struct FailingDatabase;

#[async_trait]
impl ComplaintDatabase for FailingDatabase {
    fn name(&self) -> &str {
        "FailingDB"
    }

    async fn execute_query(&self, _sql: &str) -> Result<Vec<Row>, PipelineError> {
        Err(PipelineError::StorageQueryFailed(
            "mock database outage".to_string(),
        ))
    }
}

// --- Mock SmartCare API ---

#[derive(Clone, Debug)]
pub struct MockSmartCare {
    pub calls: Arc<RwLock<Vec<(String, String, String)>>>,
    pub result: Arc<RwLock<Option<UserHistory>>>,
}

impl MockSmartCare {
    pub fn new(result: UserHistory) -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            result: Arc::new(RwLock::new(Some(result))),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            result: Arc::new(RwLock::new(None)),
        }
    }

    pub fn recorded_calls(&self) -> Vec<(String, String, String)> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl SmartCareApi for MockSmartCare {
    async fn query_history(
        &self,
        msisdn: &str,
        start: &str,
        end: &str,
    ) -> Result<UserHistory, PipelineError> {
        self.calls
            .write()
            .unwrap()
            .push((msisdn.to_string(), start.to_string(), end.to_string()));

        match self.result.read().unwrap().as_ref() {
            Some(history) => Ok(history.clone()),
            None => Err(PipelineError::SmartCareRequest(
                "mock API outage".to_string(),
            )),
        }
    }
}

// --- Mock Knowledge Base ---

#[derive(Clone, Debug)]
pub struct MockKnowledge {
    pub hits: Vec<KnowledgeHit>,
}

#[async_trait]
impl KnowledgeBase for MockKnowledge {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<KnowledgeHit>, PipelineError> {
        Ok(self.hits.clone())
    }
}

/// Builds a result row from column/value pairs.
pub fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
