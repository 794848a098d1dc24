//! # Complaint-Analytics Chat Pipeline
//!
//! This crate classifies natural-language queries (Indonesian), routes them
//! to the matching workflow against a complaint database, and produces
//! narrative text responses. The pipeline is: intent classification →
//! entity extraction → SQL construction → execution → narrative generation,
//! with session-based follow-up resolution carrying location/time context
//! across turns.
//!
//! External collaborators (AI provider, complaint database, live SmartCare
//! API, knowledge base) are injected as trait objects; every AI-dependent
//! step has a deterministic local fallback, so the pipeline always returns
//! a coherent response.

pub mod entities;
pub mod errors;
pub mod followup;
pub mod intent;
pub mod mapping;
pub mod msisdn;
pub mod narrative;
pub mod providers;
pub mod session;
pub mod smartcare;
pub mod sqlbuild;
pub mod timeparse;
pub mod types;
mod workflow;

pub use errors::PipelineError;
pub use types::{ChatPipeline, ChatPipelineBuilder, ChatQuery, ChatResponse, ResponseStatus, WorkflowKind};

use crate::intent::{detect_query_intent, ClassificationResult, IntentCategory, QueryIntent};
use crate::session::Interaction;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

impl ChatPipeline {
    /// Processes one query end to end. This never fails: every error path
    /// degrades to a complete user-facing response, with the underlying
    /// error retained in the response metadata.
    ///
    /// Within one session, callers must submit turns in arrival order;
    /// concurrent turns for the same session are not supported.
    pub async fn process(&self, query: &ChatQuery) -> ChatResponse {
        let preview: String = query.text.chars().take(50).collect();
        info!("[{}] processing: {preview}", query.session_id);

        let followup_ctx = self
            .sessions
            .followup_context(&query.session_id, &query.text)
            .await;
        let classification = self
            .classifier
            .classify(&query.text, followup_ctx.as_ref())
            .await;
        debug!(
            "[{}] classified as {:?} ({:.2}): {}",
            query.session_id,
            classification.category,
            classification.confidence,
            classification.reasoning
        );

        let (mut response, entities) = self.dispatch(query, &classification).await;
        workflow::merge_metadata(
            &mut response.metadata,
            json!({
                "classification": {
                    "category": classification.category,
                    "confidence": classification.confidence,
                    "reasoning": classification.reasoning,
                },
                "workflow_description": response.workflow.describe(),
            }),
        );

        // Answered turns become session history, in arrival order.
        if let Some(entities) = entities {
            self.sessions
                .save_interaction(
                    &query.session_id,
                    Interaction {
                        timestamp: Utc::now(),
                        query: query.text.clone(),
                        response: response.response.clone(),
                        workflow: response.workflow.as_str().to_string(),
                        entities,
                    },
                )
                .await;
        }

        response
    }

    async fn dispatch(
        &self,
        query: &ChatQuery,
        classification: &ClassificationResult,
    ) -> (ChatResponse, Option<entities::EntitySet>) {
        match classification.category {
            IntentCategory::SystemPrompt => (
                ChatResponse::new(
                    WorkflowKind::SystemPrompt,
                    ResponseStatus::Skipped,
                    "System prompt skipped",
                    json!({}),
                ),
                None,
            ),
            IntentCategory::LiveLookup => {
                let (response, entities) = self.run_smartcare(&query.text).await;
                (response, Some(entities))
            }
            IntentCategory::Followup => match classification.enhanced_context.clone() {
                Some(enhanced) => {
                    let (response, entities) = self.run_followup(&query.text, enhanced).await;
                    (response, Some(entities))
                }
                None => {
                    let (response, entities) = self
                        .run_data_workflow(
                            &query.text,
                            QueryIntent::List,
                            None,
                            WorkflowKind::List,
                        )
                        .await;
                    (response, Some(entities))
                }
            },
            IntentCategory::Knowledge => (
                self.run_knowledge(&query.text).await,
                Some(entities::EntitySet::default()),
            ),
            IntentCategory::OffTopic => (self.off_topic_response(), None),
            IntentCategory::SystemCapability => (self.system_capability_response(), None),
            IntentCategory::ComplaintAnalytics => {
                let intent = detect_query_intent(&query.text);
                let (response, entities) = self
                    .run_data_workflow(&query.text, intent, None, WorkflowKind::from(intent))
                    .await;
                (response, Some(entities))
            }
        }
    }
}
