use crate::entities::EntityExtractor;
use crate::errors::PipelineError;
use crate::intent::{IntentClassifier, QueryIntent};
use crate::mapping::SemanticMapping;
use crate::msisdn::MsisdnValidator;
use crate::narrative::{LlmTextImprover, NarrativeGenerator, TextImprover};
use crate::providers::ai::AiProvider;
use crate::providers::db::ComplaintDatabase;
use crate::providers::knowledge::KnowledgeBase;
use crate::providers::smartcare::SmartCareApi;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::sqlbuild::SqlBuilder;
use crate::timeparse::{DateExtractor, LlmDateExtractor, TimeParser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One incoming query. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatQuery {
    pub text: String,
    pub session_id: String,
    pub received_at: DateTime<Utc>,
}

impl ChatQuery {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// The outcome class of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    /// Percentage math over empty/invalid aggregates.
    CalculationError,
    /// The live API is unavailable; a friendly message was returned.
    Maintenance,
    OffTopic,
    SystemCapability,
    /// An injected system prompt was skipped.
    Skipped,
    /// The knowledge base had nothing relevant; a canned answer was used.
    KnowledgeFallback,
}

/// Which workflow produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Count,
    List,
    Detail,
    Summary,
    Followup,
    #[serde(rename = "smartcare")]
    SmartCare,
    Knowledge,
    OffTopic,
    SystemCapability,
    SystemPrompt,
    Error,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Count => "count",
            WorkflowKind::List => "list",
            WorkflowKind::Detail => "detail",
            WorkflowKind::Summary => "summary",
            WorkflowKind::Followup => "followup",
            WorkflowKind::SmartCare => "smartcare",
            WorkflowKind::Knowledge => "knowledge",
            WorkflowKind::OffTopic => "off_topic",
            WorkflowKind::SystemCapability => "system_capability",
            WorkflowKind::SystemPrompt => "system_prompt",
            WorkflowKind::Error => "error",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            WorkflowKind::Count => "Simple counting queries",
            WorkflowKind::List => "Display complaint examples",
            WorkflowKind::Detail => "Individual ticket/MSISDN lookup",
            WorkflowKind::Summary => "Aggregated data analysis with narratives",
            WorkflowKind::Followup => "Context-aware follow-up queries",
            WorkflowKind::SmartCare => "Real-time MSISDN analysis with API data",
            WorkflowKind::Knowledge => "Knowledge base lookup",
            WorkflowKind::OffTopic => "Non-system related queries",
            WorkflowKind::SystemCapability => "System capability questions",
            WorkflowKind::SystemPrompt => "Injected system prompt, skipped",
            WorkflowKind::Error => "Failed query processing",
        }
    }
}

impl From<QueryIntent> for WorkflowKind {
    fn from(intent: QueryIntent) -> Self {
        match intent {
            QueryIntent::Count => WorkflowKind::Count,
            QueryIntent::List => WorkflowKind::List,
            QueryIntent::Detail => WorkflowKind::Detail,
            QueryIntent::Summary => WorkflowKind::Summary,
        }
    }
}

/// The complete response for one turn. Every code path produces one of
/// these; failures are mapped to coherent user-facing text with the raw
/// error retained in `metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: ResponseStatus,
    pub workflow: WorkflowKind,
    pub metadata: serde_json::Value,
}

impl ChatResponse {
    pub fn new(
        workflow: WorkflowKind,
        status: ResponseStatus,
        response: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            response: response.into(),
            status,
            workflow,
            metadata,
        }
    }
}

/// The query-processing pipeline: classification, entity extraction, SQL
/// construction, execution and narrative generation, plus session memory.
///
/// All external collaborators are owned as trait objects and injected via
/// [`ChatPipelineBuilder`]; only the database is mandatory. Everything else
/// degrades to a deterministic local fallback when absent.
pub struct ChatPipeline {
    pub(crate) database: Arc<dyn ComplaintDatabase>,
    pub(crate) smartcare: Option<Arc<dyn SmartCareApi>>,
    pub(crate) knowledge: Option<Arc<dyn KnowledgeBase>>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) classifier: IntentClassifier,
    pub(crate) extractor: EntityExtractor,
    pub(crate) sql: SqlBuilder,
    pub(crate) narrator: NarrativeGenerator,
    pub(crate) time: TimeParser,
    pub(crate) msisdn: MsisdnValidator,
}

impl fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("database", &self.database.name())
            .field("smartcare", &self.smartcare.is_some())
            .field("knowledge", &self.knowledge.is_some())
            .finish_non_exhaustive()
    }
}

/// A builder for [`ChatPipeline`] instances.
#[derive(Default)]
pub struct ChatPipelineBuilder {
    ai: Option<Box<dyn AiProvider>>,
    database: Option<Box<dyn ComplaintDatabase>>,
    smartcare: Option<Box<dyn SmartCareApi>>,
    knowledge: Option<Box<dyn KnowledgeBase>>,
    sessions: Option<Box<dyn SessionStore>>,
    mapping: Option<SemanticMapping>,
}

impl ChatPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the AI provider used for classification fallback, follow-up
    /// enhancement, date extraction and text improvement. Optional: without
    /// it every call site uses its deterministic fallback.
    pub fn ai_provider(mut self, provider: Box<dyn AiProvider>) -> Self {
        self.ai = Some(provider);
        self
    }

    /// Sets the complaint database. Required.
    pub fn database(mut self, database: Box<dyn ComplaintDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// Sets the live SmartCare API client. Optional: without it live
    /// lookups answer with the maintenance message.
    pub fn smartcare(mut self, client: Box<dyn SmartCareApi>) -> Self {
        self.smartcare = Some(client);
        self
    }

    /// Sets the knowledge base. Optional.
    pub fn knowledge(mut self, knowledge: Box<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Sets the session store. Defaults to the in-memory store.
    pub fn session_store(mut self, store: Box<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Overrides the semantic mapping tables.
    pub fn mapping(mut self, mapping: SemanticMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn build(self) -> Result<ChatPipeline, PipelineError> {
        let database = self
            .database
            .ok_or(PipelineError::MissingDatabaseProvider)?;

        let ai: Option<Arc<dyn AiProvider>> = self.ai.map(Arc::from);
        let mapping = Arc::new(self.mapping.unwrap_or_default());

        let narrator = match &ai {
            Some(ai) => {
                let improver: Arc<dyn TextImprover> = Arc::new(LlmTextImprover::new(ai.clone()));
                NarrativeGenerator::with_improver(improver)
            }
            None => NarrativeGenerator::new(),
        };
        let time = match &ai {
            Some(ai) => {
                let assist: Arc<dyn DateExtractor> = Arc::new(LlmDateExtractor::new(ai.clone()));
                TimeParser::with_assist(assist)
            }
            None => TimeParser::new(),
        };

        let sessions: Arc<dyn SessionStore> = match self.sessions {
            Some(store) => Arc::from(store),
            None => Arc::new(InMemorySessionStore::default()),
        };

        Ok(ChatPipeline {
            classifier: IntentClassifier::new(ai),
            extractor: EntityExtractor::new(mapping.clone()),
            sql: SqlBuilder::new(&mapping.table_name),
            narrator,
            time,
            msisdn: MsisdnValidator::new(),
            database: Arc::from(database),
            smartcare: self.smartcare.map(Arc::from),
            knowledge: self.knowledge.map(Arc::from),
            sessions,
        })
    }
}
