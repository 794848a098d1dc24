//! # Session Memory
//!
//! Per-conversation rolling history used for follow-up resolution. Sessions
//! are created lazily on first reference, keep a bounded history and expire
//! after a period of inactivity.

use crate::entities::EntitySet;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// History entries kept per session; the oldest entry is evicted first.
pub const MAX_HISTORY: usize = 10;

/// Default session expiry in seconds.
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Continuation markers: demonstratives and follow-up phrasings that tie a
/// query to the previous turn.
const FOLLOWUP_TRIGGERS: &[&str] = &[
    "contoh",
    "contohnya",
    "yang belum",
    "yg belum",
    "yang masih",
    "yg masih",
    "detail",
    "jelaskan",
    "bagaimana",
    "yang mana",
    "tersebut",
    "itu",
    "tadi",
    "diatas",
    "belum solve",
    "masih pending",
    "salah satu",
    "dari sana",
    "lokasi sama",
    "tempat itu",
    "disitu",
    "yang tadi",
    "seperti apa",
    "gimana",
    "mana aja",
    "ada yang",
    "bisa kasih",
    "tolong tunjukkan",
];

/// True when the query contains any continuation trigger phrase.
pub fn is_followup_trigger(query: &str) -> bool {
    let query_lower = query.to_lowercase();
    FOLLOWUP_TRIGGERS
        .iter()
        .any(|trigger| query_lower.contains(trigger))
}

/// One completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: String,
    pub workflow: String,
    #[serde(default)]
    pub entities: EntitySet,
}

/// The stored state of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Interaction>,
}

impl Session {
    fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            created_at: now,
            last_activity: now,
            history: Vec::new(),
        }
    }
}

/// What the previous turn contributes to a follow-up query.
#[derive(Debug, Clone)]
pub struct FollowupContext {
    pub previous_query: String,
    pub previous_response: String,
    pub previous_workflow: String,
    pub previous_entities: EntitySet,
}

/// Conversation memory. In-memory by default; the trait keeps persisted
/// backings interchangeable.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug + DynClone {
    /// Appends one turn to the session history, creating the session lazily.
    async fn save_interaction(&self, session_id: &str, interaction: Interaction);

    /// Returns the previous turn's context iff the query carries a
    /// continuation trigger AND the session has prior history.
    async fn followup_context(&self, session_id: &str, query: &str) -> Option<FollowupContext>;

    /// A point-in-time copy of the session, without creating one.
    async fn snapshot(&self, session_id: &str) -> Option<Session>;
}

dyn_clone::clone_trait_object!(SessionStore);

/// Volatile session store backed by a `HashMap`. Clones share the same
/// underlying map.
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

impl InMemorySessionStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    async fn cleanup_expired(&self) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| now - session.last_activity <= self.ttl);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_interaction(&self, session_id: &str, interaction: Interaction) {
        self.cleanup_expired().await;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.history.push(interaction);
        if session.history.len() > MAX_HISTORY {
            let excess = session.history.len() - MAX_HISTORY;
            session.history.drain(..excess);
        }
        session.last_activity = Utc::now();
        debug!(
            "session {session_id}: {} interaction(s) in history",
            session.history.len()
        );
    }

    async fn followup_context(&self, session_id: &str, query: &str) -> Option<FollowupContext> {
        if !is_followup_trigger(query) {
            return None;
        }
        self.cleanup_expired().await;
        let sessions = self.sessions.read().await;
        let last = sessions.get(session_id)?.history.last()?;
        Some(FollowupContext {
            previous_query: last.query.clone(),
            previous_response: last.response.clone(),
            previous_workflow: last.workflow.clone(),
            previous_entities: last.entities.clone(),
        })
    }

    async fn snapshot(&self, session_id: &str) -> Option<Session> {
        self.cleanup_expired().await;
        self.sessions.read().await.get(session_id).cloned()
    }
}
