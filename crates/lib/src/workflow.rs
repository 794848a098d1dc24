//! Data-query workflows (count/list/detail/summary), the follow-up
//! re-dispatch and the knowledge lookup, plus the canned responses for
//! off-topic and system-capability turns.

use crate::entities::{DetailEntity, EntitySet};
use crate::followup::EnhancedContext;
use crate::intent::QueryIntent;
use crate::providers::knowledge::SIMILARITY_FLOOR;
use crate::types::{ChatPipeline, ChatResponse, ResponseStatus, WorkflowKind};
use serde_json::{json, Value};
use std::cmp::Ordering;
use tracing::{error, warn};

impl ChatPipeline {
    /// Extract entities, build SQL, execute and narrate one data query.
    pub(crate) async fn run_data_workflow(
        &self,
        query: &str,
        intent: QueryIntent,
        enhanced: Option<&EnhancedContext>,
        workflow: WorkflowKind,
    ) -> (ChatResponse, EntitySet) {
        let entities = self.extractor.extract(query, None, enhanced);
        let sql = self.sql.build(intent, &entities);

        let rows = match self.database.execute_query(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("query execution failed: {e}");
                let response = ChatResponse::new(
                    workflow,
                    ResponseStatus::Error,
                    "❌ Maaf, terjadi kesalahan saat mengambil data keluhan. \
                     Silakan coba beberapa saat lagi.",
                    json!({
                        "sql_query": sql,
                        "intent": intent,
                        "entities": &entities,
                        "error": e.to_string(),
                    }),
                );
                return (response, entities);
            }
        };

        let narrative = match intent {
            QueryIntent::Count => self.narrator.count(&rows, &entities),
            QueryIntent::List => self.narrator.list(&rows, &entities, enhanced),
            QueryIntent::Summary => {
                let location = self.narrator.location_of(&entities);
                let period = self.narrator.period_of(&entities);
                match self.narrator.summary(&rows, &location, &period) {
                    Ok(narrative) => narrative,
                    Err(e) => {
                        warn!("summary calculation failed: {e}");
                        let response = ChatResponse::new(
                            workflow,
                            ResponseStatus::CalculationError,
                            "Maaf, terjadi kesalahan perhitungan. Data mungkin kosong atau \
                             tidak valid untuk analisis ini.",
                            json!({
                                "sql_query": sql,
                                "intent": intent,
                                "entities": &entities,
                                "error": e.to_string(),
                            }),
                        );
                        return (response, entities);
                    }
                }
            }
            QueryIntent::Detail => match rows.first() {
                Some(row) => self.narrator.detail(row).await,
                None => detail_not_found(&entities),
            },
        };

        let response = ChatResponse::new(
            workflow,
            ResponseStatus::Success,
            narrative,
            json!({
                "sql_query": sql,
                "intent": intent,
                "entities": &entities,
                "record_count": rows.len(),
            }),
        );
        (response, entities)
    }

    /// Re-dispatches a follow-up turn to the intent the enhanced context
    /// resolved, carrying the inherited entities.
    pub(crate) async fn run_followup(
        &self,
        query: &str,
        enhanced: EnhancedContext,
    ) -> (ChatResponse, EntitySet) {
        let intent = enhanced.intent;
        let (mut response, entities) = self
            .run_data_workflow(query, intent, Some(&enhanced), WorkflowKind::Followup)
            .await;
        merge_metadata(
            &mut response.metadata,
            json!({
                "is_followup": true,
                "enhanced_context": enhanced,
            }),
        );
        (response, entities)
    }

    /// Knowledge-base lookup with a similarity floor and canned fallback.
    pub(crate) async fn run_knowledge(&self, query: &str) -> ChatResponse {
        let Some(kb) = &self.knowledge else {
            return knowledge_fallback(query);
        };

        let hits = match kb.search(query, 3).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("knowledge search failed: {e}");
                return knowledge_fallback(query);
            }
        };

        let best = hits
            .into_iter()
            .filter(|hit| hit.similarity >= SIMILARITY_FLOOR)
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(Ordering::Equal)
            });

        match best {
            Some(hit) => {
                let mut response = format!(
                    "📚 **Knowledge Base Response** (Confidence: {:.2})\n\n{}",
                    hit.similarity, hit.content
                );
                if let Some(document) = hit.metadata.get("document").and_then(Value::as_str) {
                    let page = hit
                        .metadata
                        .get("page")
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "N/A".to_string());
                    response.push_str(&format!("\n\n📖 **Sumber:**\n• {document} (Page {page})"));
                }
                ChatResponse::new(
                    WorkflowKind::Knowledge,
                    ResponseStatus::Success,
                    response,
                    json!({ "similarity": hit.similarity }),
                )
            }
            None => knowledge_fallback(query),
        }
    }

    pub(crate) fn off_topic_response(&self) -> ChatResponse {
        ChatResponse::new(
            WorkflowKind::OffTopic,
            ResponseStatus::OffTopic,
            "Maaf, pertanyaan Anda sepertinya tidak terkait dengan sistem tiket keluhan \
             pelanggan.\n\n\
             Saya dapat membantu Anda dengan:\n\
             - Mencari informasi tiket tertentu (contoh: \"cari tiket CC-12345\")\n\
             - Menghitung jumlah keluhan di lokasi tertentu (contoh: \"berapa keluhan di \
             Jakarta Barat?\")\n\
             - Menampilkan contoh keluhan dari suatu daerah\n\
             - Menganalisis data keluhan pelanggan\n\n\
             Silakan ajukan pertanyaan yang terkait dengan data keluhan pelanggan.",
            json!({}),
        )
    }

    pub(crate) fn system_capability_response(&self) -> ChatResponse {
        ChatResponse::new(
            WorkflowKind::SystemCapability,
            ResponseStatus::SystemCapability,
            "Saya adalah sistem AI untuk analisis keluhan pelanggan.\n\n\
             **Status:** Sistem berjalan normal\n\
             **Fungsi:** Menganalisis data ticket customer service\n\
             **Kemampuan:**\n\
             - Mencari statistik keluhan per lokasi\n\
             - Menampilkan contoh kasus spesifik\n\
             - Menganalisis trend dan pola keluhan\n\n\
             Tidak, saya tidak mengalami keluhan - saya adalah tools untuk menganalisis \
             keluhan customer! 😊",
            json!({}),
        )
    }
}

fn knowledge_fallback(query: &str) -> ChatResponse {
    ChatResponse::new(
        WorkflowKind::Knowledge,
        ResponseStatus::KnowledgeFallback,
        format!(
            "Maaf, saya memerlukan informasi lebih spesifik untuk menjelaskan '{query}'. \
             Bisakah Anda memberikan konteks yang lebih detail?"
        ),
        json!({}),
    )
}

fn detail_not_found(entities: &EntitySet) -> String {
    match entities.detail.first() {
        Some(DetailEntity::Ticket { value }) => {
            format!("❌ Ticket dengan ID **{value}** tidak ditemukan.")
        }
        Some(DetailEntity::Msisdn { value }) | Some(DetailEntity::MsisdnFuzzy { value }) => {
            format!("❌ Data untuk MSISDN **{value}** tidak ditemukan.")
        }
        Some(DetailEntity::Field { value, .. }) => {
            format!("❌ Data untuk **{value}** tidak ditemukan.")
        }
        None => "❌ Data tidak ditemukan untuk detail yang diminta.".to_string(),
    }
}

/// Merges extra keys into an object-shaped metadata value.
pub(crate) fn merge_metadata(metadata: &mut Value, extra: Value) {
    match (metadata, extra) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                target.insert(key, value);
            }
        }
        (target, source) => *target = source,
    }
}
