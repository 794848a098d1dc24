//! # Intent Classification
//!
//! Two-tier classification: fast deterministic rules first (prompt-injection
//! sentinels, MSISDN patterns, keyword tables, follow-up detection), an AI
//! call for the ambiguous middle, and a deterministic keyword fallback so a
//! decision always exists.

use crate::followup::{resolve_enhanced_context, EnhancedContext};
use crate::providers::ai::AiProvider;
use crate::session::FollowupContext;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

static MSISDN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(08\d{8,11}|628\d{8,11}|\+628\d{8,11})\b").expect("static pattern"));
static TICKET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcc-\d{8}-\d{8}\b").expect("static pattern"));
static CLASSIFICATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CLASSIFICATION:\s*(\w+)").expect("static pattern"));
static CONFIDENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CONFIDENCE:\s*([\d.]+)").expect("static pattern"));
static REASONING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)REASONING:\s*([^\n]+)").expect("static pattern"));

const KNOWLEDGE_KEYWORDS: &[&str] = &[
    "parameter",
    "cara",
    "bagaimana",
    "gimana",
    "jelaskan",
    "explain",
    "apa itu",
    "what is",
    "pengertian",
    "definisi",
    "arti",
    "tutorial",
    "panduan",
    "guide",
    "langkah",
    "prosedur",
    "troubleshoot",
    "troubleshooting",
    "solusi",
];

const TELCO_CONTEXT_KEYWORDS: &[&str] = &[
    "internet",
    "wifi",
    "jaringan",
    "network",
    "signal",
    "sinyal",
    "keluhan",
    "complaint",
    "tiket",
    "ticket",
    "telkomsel",
    "provider",
    "operator",
    "telekomunikasi",
    "telco",
];

const SYSTEM_KEYWORDS: &[&str] = &[
    "siapa kamu",
    "kamu apa",
    "apa kemampuan",
    "bisa apa",
    "sistem sehat",
    "ada masalah",
    "status sistem",
    "hello",
    "halo",
];

const OFF_TOPIC_KEYWORDS: &[&str] = &[
    "who is",
    "biografi",
    "sejarah",
    "politik",
    "nasi",
    "padang",
    "makan",
    "cafe",
    "restoran",
    "makanan",
    "film",
    "movie",
    "musik",
    "music",
    "game",
    "sepak bola",
    "olahraga",
    "cuaca",
    "weather",
    "belanja",
    "shopping",
    "harga",
];

const COMPLAINT_KEYWORDS: &[&str] = &[
    "keluhan",
    "masalah",
    "complaint",
    "tiket",
    "ticket",
    "berapa",
    "contoh",
    "internet",
    "wifi",
    "jaringan",
    "summary",
    "ringkasan",
    "jakarta",
    "bandung",
];

/// The concrete shape of a data query against the complaint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Count,
    List,
    Detail,
    Summary,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Count => "count",
            QueryIntent::List => "list",
            QueryIntent::Detail => "detail",
            QueryIntent::Summary => "summary",
        }
    }
}

/// The classified purpose of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    /// Analytics over the complaint table; refined by [`detect_query_intent`].
    ComplaintAnalytics,
    /// Troubleshooting / how-to questions answered from the knowledge base.
    Knowledge,
    /// Questions about this system itself.
    SystemCapability,
    /// Real-time per-MSISDN lookup against the live API.
    LiveLookup,
    OffTopic,
    /// Continuation of the previous turn; carries an [`EnhancedContext`].
    Followup,
    /// An injected system prompt that must be skipped entirely.
    SystemPrompt,
}

/// Produced once per query; never mutated.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub category: IntentCategory,
    pub confidence: f64,
    pub reasoning: String,
    pub enhanced_context: Option<EnhancedContext>,
}

impl ClassificationResult {
    fn simple(category: IntentCategory, confidence: f64, reasoning: &str) -> Self {
        Self {
            category,
            confidence,
            reasoning: reasoning.to_string(),
            enhanced_context: None,
        }
    }
}

/// Classifies queries through the decision tiers. State-free per call.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    ai: Option<Arc<dyn AiProvider>>,
}

impl IntentClassifier {
    pub fn new(ai: Option<Arc<dyn AiProvider>>) -> Self {
        Self { ai }
    }

    pub async fn classify(
        &self,
        query: &str,
        followup: Option<&FollowupContext>,
    ) -> ClassificationResult {
        // Tier 1: injected system prompts short-circuit everything.
        if query.contains("### Task:") || query.contains("follow-up questions") {
            return ClassificationResult::simple(
                IntentCategory::SystemPrompt,
                1.0,
                "System follow-up generation prompt - skip",
            );
        }

        // Tier 2: a bare phone number is unambiguous.
        if MSISDN_PATTERN.is_match(query) {
            debug!("MSISDN detected, forcing live lookup");
            return ClassificationResult::simple(
                IntentCategory::LiveLookup,
                0.98,
                "MSISDN detected - live lookup priority",
            );
        }

        // Tier 3: knowledge keywords are a hard rule for stability.
        let query_lower = query.to_lowercase();
        if contains_any(&query_lower, KNOWLEDGE_KEYWORDS) {
            return ClassificationResult::simple(
                IntentCategory::Knowledge,
                0.95,
                "Hard rule: knowledge keywords detected",
            );
        }

        // Tier 4: follow-up continuation, resolved against the prior turn.
        if let Some(ctx) = followup {
            let enhanced = resolve_enhanced_context(self.ai.as_ref(), query, ctx).await;
            return ClassificationResult {
                category: IntentCategory::Followup,
                confidence: 0.9,
                reasoning: "Follow-up query enhanced with prior context".to_string(),
                enhanced_context: Some(enhanced),
            };
        }

        // Tier 5: AI classification for the ambiguous middle.
        if let Some(ai) = &self.ai {
            match self.classify_with_ai(ai, query).await {
                Ok(result) => return result,
                Err(e) => warn!("AI classification failed, using fallback: {e}"),
            }
        }

        // Tier 6: deterministic fallback; always decides.
        self.fallback(&query_lower)
    }

    async fn classify_with_ai(
        &self,
        ai: &Arc<dyn AiProvider>,
        query: &str,
    ) -> Result<ClassificationResult, crate::PipelineError> {
        let system_prompt = "Anda adalah classifier untuk sistem analisis keluhan pelanggan \
            telekomunikasi. Database berisi keluhan pelanggan per lokasi geografis; sistem \
            dapat melakukan analisis statistik, summary, counting dan pencarian contoh.\n\
            Klasifikasikan query ke salah satu kategori:\n\
            - SMARTCARE: butuh data real-time MSISDN dari API (mengandung nomor 08xxx/628xxx)\n\
            - COMPLAINT: bisa dijawab dengan data keluhan telco (statistik, jumlah, contoh, \
              analisis per lokasi/waktu)\n\
            - KNOWLEDGE_QUERY: troubleshooting, SOP, prosedur, parameter teknis\n\
            - SYSTEM_INQUIRY: pertanyaan tentang sistem/AI ini\n\
            - OFF_TOPIC: tidak terkait keluhan telekomunikasi\n\n\
            JAWAB DALAM FORMAT:\n\
            CLASSIFICATION: [SMARTCARE/COMPLAINT/KNOWLEDGE_QUERY/SYSTEM_INQUIRY/OFF_TOPIC]\n\
            CONFIDENCE: [0.1-1.0]\n\
            REASONING: [alasan singkat]";
        let user_prompt = format!("QUERY USER: \"{query}\"");

        let response = ai.generate(system_prompt, &user_prompt).await?;
        debug!("AI classification response: {response}");
        Ok(parse_classification(&response))
    }

    fn fallback(&self, query_lower: &str) -> ClassificationResult {
        if MSISDN_PATTERN.is_match(query_lower) {
            return ClassificationResult::simple(
                IntentCategory::LiveLookup,
                0.9,
                "Fallback: MSISDN detected in query",
            );
        }

        if TICKET_PATTERN.is_match(query_lower) {
            return ClassificationResult::simple(
                IntentCategory::ComplaintAnalytics,
                0.9,
                "Fallback: ticket ID detected in query",
            );
        }

        if contains_any(query_lower, KNOWLEDGE_KEYWORDS) {
            return if contains_any(query_lower, TELCO_CONTEXT_KEYWORDS) {
                ClassificationResult::simple(
                    IntentCategory::Knowledge,
                    0.9,
                    "Fallback: knowledge keywords with telco context",
                )
            } else {
                ClassificationResult::simple(
                    IntentCategory::OffTopic,
                    0.8,
                    "Fallback: knowledge keywords without telco context",
                )
            };
        }

        if contains_any(query_lower, SYSTEM_KEYWORDS) {
            return ClassificationResult::simple(
                IntentCategory::SystemCapability,
                0.95,
                "Fallback: system inquiry keywords",
            );
        }

        if contains_any(query_lower, OFF_TOPIC_KEYWORDS) {
            return ClassificationResult::simple(
                IntentCategory::OffTopic,
                0.95,
                "Fallback: off-topic keywords detected",
            );
        }

        if contains_any(query_lower, COMPLAINT_KEYWORDS) {
            return ClassificationResult::simple(
                IntentCategory::ComplaintAnalytics,
                0.8,
                "Fallback: complaint keywords detected",
            );
        }

        ClassificationResult::simple(
            IntentCategory::OffTopic,
            0.7,
            "Fallback: no clear classification patterns found",
        )
    }
}

/// Parses the labeled-line classification grammar, tolerating missing lines.
fn parse_classification(response: &str) -> ClassificationResult {
    let upper = response.to_uppercase();
    let label = CLASSIFICATION_LINE
        .captures(&upper)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "OFF_TOPIC".to_string());

    let confidence = CONFIDENCE_LINE
        .captures(response)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .unwrap_or(0.7);

    let reasoning = REASONING_LINE
        .captures(response)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "LLM classification".to_string());

    let category = match label.as_str() {
        "SMARTCARE" => IntentCategory::LiveLookup,
        "COMPLAINT" => IntentCategory::ComplaintAnalytics,
        "KNOWLEDGE_QUERY" => IntentCategory::Knowledge,
        "SYSTEM_INQUIRY" => IntentCategory::SystemCapability,
        _ => IntentCategory::OffTopic,
    };

    ClassificationResult {
        category,
        confidence,
        reasoning: format!("LLM: {reasoning}"),
        enhanced_context: None,
    }
}

/// Refines a complaint-analytics query into its data intent.
pub fn detect_query_intent(query: &str) -> QueryIntent {
    let query_lower = query.to_lowercase();

    if contains_any(
        &query_lower,
        &["summary", "ringkasan", "laporan", "rekap", "statistik"],
    ) {
        QueryIntent::Summary
    } else if contains_any(&query_lower, &["berapa", "jumlah", "total", "count"]) {
        QueryIntent::Count
    } else if contains_any(
        &query_lower,
        &["tampilkan", "lihat", "show", "contoh", "list"],
    ) {
        QueryIntent::List
    } else if contains_any(&query_lower, &["detail", "cc-", "order_id", "ticket"]) {
        QueryIntent::Detail
    } else {
        QueryIntent::List
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labeled_lines() {
        let result = parse_classification(
            "CLASSIFICATION: COMPLAINT\nCONFIDENCE: 0.95\nREASONING: analisis geografis",
        );
        assert_eq!(result.category, IntentCategory::ComplaintAnalytics);
        assert!((result.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_lines_get_defaults() {
        let result = parse_classification("no structure at all");
        assert_eq!(result.category, IntentCategory::OffTopic);
        assert!((result.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn detects_query_intents() {
        assert_eq!(detect_query_intent("berapa keluhan di Jakarta"), QueryIntent::Count);
        assert_eq!(detect_query_intent("ringkasan keluhan bandung"), QueryIntent::Summary);
        assert_eq!(detect_query_intent("CC-20250603-00000475"), QueryIntent::Detail);
        assert_eq!(detect_query_intent("ada apa saja"), QueryIntent::List);
    }
}
