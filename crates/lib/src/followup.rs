//! # Follow-up Resolution
//!
//! When a query continues the previous turn, the AI decides which intent the
//! follow-up maps to and what to inherit from the prior entity set. If the
//! AI is unavailable the conservative default inherits both location and
//! time with a `list` intent.

use crate::entities::GeoEntity;
use crate::intent::QueryIntent;
use crate::providers::ai::AiProvider;
use crate::session::FollowupContext;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

static INTENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)INTENT:\s*(\w+)").expect("static pattern"));
static INHERIT_LOCATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)INHERIT_LOCATION:\s*(yes|no)").expect("static pattern"));
static INHERIT_TIME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)INHERIT_TIME:\s*(yes|no)").expect("static pattern"));
static FILTERS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)FILTERS:\s*([^\n]+)").expect("static pattern"));

/// The resolved inheritance decision for a follow-up turn. Built once per
/// follow-up and consumed immediately by the entity extractor.
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedContext {
    pub intent: QueryIntent,
    pub inherit_location: bool,
    pub inherit_time: bool,
    /// Materialized only when `inherit_location` is set.
    pub location: Option<String>,
    /// Materialized only when `inherit_time` is set.
    pub timeframe: Option<String>,
    /// Free-text filter description, e.g. "yang belum solve".
    pub filters: String,
    /// The complete geographic entity list carried from the prior turn.
    pub geo_entities: Vec<GeoEntity>,
}

impl EnhancedContext {
    /// "Show me more of the same": list intent, inherit both location and
    /// time, no extra filters.
    pub fn conservative(ctx: &FollowupContext) -> Self {
        Self {
            intent: QueryIntent::List,
            inherit_location: true,
            inherit_time: true,
            location: previous_location(ctx),
            timeframe: previous_timeframe(ctx),
            filters: String::new(),
            geo_entities: ctx.previous_entities.geographic.clone(),
        }
    }
}

fn previous_location(ctx: &FollowupContext) -> Option<String> {
    ctx.previous_entities
        .geographic
        .first()
        .map(|e| e.value.clone())
}

fn previous_timeframe(ctx: &FollowupContext) -> Option<String> {
    ctx.previous_entities
        .temporal
        .first()
        .map(|e| e.condition.clone())
}

/// Resolves the enhanced context for a follow-up query, asking the AI to
/// decide intent and inheritance, with the conservative default on failure.
pub async fn resolve_enhanced_context(
    ai: Option<&Arc<dyn AiProvider>>,
    query: &str,
    ctx: &FollowupContext,
) -> EnhancedContext {
    let Some(ai) = ai else {
        return EnhancedContext::conservative(ctx);
    };

    let last_location = previous_location(ctx).unwrap_or_default();
    let last_timeframe = previous_timeframe(ctx).unwrap_or_default();

    let system_prompt = "Anda menganalisis follow-up query untuk sistem keluhan pelanggan. \
        Jawab HANYA dalam format:\n\
        INTENT: [summary/list/detail/count]\n\
        INHERIT_LOCATION: [yes/no]\n\
        INHERIT_TIME: [yes/no]\n\
        FILTERS: [kondisi tambahan atau kosong]";
    let user_prompt = format!(
        "CONTEXT SEBELUMNYA:\n\
         - Query: \"{previous}\"\n\
         - Lokasi: \"{last_location}\"\n\
         - Waktu: \"{last_timeframe}\"\n\
         - Type: \"{workflow}\"\n\n\
         FOLLOW-UP QUERY: \"{query}\"\n\n\
         ATURAN INTENT:\n\
         - \"berikan contohnya\", \"tampilkan contoh\" -> INTENT: list\n\
         - \"berapa total\", \"jumlah berapa\" -> INTENT: count\n\
         - \"detail lebih\", \"informasi lengkap\" -> INTENT: detail\n\
         - \"ringkasan\", \"summary\", \"laporan\" -> INTENT: summary",
        previous = ctx.previous_query,
        workflow = ctx.previous_workflow,
    );

    match ai.generate(system_prompt, &user_prompt).await {
        Ok(response) => {
            let mut enhanced = parse_enhancement(&response, &last_location, &last_timeframe);
            enhanced.geo_entities = ctx.previous_entities.geographic.clone();
            debug!("enhanced follow-up context: {enhanced:?}");
            enhanced
        }
        Err(e) => {
            warn!("follow-up enhancement failed, using conservative default: {e}");
            EnhancedContext::conservative(ctx)
        }
    }
}

/// Parses the labeled-line enhancement response. Location and timeframe are
/// materialized only for inherit flags answered "yes".
pub(crate) fn parse_enhancement(
    response: &str,
    last_location: &str,
    last_timeframe: &str,
) -> EnhancedContext {
    let intent = INTENT_LINE
        .captures(response)
        .map(|caps| match caps[1].to_lowercase().as_str() {
            "summary" => QueryIntent::Summary,
            "count" => QueryIntent::Count,
            "detail" => QueryIntent::Detail,
            _ => QueryIntent::List,
        })
        .unwrap_or(QueryIntent::List);

    let inherit_location = INHERIT_LOCATION_LINE
        .captures(response)
        .map(|caps| caps[1].eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    let inherit_time = INHERIT_TIME_LINE
        .captures(response)
        .map(|caps| caps[1].eq_ignore_ascii_case("yes"))
        .unwrap_or(false);

    let filters = FILTERS_LINE
        .captures(response)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default();

    EnhancedContext {
        intent,
        inherit_location,
        inherit_time,
        location: (inherit_location && !last_location.is_empty())
            .then(|| last_location.to_string()),
        timeframe: (inherit_time && !last_timeframe.is_empty())
            .then(|| last_timeframe.to_string()),
        filters,
        geo_entities: Vec::new(),
    }
}
