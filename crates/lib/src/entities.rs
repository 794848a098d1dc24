//! # Entity Extraction
//!
//! Pulls geographic, temporal, ticket, MSISDN and status entities out of a
//! free-text query. Each category is decided independently with a strict
//! precedence: enhanced follow-up context first, then free-text matching,
//! then generic field-synonym matching as the lowest tier.

use crate::followup::EnhancedContext;
use crate::mapping::{FieldCategory, FieldMapping, SemanticMapping, TimeBucket};
use crate::msisdn::MsisdnValidator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

static TICKET_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(cc-\d{8}-\d{8})\b").expect("static pattern"));
static MSISDN_INTL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(628\d{8,12})\b").expect("static pattern"));
static MSISDN_LOCAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(08\d{8,12})\b").expect("static pattern"));
static LONG_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{10,15})\b").expect("static pattern"));

/// Match semantics for an extracted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Contains,
    ExactMatch,
    Categorical,
    RawSql,
    Inherited,
}

/// A location constraint on one geography-capable column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoEntity {
    pub field: String,
    pub value: String,
    pub search: SearchType,
}

impl GeoEntity {
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            search: SearchType::Contains,
        }
    }
}

/// A raw filter condition over `create_time`, with an optional bucketing
/// hint for summary queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEntity {
    pub condition: String,
    #[serde(default)]
    pub group_by: Option<TimeBucket>,
}

/// Record-identifying entities. The fuzzy variant is a last-resort match on
/// a bare digit run and must never shadow the stricter variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetailEntity {
    Ticket { value: String },
    Msisdn { value: String },
    MsisdnFuzzy { value: String },
    Field {
        field: String,
        value: String,
        search: SearchType,
    },
}

impl DetailEntity {
    pub fn field(&self) -> &str {
        match self {
            DetailEntity::Ticket { .. } => "order_id",
            DetailEntity::Msisdn { .. } | DetailEntity::MsisdnFuzzy { .. } => {
                "customer_msisdn_create_ticket"
            }
            DetailEntity::Field { field, .. } => field,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            DetailEntity::Ticket { value }
            | DetailEntity::Msisdn { value }
            | DetailEntity::MsisdnFuzzy { value }
            | DetailEntity::Field { value, .. } => value,
        }
    }

    pub fn search(&self) -> SearchType {
        match self {
            DetailEntity::Ticket { .. } | DetailEntity::Msisdn { .. } => SearchType::ExactMatch,
            DetailEntity::MsisdnFuzzy { .. } => SearchType::Contains,
            DetailEntity::Field { search, .. } => *search,
        }
    }
}

/// A status or other categorical filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntity {
    pub field: String,
    pub value: String,
    pub search: SearchType,
}

/// Context carried over from a prior turn; never contributes WHERE clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntity {
    pub field: String,
    pub value: String,
}

/// The extracted entities for one query, one list per category. Categories
/// left empty are simply absent from any serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geographic: Vec<GeoEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporal: Vec<TemporalEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detail: Vec<DetailEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<StatusEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextEntity>,
}

impl EntitySet {
    pub fn is_empty(&self) -> bool {
        self.geographic.is_empty()
            && self.temporal.is_empty()
            && self.detail.is_empty()
            && self.status.is_empty()
            && self.context.is_empty()
    }

    /// The canonical location value, if any geographic entity was extracted.
    pub fn primary_location(&self) -> Option<&str> {
        self.geographic.first().map(|e| e.value.as_str())
    }

    pub fn time_condition(&self) -> Option<&TemporalEntity> {
        self.temporal.first()
    }
}

/// Extracts an [`EntitySet`] from a query, honoring enhanced follow-up
/// context and prior-turn context.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    mapping: Arc<SemanticMapping>,
    msisdn: MsisdnValidator,
}

impl EntityExtractor {
    pub fn new(mapping: Arc<SemanticMapping>) -> Self {
        Self {
            mapping,
            msisdn: MsisdnValidator::new(),
        }
    }

    pub fn extract(
        &self,
        query: &str,
        prior_context: Option<&HashMap<String, String>>,
        enhanced: Option<&EnhancedContext>,
    ) -> EntitySet {
        let query_lower = query.to_lowercase();
        let mut entities = EntitySet::default();

        // Tier 1: resolved follow-up context wins outright per category.
        if let Some(ctx) = enhanced {
            debug!("applying enhanced context: {ctx:?}");
            if !ctx.geo_entities.is_empty() {
                entities.geographic = ctx.geo_entities.clone();
            } else if ctx.inherit_location {
                if let Some(location) = &ctx.location {
                    entities.geographic = self
                        .mapping
                        .geographic_fields
                        .iter()
                        .map(|field| GeoEntity::contains(field, location))
                        .collect();
                }
            }

            if ctx.inherit_time {
                if let Some(timeframe) = &ctx.timeframe {
                    entities.temporal = vec![TemporalEntity {
                        condition: timeframe.clone(),
                        group_by: None,
                    }];
                }
            }

            let filters = ctx.filters.to_lowercase();
            if filters.contains("belum solve") || filters.contains("pending") {
                entities.status.push(StatusEntity {
                    field: "business_status".to_string(),
                    value: "BusinessStatusInProgress".to_string(),
                    search: SearchType::ExactMatch,
                });
            }
        }

        // Tier 2: free-text geography via the alias table.
        if entities.geographic.is_empty() {
            entities.geographic = self.extract_geographic(&query_lower);
        }

        // Tier 3: free-text time phrases.
        if entities.temporal.is_empty() {
            entities.temporal = self.extract_temporal(&query_lower);
        }

        // Ticket IDs and MSISDNs come from the raw query regardless of any
        // inherited context.
        entities.detail = self.extract_detail(query);

        // Lowest tier: generic field synonyms, skipping categories already
        // populated above.
        for field in &self.mapping.fields {
            if self.category_populated(&entities, field.category) {
                continue;
            }
            let matched = field
                .synonyms
                .iter()
                .any(|synonym| query_lower.contains(&synonym.to_lowercase()));
            if !matched {
                continue;
            }
            if let Some(value) = extract_field_value(&query_lower, field) {
                self.push_field_entity(&mut entities, field, value);
            }
        }

        if let Some(context) = prior_context {
            for (key, value) in context {
                if key.starts_with("last_") && !value.is_empty() {
                    entities.context.push(ContextEntity {
                        field: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        entities
    }

    fn category_populated(&self, entities: &EntitySet, category: FieldCategory) -> bool {
        match category {
            FieldCategory::Geographic => !entities.geographic.is_empty(),
            FieldCategory::Temporal => !entities.temporal.is_empty(),
            FieldCategory::Detail => !entities.detail.is_empty(),
            FieldCategory::Status => !entities.status.is_empty(),
        }
    }

    fn push_field_entity(&self, entities: &mut EntitySet, field: &FieldMapping, value: String) {
        match field.category {
            FieldCategory::Geographic => entities.geographic.push(GeoEntity {
                field: field.field.clone(),
                value,
                search: field.search_type,
            }),
            FieldCategory::Temporal => entities.temporal.push(TemporalEntity {
                condition: value,
                group_by: None,
            }),
            FieldCategory::Detail => entities.detail.push(DetailEntity::Field {
                field: field.field.clone(),
                value,
                search: field.search_type,
            }),
            FieldCategory::Status => entities.status.push(StatusEntity {
                field: field.field.clone(),
                value,
                search: field.search_type,
            }),
        }
    }

    /// First alias hit populates every geography-capable field with the
    /// canonical value.
    fn extract_geographic(&self, query_lower: &str) -> Vec<GeoEntity> {
        for alias in &self.mapping.location_aliases {
            if query_lower.contains(&alias.alias) {
                return self
                    .mapping
                    .geographic_fields
                    .iter()
                    .map(|field| GeoEntity::contains(field, &alias.canonical))
                    .collect();
            }
        }
        Vec::new()
    }

    /// Exact phrase membership against the time-expression table; first
    /// match wins.
    fn extract_temporal(&self, query_lower: &str) -> Vec<TemporalEntity> {
        for expression in &self.mapping.time_expressions {
            if query_lower.contains(&expression.phrase) {
                return vec![TemporalEntity {
                    condition: expression.condition.clone(),
                    group_by: expression.group_by,
                }];
            }
        }
        Vec::new()
    }

    fn extract_detail(&self, query: &str) -> Vec<DetailEntity> {
        let mut entities = Vec::new();

        if let Some(caps) = TICKET_ID.captures(query) {
            entities.push(DetailEntity::Ticket {
                value: caps[1].to_uppercase(),
            });
        }

        let intl = MSISDN_INTL.captures(query);
        if let Some(caps) = &intl {
            entities.push(DetailEntity::Msisdn {
                value: caps[1].to_string(),
            });
        } else if let Some(caps) = MSISDN_LOCAL.captures(query) {
            // Local 08… form, converted to 628… before storage.
            if let Some(normalized) = self.msisdn.normalize(&caps[1]) {
                entities.push(DetailEntity::Msisdn { value: normalized });
            }
        }

        // Last resort: a bare digit run, kept clearly distinguished from a
        // confident MSISDN match.
        if entities.is_empty() {
            if let Some(caps) = LONG_DIGITS.captures(query) {
                entities.push(DetailEntity::MsisdnFuzzy {
                    value: caps[1].to_string(),
                });
            }
        }

        entities
    }
}

/// Resolves a concrete value for a synonym-matched field: categorical value
/// lookup, device-name match, or status/priority keyword match.
fn extract_field_value(query_lower: &str, field: &FieldMapping) -> Option<String> {
    if field.search_type == SearchType::Categorical {
        return field
            .values
            .iter()
            .find(|value| query_lower.contains(&value.to_lowercase()))
            .cloned();
    }

    if field.field.contains("handset") || field.field.contains("device") {
        for device in ["iphone", "samsung", "oppo", "xiaomi", "android"] {
            if query_lower.contains(device) {
                return Some(device.to_uppercase());
            }
        }
    }

    if field.field.contains("status") {
        if query_lower.contains("open") {
            return Some("Open".to_string());
        }
        if query_lower.contains("closed") {
            return Some("Closed".to_string());
        }
        if query_lower.contains("progress") {
            return Some("BusinessStatusInProgress".to_string());
        }
        if query_lower.contains("resolved") {
            return Some("BusinessStatusResovled".to_string());
        }
    }

    if field.field.contains("priority") {
        if query_lower.contains("high") {
            return Some("High".to_string());
        }
        if query_lower.contains("medium") {
            return Some("Medium".to_string());
        }
        if query_lower.contains("low") {
            return Some("Low".to_string());
        }
    }

    None
}
