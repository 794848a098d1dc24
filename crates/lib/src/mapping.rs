//! # Semantic Mapping
//!
//! The configuration tables that drive entity extraction and SQL shaping:
//! the complaint table name, the geography-capable columns, colloquial
//! location aliases, the time-expression phrase table and generic field
//! synonyms. Defaults are built in; deployments can override them with a
//! TOML document.

use crate::entities::SearchType;
use serde::{Deserialize, Serialize};

/// Granularity hint for summary time bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Day,
    Week,
    Month,
    Year,
}

/// A colloquial location name mapped to its canonical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAlias {
    pub alias: String,
    pub canonical: String,
}

/// A time phrase mapped to a raw filter condition over `create_time`.
///
/// Conditions are written with portable date primitives (`CURRENT_DATE`,
/// `date_trunc`, `INTERVAL 'N unit'`); the SQL builder rewrites them for the
/// target engine in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeExpression {
    pub phrase: String,
    pub condition: String,
    #[serde(default)]
    pub group_by: Option<TimeBucket>,
}

/// The category a mapped field contributes entities to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Geographic,
    Temporal,
    Detail,
    Status,
}

/// A database column with the query-language synonyms that select it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: String,
    pub category: FieldCategory,
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub search_type: SearchType,
    /// Closed value set for categorical fields.
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMapping {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_geographic_fields")]
    pub geographic_fields: Vec<String>,
    #[serde(default = "default_location_aliases")]
    pub location_aliases: Vec<LocationAlias>,
    #[serde(default = "default_time_expressions")]
    pub time_expressions: Vec<TimeExpression>,
    #[serde(default = "default_field_mappings")]
    pub fields: Vec<FieldMapping>,
}

impl Default for SemanticMapping {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            geographic_fields: default_geographic_fields(),
            location_aliases: default_location_aliases(),
            time_expressions: default_time_expressions(),
            fields: default_field_mappings(),
        }
    }
}

impl SemanticMapping {
    /// Loads a mapping from a TOML document; missing sections fall back to
    /// the built-in defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

fn default_table_name() -> String {
    "inap_ticketing_customer_complain".to_string()
}

fn default_geographic_fields() -> Vec<String> {
    [
        "provinsi_create_ticket",
        "kabupaten_kota_create_ticket",
        "kecamatan_create_ticket",
        "desa_kelurahan_create_ticket",
        "customer_region_create_ticket",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

fn alias(alias: &str, canonical: &str) -> LocationAlias {
    LocationAlias {
        alias: alias.to_string(),
        canonical: canonical.to_string(),
    }
}

/// Ordered: compound names must precede the bare "jakarta" entry, otherwise
/// "jakarta barat" would resolve to the city-wide value.
fn default_location_aliases() -> Vec<LocationAlias> {
    vec![
        alias("jakbar", "Jakarta Barat"),
        alias("jakarta barat", "Jakarta Barat"),
        alias("jaksel", "Jakarta Selatan"),
        alias("jakarta selatan", "Jakarta Selatan"),
        alias("jaktim", "Jakarta Timur"),
        alias("jakarta timur", "Jakarta Timur"),
        alias("jakut", "Jakarta Utara"),
        alias("jakarta utara", "Jakarta Utara"),
        alias("jakpus", "Jakarta Pusat"),
        alias("jakarta pusat", "Jakarta Pusat"),
        alias("jakarta", "Jakarta"),
        alias("bandung", "Bandung"),
        alias("surabaya", "Surabaya"),
        alias("medan", "Medan"),
        alias("semarang", "Semarang"),
    ]
}

fn expression(phrase: &str, condition: &str, group_by: Option<TimeBucket>) -> TimeExpression {
    TimeExpression {
        phrase: phrase.to_string(),
        condition: condition.to_string(),
        group_by,
    }
}

fn default_time_expressions() -> Vec<TimeExpression> {
    vec![
        expression(
            "hari ini",
            "create_time >= date_trunc('day', CURRENT_DATE)",
            Some(TimeBucket::Day),
        ),
        expression(
            "kemarin",
            "date_trunc('day', create_time) = CURRENT_DATE - INTERVAL '1 day'",
            Some(TimeBucket::Day),
        ),
        expression(
            "minggu ini",
            "create_time >= date_trunc('week', CURRENT_DATE)",
            Some(TimeBucket::Day),
        ),
        expression(
            "minggu lalu",
            "create_time >= date_trunc('week', CURRENT_DATE) - INTERVAL '1 week' AND create_time < date_trunc('week', CURRENT_DATE)",
            Some(TimeBucket::Day),
        ),
        expression(
            "bulan ini",
            "create_time >= date_trunc('month', CURRENT_DATE)",
            Some(TimeBucket::Week),
        ),
        expression(
            "bulan lalu",
            "create_time >= date_trunc('month', CURRENT_DATE) - INTERVAL '1 month' AND create_time < date_trunc('month', CURRENT_DATE)",
            Some(TimeBucket::Week),
        ),
        expression(
            "tahun ini",
            "create_time >= date_trunc('year', CURRENT_DATE)",
            Some(TimeBucket::Month),
        ),
        expression(
            "7 hari terakhir",
            "create_time >= now() - INTERVAL '7 day'",
            Some(TimeBucket::Day),
        ),
        expression(
            "30 hari terakhir",
            "create_time >= now() - INTERVAL '30 day'",
            Some(TimeBucket::Week),
        ),
    ]
}

fn default_field_mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping {
            field: "business_status".to_string(),
            category: FieldCategory::Status,
            synonyms: vec!["status".to_string()],
            search_type: SearchType::ExactMatch,
            values: Vec::new(),
        },
        FieldMapping {
            field: "priority_l2_assign".to_string(),
            category: FieldCategory::Status,
            synonyms: vec!["prioritas".to_string(), "priority".to_string()],
            search_type: SearchType::ExactMatch,
            values: Vec::new(),
        },
        FieldMapping {
            field: "type_handset".to_string(),
            category: FieldCategory::Detail,
            synonyms: vec![
                "hp".to_string(),
                "handset".to_string(),
                "device".to_string(),
                "perangkat".to_string(),
            ],
            search_type: SearchType::Contains,
            values: Vec::new(),
        },
        FieldMapping {
            field: "customer_type_create_ticket".to_string(),
            category: FieldCategory::Status,
            synonyms: vec!["consumer".to_string(), "corporate".to_string()],
            search_type: SearchType::Categorical,
            values: vec!["Consumer".to_string(), "Corporate".to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_aliases_precede_city_wide_alias() {
        let mapping = SemanticMapping::default();
        let jakarta = mapping
            .location_aliases
            .iter()
            .position(|a| a.alias == "jakarta")
            .expect("jakarta alias present");
        let jakbar = mapping
            .location_aliases
            .iter()
            .position(|a| a.alias == "jakarta barat")
            .expect("jakarta barat alias present");
        assert!(jakbar < jakarta);
    }

    #[test]
    fn toml_override_keeps_defaults_for_missing_sections() {
        let mapping = SemanticMapping::from_toml_str("table_name = \"complaints\"")
            .expect("valid toml");
        assert_eq!(mapping.table_name, "complaints");
        assert_eq!(mapping.geographic_fields.len(), 5);
        assert!(!mapping.time_expressions.is_empty());
    }
}
