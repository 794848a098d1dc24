//! # SQL Construction
//!
//! Maps `(intent, entity set)` to a parameterized aggregate/lookup query
//! against the complaint table. Geographic and detail conditions are OR'd
//! within their category (any matching field qualifies), categories are
//! AND'd together, and context entities never reach the WHERE clause.
//!
//! Temporal conditions are written with portable date primitives and pass
//! through [`rewrite_time_condition`], the single place that knows the
//! target engine's date functions.

use crate::entities::{EntitySet, SearchType};
use crate::intent::QueryIntent;
use crate::mapping::TimeBucket;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static DATE_TRUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)date_trunc\(\s*'(day|week|month|year)'\s*,\s*([^)]+)\)")
        .expect("static pattern")
});
static INTERVAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)interval\s+'(\d+)\s+(day|week|month|year)s?'").expect("static pattern"));
static CURRENT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCURRENT_DATE\b").expect("static pattern"));

/// Builds SQL strings for the closed set of data intents.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    table: String,
}

impl SqlBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    /// Builds the query for a data intent. The intent enum is closed, so
    /// every shape is handled here; an "unrecognized intent" cannot occur.
    pub fn build(&self, intent: QueryIntent, entities: &EntitySet) -> String {
        let where_clause = self.where_clause(entities);
        let table = &self.table;

        let sql = match intent {
            QueryIntent::Count => {
                format!("SELECT count() AS total_count FROM {table} WHERE {where_clause}")
            }
            QueryIntent::List => format!(
                "SELECT order_id, create_time, description, kabupaten_kota_create_ticket, \
                 customer_type_create_ticket, business_status, priority_l2_assign \
                 FROM {table} WHERE {where_clause} ORDER BY create_time DESC LIMIT 10"
            ),
            QueryIntent::Detail => format!(
                "SELECT * FROM {table} WHERE {where_clause} ORDER BY create_time DESC LIMIT 1"
            ),
            QueryIntent::Summary => {
                let bucket = entities
                    .temporal
                    .iter()
                    .find_map(|t| t.group_by)
                    .unwrap_or(TimeBucket::Day);
                let bucket_expr = bucket_expression(bucket);
                format!(
                    "SELECT provinsi_create_ticket, count() AS total_keluhan, business_status, \
                     customer_type_create_ticket, {bucket_expr} AS waktu \
                     FROM {table} WHERE {where_clause} \
                     GROUP BY provinsi_create_ticket, business_status, customer_type_create_ticket, waktu \
                     ORDER BY waktu DESC"
                )
            }
        };

        debug!("generated SQL: {sql}");
        sql
    }

    fn where_clause(&self, entities: &EntitySet) -> String {
        let mut conditions: Vec<String> = Vec::new();

        // Any matching geographic field qualifies.
        let geo: Vec<String> = entities
            .geographic
            .iter()
            .filter_map(|e| condition(&e.field, &e.value, e.search))
            .collect();
        if !geo.is_empty() {
            conditions.push(format!("({})", geo.join(" OR ")));
        }

        // Same for record-identifying entities.
        let detail: Vec<String> = entities
            .detail
            .iter()
            .filter_map(|e| condition(e.field(), e.value(), e.search()))
            .collect();
        if !detail.is_empty() {
            conditions.push(format!("({})", detail.join(" OR ")));
        }

        for temporal in &entities.temporal {
            conditions.push(rewrite_time_condition(&temporal.condition));
        }

        for status in &entities.status {
            if let Some(cond) = condition(&status.field, &status.value, status.search) {
                conditions.push(cond);
            }
        }

        if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        }
    }
}

fn condition(field: &str, value: &str, search: SearchType) -> Option<String> {
    if field.is_empty() || value.is_empty() {
        return None;
    }
    match search {
        SearchType::Contains => Some(format!("{field} ILIKE '%{}%'", escape(value))),
        SearchType::ExactMatch | SearchType::Categorical => {
            Some(format!("{field} = '{}'", escape(value)))
        }
        SearchType::RawSql => Some(rewrite_time_condition(value)),
        SearchType::Inherited => None,
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn bucket_expression(bucket: TimeBucket) -> &'static str {
    match bucket {
        TimeBucket::Day => "toDate(create_time)",
        TimeBucket::Week => "toMonday(create_time)",
        TimeBucket::Month => "toStartOfMonth(create_time)",
        TimeBucket::Year => "toStartOfYear(create_time)",
    }
}

/// Rewrites portable date primitives into ClickHouse equivalents:
/// `date_trunc` into the `toDate`/`toMonday`/`toStartOf*` family,
/// `INTERVAL 'N unit'` into `INTERVAL N UNIT`, and `CURRENT_DATE` into
/// `today()`. `now()` is shared syntax and passes through.
pub fn rewrite_time_condition(value: &str) -> String {
    let rewritten = DATE_TRUNC.replace_all(value, |caps: &regex::Captures| {
        let argument = caps[2].trim();
        match caps[1].to_lowercase().as_str() {
            "day" => format!("toDate({argument})"),
            "week" => format!("toMonday({argument})"),
            "month" => format!("toStartOfMonth({argument})"),
            _ => format!("toStartOfYear({argument})"),
        }
    });

    let rewritten = INTERVAL.replace_all(&rewritten, |caps: &regex::Captures| {
        format!("INTERVAL {} {}", &caps[1], caps[2].to_uppercase())
    });

    CURRENT_DATE.replace_all(&rewritten, "today()").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_date_trunc_per_unit() {
        assert_eq!(
            rewrite_time_condition("create_time >= date_trunc('week', CURRENT_DATE)"),
            "create_time >= toMonday(today())"
        );
        assert_eq!(
            rewrite_time_condition("create_time >= date_trunc('month', CURRENT_DATE)"),
            "create_time >= toStartOfMonth(today())"
        );
        assert_eq!(
            rewrite_time_condition("create_time >= date_trunc('year', now())"),
            "create_time >= toStartOfYear(now())"
        );
    }

    #[test]
    fn rewrites_interval_arithmetic() {
        assert_eq!(
            rewrite_time_condition("create_time >= now() - INTERVAL '7 day'"),
            "create_time >= now() - INTERVAL 7 DAY"
        );
        assert_eq!(
            rewrite_time_condition(
                "date_trunc('day', create_time) = CURRENT_DATE - INTERVAL '1 day'"
            ),
            "toDate(create_time) = today() - INTERVAL 1 DAY"
        );
    }

    #[test]
    fn escapes_single_quotes() {
        assert_eq!(
            condition("description", "it's broken", SearchType::Contains).as_deref(),
            Some("description ILIKE '%it''s broken%'")
        );
    }
}
