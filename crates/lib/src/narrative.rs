//! # Narrative Generation
//!
//! Converts result rows plus the extracted entities into human-readable
//! Indonesian text, with distinct templates per intent and magnitude-based
//! insight rules. Generation is a pure function of its inputs; the only
//! external call is the best-effort complaint-text improvement, which always
//! has a deterministic substitution fallback.

use crate::entities::EntitySet;
use crate::followup::EnhancedContext;
use crate::providers::ai::AiProvider;
use crate::providers::db::Row;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use dyn_clone::DynClone;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

static INTERVAL_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"interval\s+'(\d+)\s+([a-z]+)'").expect("static pattern"));
static DETAIL_KELUHAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Detail Keluhan\s*:\s*([^\n]+)").expect("static pattern"));
static DETAIL_COMPLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Detail Complain\s*:\s*([^\n]+)").expect("static pattern"));
static NAMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Nama\s*(?:Customer)?\s*:\s*([^\n]+)").expect("static pattern"));
static MSISDN_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)MSISDN(?:-[AB])?\s*(?:Yang\s+\w+)?\s*:\s*:?(\d+)").expect("static pattern")
});
static TANGGAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Tanggal(?:/Jam)?\s*Kejadian\s*:\s*([^\n]+)").expect("static pattern")
});
static LOKASI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Lokasi\s*(?:Pelanggan)?\s*(?:\(alamat\))?\s*:\s*([^→\n]+)")
        .expect("static pattern")
});
static KATEGORI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Kategori Keluhan\s*:\s*([^\n]+)").expect("static pattern"));
static CUSTOMER_TIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Customer Tier pelanggan\s*:\s*([^\n]+)").expect("static pattern")
});
static SIM_CAPABILITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SIM Capability\s*:\s*([^\n]+)").expect("static pattern"));
static CAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)cause:\s*([^,]+)").expect("static pattern"));
static CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Category:\s*([^;]+)").expect("static pattern"));
static DOMINANT_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Dominant\s+Cell:\s*([^;]+)").expect("static pattern"));
static SUGGESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)suggestion:\s*(.*?)(?:,\s*other:|$)").expect("static pattern"));
static NUMBERING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("static pattern"));

/// Known suggestion lines and their Indonesian phrasing; unknown lines pass
/// through tagged with the wrench glyph.
const SUGGESTION_TRANSLATIONS: &[(&str, &str)] = &[
    (
        "If nearest sites no serving, need crosscheck Availability",
        "🔧 Jika site terdekat tidak serving, perlu crosscheck Availability",
    ),
    (
        "Make RSRP serving cells more dominant, by increase RS Power, Uptilt or reazimuth",
        "📡 Buat RSRP serving cells lebih dominan dengan meningkatkan RS Power, Uptilt atau reazimuth",
    ),
    (
        "Check whether area serving are blocking by building or countour",
        "🔍 Periksa apakah area serving terhalang oleh building atau countour",
    ),
];

/// Percentage math over an empty aggregate; mapped to a distinct
/// user-facing message by the workflow layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("summary aggregate sums to zero complaints")]
pub struct CalculationError;

/// Best-effort complaint-text improvement.
#[async_trait]
pub trait TextImprover: Send + Sync + Debug + DynClone {
    /// Returns the improved text, or `None` when the improver is
    /// unavailable; the caller then applies the rule-based fallback.
    async fn improve(&self, text: &str) -> Option<String>;
}

dyn_clone::clone_trait_object!(TextImprover);

/// Deterministic substitution fallback for complaint text.
pub fn fallback_improvement(text: &str) -> String {
    text.replace("ket ", "keterangan ").replace(" ga ", " tidak ")
}

/// AI-backed [`TextImprover`]: extracts the last non-instructional line of
/// the model's answer.
#[derive(Clone)]
pub struct LlmTextImprover {
    ai: Arc<dyn AiProvider>,
}

impl LlmTextImprover {
    pub fn new(ai: Arc<dyn AiProvider>) -> Self {
        Self { ai }
    }
}

impl Debug for LlmTextImprover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmTextImprover").finish_non_exhaustive()
    }
}

#[async_trait]
impl TextImprover for LlmTextImprover {
    async fn improve(&self, text: &str) -> Option<String> {
        let system_prompt = "Perbaiki keluhan pelanggan ini menjadi 1 kalimat yang jelas. \
            Aturan: \"ket\" menjadi \"keterangan\"; perbaiki kata singkatan. \
            Hanya berikan hasil akhir, tidak perlu penjelasan.";

        let response = match self.ai.generate(system_prompt, text).await {
            Ok(r) => r,
            Err(e) => {
                warn!("text improvement failed: {e}");
                return None;
            }
        };

        let lines: Vec<&str> = response
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        for line in lines.iter().rev() {
            let lower = line.to_lowercase();
            let instructional = ["perbaikan:", "contoh:", "aturan:", "input:", "output:", "berikut"]
                .iter()
                .any(|marker| lower.contains(marker));
            if !instructional && line.len() > 10 && !line.starts_with('*') {
                return Some(line.trim_matches('"').to_string());
            }
        }

        lines.first().map(|l| l.to_string())
    }
}

/// Generates narrative text per intent.
#[derive(Debug, Clone, Default)]
pub struct NarrativeGenerator {
    improver: Option<Arc<dyn TextImprover>>,
}

impl NarrativeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_improver(improver: Arc<dyn TextImprover>) -> Self {
        Self {
            improver: Some(improver),
        }
    }

    /// Single sentence with the numeric total, resolved location and time.
    pub fn count(&self, rows: &[Row], entities: &EntitySet) -> String {
        let count = rows.first().map(|r| count_field(r, "total_count")).unwrap_or(0);
        let location = self.location_of(entities);
        let period = self.period_of(entities);
        format!("🔢 Ditemukan **{count} keluhan** di {location} {period}.")
    }

    /// Up to five formatted example records.
    pub fn list(
        &self,
        rows: &[Row],
        entities: &EntitySet,
        enhanced: Option<&EnhancedContext>,
    ) -> String {
        let location = self.location_of(entities);
        let period = self.period_of(entities);
        let filtered = !entities.status.is_empty()
            || enhanced
                .map(|ctx| ctx.filters.to_lowercase().contains("belum solve"))
                .unwrap_or(false);

        if rows.is_empty() {
            return if filtered {
                format!(
                    "📋 **Keluhan yang Belum Selesai di {location} {period}**\n\n\
                     ✅ Tidak ada keluhan yang masih dalam proses penyelesaian."
                )
            } else {
                format!("📋 **Tidak ada keluhan ditemukan di {location} {period}.**")
            };
        }

        let examples: Vec<String> = rows
            .iter()
            .take(5)
            .enumerate()
            .map(|(i, row)| format_example(row, i + 1))
            .collect();

        let header = if filtered {
            format!("📋 **Contoh Keluhan yang Belum Selesai di {location} {period}:**")
        } else {
            format!("📋 **Contoh Keluhan di {location} {period}:**")
        };

        format!("{header}\n\n{}", examples.join("\n\n"))
    }

    /// Aggregate breakdown by customer type and status with insight rules.
    pub fn summary(
        &self,
        rows: &[Row],
        location: &str,
        period: &str,
    ) -> Result<String, CalculationError> {
        if rows.is_empty() {
            return Ok(format!("📊 **Tidak ditemukan keluhan di {location} {period}**"));
        }

        let total: i64 = rows.iter().map(|r| count_field(r, "total_keluhan")).sum();
        if total == 0 {
            return Err(CalculationError);
        }

        let mut customer_breakdown: HashMap<String, i64> = HashMap::new();
        let mut status_breakdown: HashMap<String, i64> = HashMap::new();
        for row in rows {
            let count = count_field(row, "total_keluhan");
            *customer_breakdown
                .entry(text_field(row, "customer_type_create_ticket"))
                .or_insert(0) += count;
            *status_breakdown
                .entry(text_field(row, "business_status"))
                .or_insert(0) += count;
        }

        let customer_sorted = sorted_desc(&customer_breakdown);
        let status_sorted = sorted_desc(&status_breakdown);

        let mut parts = Vec::new();
        parts.push(format!("📊 **Ringkasan Keluhan di {location} {period}**"));
        parts.push(format!(
            "Total **{total} keluhan** ditemukan dari **{} record** data.",
            rows.len()
        ));

        parts.push(if total < 10 {
            format!("📈 **Overview:** Volume keluhan rendah dengan {total} keluhan total.")
        } else if total < 50 {
            format!("📈 **Overview:** Volume keluhan sedang dengan {total} keluhan total.")
        } else {
            format!(
                "📈 **Overview:** Volume keluhan tinggi dengan {total} keluhan total, \
                 memerlukan perhatian khusus."
            )
        });

        let mut customer_lines = vec!["👥 **Breakdown per Tipe Customer:**".to_string()];
        for (i, (customer, count)) in customer_sorted.iter().take(3).enumerate() {
            let percentage = *count as f64 / total as f64 * 100.0;
            let display = customer_display(customer);
            if i == 0 {
                customer_lines.push(format!(
                    "• **{display}**: {count} keluhan ({percentage:.1}%) - *Dominan*"
                ));
            } else {
                customer_lines.push(format!("• **{display}**: {count} keluhan ({percentage:.1}%)"));
            }
        }
        parts.push(customer_lines.join("\n"));

        let mut status_lines = vec!["📋 **Status Keluhan:**".to_string()];
        for (status, count) in status_sorted.iter().take(3) {
            let percentage = *count as f64 / total as f64 * 100.0;
            let display = status_display(status);
            let indicator = if status.contains("Progress") || status.contains("Open") {
                "🔄"
            } else if status.contains("Resolved")
                || status.contains("Resovled")
                || status.contains("Closed")
            {
                "✅"
            } else {
                "📌"
            };
            status_lines.push(format!(
                "• {indicator} **{display}**: {count} keluhan ({percentage:.1}%)"
            ));
        }
        parts.push(status_lines.join("\n"));

        let mut insights = Vec::new();
        if let Some((customer, count)) = customer_sorted.first() {
            let percentage = *count as f64 / total as f64 * 100.0;
            if percentage > 70.0 {
                insights.push(format!(
                    "🎯 Customer **{}** mendominasi dengan {percentage:.1}% keluhan",
                    customer_display(customer)
                ));
            }
        }
        if let Some((status, count)) = status_sorted.first() {
            let percentage = *count as f64 / total as f64 * 100.0;
            if status.contains("Progress") && percentage > 60.0 {
                insights.push(format!(
                    "⚠️ {percentage:.1}% keluhan masih **{}** - perlu follow up",
                    status_display(status)
                ));
            } else if (status.contains("Resolved") || status.contains("Resovled"))
                && percentage > 70.0
            {
                insights.push(format!(
                    "✅ {percentage:.1}% keluhan sudah **{}** - indikator positif",
                    status_display(status)
                ));
            }
        }
        if total > 100 {
            insights.push("📈 Volume tinggi memerlukan prioritas penanganan".to_string());
        } else if total < 5 {
            insights.push("📉 Volume rendah menunjukkan kondisi stabil".to_string());
        }
        if insights.is_empty() {
            insights.push("📋 Data menunjukkan pola distribusi normal".to_string());
        }

        let mut insight_lines = vec!["🔍 **Key Insights:**".to_string()];
        insight_lines.extend(insights.into_iter().map(|i| format!("• {i}")));
        parts.push(insight_lines.join("\n"));

        Ok(parts.join("\n\n"))
    }

    /// Single-record field dump with the parsed technical-analysis block.
    pub async fn detail(&self, row: &Row) -> String {
        let order_id = text_field(row, "order_id");
        let description = text_field(row, "description_fault_sumptomps_create_ticket");
        let cch_suggestion = text_field(row, "cch_suggestion_l1_assign");

        let keluhan = self.improve_complaint(&description).await;
        let nama = extract_field(&description, &NAMA);
        let msisdn = extract_field(&description, &MSISDN_FIELD);
        let tanggal = extract_field(&description, &TANGGAL);
        let lokasi = extract_field(&description, &LOKASI);
        let kategori = extract_field(&description, &KATEGORI);
        let tier = extract_field(&description, &CUSTOMER_TIER);
        let sim = extract_field(&description, &SIM_CAPABILITY);

        let mode_jaringan = text_field(row, "type_jaringan");
        let device = text_field(row, "type_handset");
        let lat = text_field(row, "latitude_l2_assign");
        let lng = text_field(row, "longitude_l2_assign");
        let coords = if lat != "N/A" && lng != "N/A" {
            format!("{lat}, {lng}")
        } else {
            "Tidak tersedia".to_string()
        };

        let mut parts = vec![
            format!("**No. Ticket** : {order_id}"),
            format!("**Detail Keluhan** : {keluhan}"),
            format!("**Nama** : {nama}"),
            format!("**MSISDN** : {msisdn}"),
            format!("**Tanggal Kejadian** : {tanggal}"),
            "\n------------------".to_string(),
            format!("**Lokasi** : {lokasi}"),
            format!("**Long Lat** : {coords}"),
            "\n-------------------".to_string(),
            format!("**Mode Jaringan** : {mode_jaringan}"),
            format!("**Kategori Keluhan** : {kategori}"),
            format!("**Tipe Pelanggan** : {tier}"),
            format!("**SIM Capability** : {sim}"),
            format!("**Device** : {device}"),
            "\n-------------------".to_string(),
        ];

        let analysis = parse_technical_analysis(&cch_suggestion);
        if !analysis.is_empty() {
            parts.push("\n**Technical Analysis (CCH):**".to_string());
            for (key, value) in analysis {
                parts.push(format!("• **{key}:** {value}"));
            }
        }

        parts.join("\n")
    }

    /// The canonical location value, or the generic placeholder.
    pub fn location_of(&self, entities: &EntitySet) -> String {
        entities
            .primary_location()
            .unwrap_or("lokasi yang diminta")
            .to_string()
    }

    /// Derives the Indonesian time-period phrase back from the temporal
    /// entity's raw condition.
    pub fn period_of(&self, entities: &EntitySet) -> String {
        let Some(temporal) = entities.time_condition() else {
            return "periode yang diminta".to_string();
        };
        let value = temporal.condition.to_lowercase();

        if value.contains("- interval") {
            if let Some(caps) = INTERVAL_TEXT.captures(&value) {
                let number = caps[1].to_string();
                let unit = caps[2].trim_end_matches('s');
                return match unit {
                    "day" if number == "1" => "kemarin".to_string(),
                    "day" => format!("{number} hari lalu"),
                    "week" if number == "1" => "minggu lalu".to_string(),
                    "week" => format!("{number} minggu lalu"),
                    "month" if number == "1" => "bulan lalu".to_string(),
                    "month" => format!("{number} bulan lalu"),
                    _ => "periode lalu".to_string(),
                };
            }
        } else if value.contains("current_date") || value.contains("now()") {
            if value.contains("week") {
                return "minggu ini".to_string();
            }
            if value.contains("month") {
                return "bulan ini".to_string();
            }
            if value.contains("day") {
                return "hari ini".to_string();
            }
        }

        "periode yang diminta".to_string()
    }

    async fn improve_complaint(&self, description: &str) -> String {
        let raw = {
            let primary = extract_field(description, &DETAIL_KELUHAN);
            if primary != "N/A" {
                primary
            } else {
                extract_field(description, &DETAIL_COMPLAIN)
            }
        };
        if raw == "N/A" {
            return raw;
        }

        if let Some(improver) = &self.improver {
            if let Some(improved) = improver.improve(&raw).await {
                return improved;
            }
        }
        fallback_improvement(&raw)
    }
}

fn sorted_desc(breakdown: &HashMap<String, i64>) -> Vec<(String, i64)> {
    let mut entries: Vec<(String, i64)> =
        breakdown.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

fn status_display(status: &str) -> String {
    match status {
        "BusinessStatusInProgress" => "Dalam Proses".to_string(),
        "BusinessStatusResovled" => "Selesai".to_string(),
        "BusinessStatusClosed" | "Closed" => "Ditutup".to_string(),
        "BusinessStatusOpen" | "Open" => "Terbuka".to_string(),
        other => other.to_string(),
    }
}

fn customer_display(customer: &str) -> String {
    match customer {
        "Consumer" => "Konsumen".to_string(),
        "Corporate" => "Korporat".to_string(),
        "B2C" => "Business to Consumer".to_string(),
        "B2B" => "Business to Business".to_string(),
        other => other.to_string(),
    }
}

fn status_glyph(status: &str) -> (&'static str, String) {
    if status.contains("Progress") || status.contains("InProgress") {
        ("🔄", "Dalam Proses".to_string())
    } else if status.contains("Complete")
        || status.contains("Resolved")
        || status.contains("Resovled")
        || status.contains("Closed")
    {
        ("✅", "Selesai".to_string())
    } else if status.contains("Open") {
        ("🆕", "Baru".to_string())
    } else {
        ("📌", status.to_string())
    }
}

fn format_example(row: &Row, index: usize) -> String {
    let order_id = text_field(row, "order_id");
    let date = format_date(&text_field(row, "create_time"));
    let description = clean_description(&text_field(row, "description"));
    let location = text_field(row, "kabupaten_kota_create_ticket");
    let customer_type = text_field(row, "customer_type_create_ticket");
    let status = text_field(row, "business_status");
    let (glyph, status_text) = status_glyph(&status);

    let customer_glyph = if customer_type.contains("Consumer") || customer_type.contains("Konsumen")
    {
        "👤"
    } else if customer_type.contains("Corporate") || customer_type.contains("Korporat") {
        "🏢"
    } else {
        "👥"
    };

    let mut example = format!(
        "**{index}. {order_id}**\n📅 {date}\n📍 {location}\n📋 {description}\n\
         {customer_glyph} {customer_type}\n{glyph} {status_text}"
    );

    let priority = text_field(row, "priority_l2_assign");
    if priority != "N/A" {
        let priority_text = match priority.as_str() {
            "High" => "🔴 Prioritas Tinggi".to_string(),
            "Medium" => "🟡 Prioritas Sedang".to_string(),
            "Low" => "🟢 Prioritas Rendah".to_string(),
            other => format!("📋 {other}"),
        };
        example.push_str(&format!("\n{priority_text}"));
    }

    example
}

fn format_date(raw: &str) -> String {
    if raw == "N/A" {
        return raw.to_string();
    }
    let cleaned = raw.trim_end_matches('Z').replace("+00:00", "");
    let parsed = NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%d %H:%M"));
    match parsed {
        Ok(dt) => dt.format("%d %b %Y, %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn clean_description(description: &str) -> String {
    if description == "N/A" {
        return "Tidak ada deskripsi keluhan".to_string();
    }
    let cleaned: String = description.replace(['\n', '\r'], " ").trim().to_string();
    if cleaned.chars().count() > 120 {
        let truncated: String = cleaned.chars().take(120).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}

fn extract_field(text: &str, pattern: &Regex) -> String {
    pattern
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Parses the semi-structured CCH suggestion string: comma-separated
/// key:value pairs with a `;;`-delimited multi-suggestion list.
fn parse_technical_analysis(cch_suggestion: &str) -> Vec<(&'static str, String)> {
    if cch_suggestion.is_empty() || cch_suggestion == "N/A" {
        return Vec::new();
    }

    let mut analysis = Vec::new();
    let cause = extract_field(cch_suggestion, &CAUSE);
    if cause != "N/A" {
        analysis.push(("Cause", cause));
    }
    let category = extract_field(cch_suggestion, &CATEGORY);
    if category != "N/A" {
        analysis.push(("Category", category));
    }
    let dominant = extract_field(cch_suggestion, &DOMINANT_CELL);
    if dominant != "N/A" {
        analysis.push(("Dominant Cell", dominant));
    }
    let suggestion = extract_field(cch_suggestion, &SUGGESTION);
    if suggestion != "N/A" {
        analysis.push(("Suggestion", translate_suggestion(&suggestion)));
    }

    analysis
}

fn translate_suggestion(text: &str) -> String {
    let translate = |item: &str| -> String {
        SUGGESTION_TRANSLATIONS
            .iter()
            .find(|(english, _)| *english == item)
            .map(|(_, indonesian)| indonesian.to_string())
            .unwrap_or_else(|| format!("🔧 {item}"))
    };

    if text.contains(";;") {
        text.split(";;")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| translate(&NUMBERING.replace(s, "")))
            .collect::<Vec<String>>()
            .join("\n")
    } else {
        translate(text.trim())
    }
}

fn text_field(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

fn count_field(row: &Row, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_numbered_suggestion_list() {
        let parsed = translate_suggestion(
            "1. If nearest sites no serving, need crosscheck Availability;;2. Something unknown",
        );
        assert!(parsed.contains("Jika site terdekat tidak serving"));
        assert!(parsed.contains("🔧 Something unknown"));
    }

    #[test]
    fn unknown_suggestion_passes_through_tagged() {
        assert_eq!(translate_suggestion("Do the thing"), "🔧 Do the thing");
    }

    #[test]
    fn description_is_truncated_at_120_chars() {
        let long = "x".repeat(150);
        let cleaned = clean_description(&long);
        assert!(cleaned.ends_with("..."));
        assert_eq!(cleaned.chars().count(), 123);
    }

    #[test]
    fn fallback_improvement_substitutes_abbreviations() {
        assert_eq!(
            fallback_improvement("Tidak bisa call ket dialihkan"),
            "Tidak bisa call keterangan dialihkan"
        );
    }
}
