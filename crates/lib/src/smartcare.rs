//! # SmartCare Workflow
//!
//! Live per-MSISDN lookups: parse the query for the number, time window and
//! sub-intent, enforce the Telkomsel-only rule BEFORE touching the API, and
//! degrade every API failure to a friendly maintenance message.

use crate::entities::EntitySet;
use crate::msisdn::ValidatedMsisdn;
use crate::providers::smartcare::HistoryEntry;
use crate::types::{ChatPipeline, ChatResponse, ResponseStatus, WorkflowKind};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// What the user wants from the live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartCareIntent {
    Usage,
    History,
    Detail,
    Check,
}

/// Detects the SmartCare sub-intent from keywords; `check` is the default.
pub fn detect_smartcare_intent(query: &str) -> SmartCareIntent {
    let query_lower = query.to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|k| query_lower.contains(k));

    if any(&["usage", "penggunaan", "kuota", "traffic", "konsumsi"]) {
        SmartCareIntent::Usage
    } else if any(&["history", "riwayat", "histori", "record", "catatan"]) {
        SmartCareIntent::History
    } else if any(&["detail", "detil", "info", "informasi", "lengkap"]) {
        SmartCareIntent::Detail
    } else if any(&["berapa", "jumlah", "total"]) {
        SmartCareIntent::Usage
    } else {
        SmartCareIntent::Check
    }
}

/// Summary statistics over one history window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryStats {
    pub total_traffic: f64,
    pub avg_score: f64,
    pub avg_latency: f64,
    pub peak_traffic: f64,
    pub peak_time: String,
    pub data_points: usize,
    pub active_hours: usize,
}

/// Aggregates the hourly samples. Zero scores and latencies are excluded
/// from the averages (the backend reports idle hours as zero).
pub fn summarize_history(history: &[HistoryEntry]) -> SummaryStats {
    if history.is_empty() {
        return SummaryStats {
            peak_time: "N/A".to_string(),
            ..SummaryStats::default()
        };
    }

    let total_traffic: f64 = history.iter().map(|e| e.total_traffic).sum();
    let scores: Vec<f64> = history
        .iter()
        .map(|e| e.total_score)
        .filter(|s| *s > 0.0)
        .collect();
    let latencies: Vec<f64> = history
        .iter()
        .map(|e| e.latency)
        .filter(|l| *l > 0.0)
        .collect();

    let peak = history
        .iter()
        .max_by(|a, b| {
            a.total_traffic
                .partial_cmp(&b.total_traffic)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|entry| entry.total_traffic > 0.0);

    SummaryStats {
        total_traffic,
        avg_score: if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        },
        avg_latency: if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        },
        peak_traffic: peak.map(|e| e.total_traffic).unwrap_or(0.0),
        peak_time: peak
            .map(|e| e.text.clone())
            .unwrap_or_else(|| "N/A".to_string()),
        data_points: history.len(),
        active_hours: history.iter().filter(|e| e.total_traffic > 0.0).count(),
    }
}

impl ChatPipeline {
    pub(crate) async fn run_smartcare(&self, query: &str) -> (ChatResponse, EntitySet) {
        let entities = EntitySet::default();

        let Some(raw) = self.msisdn.extract(query) else {
            let response = ChatResponse::new(
                WorkflowKind::SmartCare,
                ResponseStatus::Error,
                "❌ Query parsing failed: No valid MSISDN found in query",
                json!({ "error_type": "parsing_error" }),
            );
            return (response, entities);
        };

        let validated = match self.msisdn.validate(&raw) {
            Ok(v) => v,
            Err(e) => {
                let response = ChatResponse::new(
                    WorkflowKind::SmartCare,
                    ResponseStatus::Error,
                    format!("❌ Query parsing failed: {e}"),
                    json!({ "error_type": "parsing_error" }),
                );
                return (response, entities);
            }
        };

        // Business rule: only Telkomsel numbers may reach the live API.
        if !validated.is_telkomsel() {
            let response = ChatResponse::new(
                WorkflowKind::SmartCare,
                ResponseStatus::Error,
                format!(
                    "❌ Nomor {} bukan nomor Telkomsel. Sistem hanya mendukung analisis \
                     nomor Telkomsel.",
                    validated.display
                ),
                json!({
                    "error_type": "invalid_operator",
                    "operator": validated.operator.name(),
                }),
            );
            return (response, entities);
        }

        let now = chrono::Local::now().naive_local();
        let range = self.time.resolve_with_assist(query, now).await;
        let summary = match self.time.validate_range(range.start, range.end, now) {
            Ok(summary) => summary,
            Err(e) => {
                let response = ChatResponse::new(
                    WorkflowKind::SmartCare,
                    ResponseStatus::Error,
                    format!("❌ Invalid time range: {e}"),
                    json!({ "error_type": "invalid_time_range" }),
                );
                return (response, entities);
            }
        };

        let Some(api) = &self.smartcare else {
            return (maintenance_response(&validated, "SmartCare client not configured"), entities);
        };

        // The upstream API expects the 8… form.
        let api_msisdn = self
            .msisdn
            .normalize_for_api(&validated.normalized)
            .unwrap_or_else(|| validated.normalized.clone());

        let history = match api
            .query_history(&api_msisdn, &range.start_str(), &range.end_str())
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!("SmartCare lookup failed: {e}");
                return (maintenance_response(&validated, &e.to_string()), entities);
            }
        };

        if history.history.is_empty() {
            let response = ChatResponse::new(
                WorkflowKind::SmartCare,
                ResponseStatus::Success,
                format!(
                    "📱 **Data untuk nomor {}**\n\n❌ Tidak ada data ditemukan untuk \
                     periode {}.",
                    validated.display, summary.duration_text
                ),
                json!({
                    "msisdn": validated.normalized,
                    "time_range": [range.start_str(), range.end_str()],
                    "data_points": 0,
                }),
            );
            return (response, entities);
        }

        let stats = summarize_history(&history.history);
        let intent = detect_smartcare_intent(query);
        let narrative = match intent {
            SmartCareIntent::Usage => usage_narrative(&validated, &summary.duration_text, &stats),
            SmartCareIntent::History => {
                history_narrative(&validated, &summary.duration_text, &stats, &history.history)
            }
            SmartCareIntent::Detail => detail_narrative(
                &validated,
                &range.start_str(),
                &range.end_str(),
                &summary.duration_text,
                &stats,
            ),
            SmartCareIntent::Check => check_narrative(&validated, &summary.duration_text, &stats),
        };

        let response = ChatResponse::new(
            WorkflowKind::SmartCare,
            ResponseStatus::Success,
            narrative,
            json!({
                "msisdn": validated.normalized,
                "operator": validated.operator.name(),
                "time_range": [range.start_str(), range.end_str()],
                "intent": intent,
                "data_points": stats.data_points,
                "summary_stats": stats,
            }),
        );
        (response, entities)
    }
}

/// User-facing response when the live API is down, in any way.
fn maintenance_response(msisdn: &ValidatedMsisdn, error: &str) -> ChatResponse {
    ChatResponse::new(
        WorkflowKind::SmartCare,
        ResponseStatus::Maintenance,
        format!(
            "🔧 **Layanan SmartCare Sedang Maintenance**\n\n\
             **Nomor:** {} (Telkomsel)\n\
             **Status:** API server sedang dalam perbaikan\n\n\
             ⏳ **Mohon tunggu beberapa saat dan coba lagi.**\n\
             📞 **Atau hubungi customer service untuk bantuan langsung.**",
            msisdn.display
        ),
        json!({
            "error_type": "api_unavailable",
            "msisdn": &msisdn.normalized,
            "error_details": error,
        }),
    )
}

fn traffic_display(total_traffic: f64) -> String {
    if total_traffic >= 1024.0 {
        format!("{:.2} GB", total_traffic / 1024.0)
    } else {
        format!("{total_traffic:.2} MB")
    }
}

fn usage_narrative(msisdn: &ValidatedMsisdn, duration: &str, stats: &SummaryStats) -> String {
    let mut narrative = format!(
        "📱 **Analisis Penggunaan Data**\n\n\
         **Nomor:** {display} ({operator})\n\
         **Periode:** {duration}\n\n\
         📊 **Ringkasan Penggunaan:**\n\
         • Total Traffic: {traffic}\n\
         • Score Rata-rata: {score:.1}/100\n\
         • Peak Usage: {peak:.2} MB pada {peak_time}\n\
         • Jam Aktif: {active} dari {points} jam\n",
        display = msisdn.display,
        operator = msisdn.operator.name(),
        traffic = traffic_display(stats.total_traffic),
        score = stats.avg_score,
        peak = stats.peak_traffic,
        peak_time = stats.peak_time,
        active = stats.active_hours,
        points = stats.data_points,
    );

    if stats.total_traffic == 0.0 {
        narrative.push_str("\nℹ️ **Insight:** Tidak ada aktivitas data terdeteksi pada periode ini.");
    } else if stats.total_traffic < 1.0 {
        narrative.push_str("\nℹ️ **Insight:** Penggunaan data sangat rendah, mostly idle.");
    } else if stats.total_traffic > 100.0 {
        narrative.push_str("\nℹ️ **Insight:** Penggunaan data tinggi, kemungkinan heavy usage periode.");
    }

    if stats.avg_score > 0.0 {
        if stats.avg_score >= 80.0 {
            narrative.push_str("\n✅ **Kualitas:** Score tinggi, koneksi sangat baik.");
        } else if stats.avg_score >= 60.0 {
            narrative.push_str("\n⚠️ **Kualitas:** Score sedang, koneksi cukup stabil.");
        } else {
            narrative.push_str("\n❌ **Kualitas:** Score rendah, ada gangguan koneksi.");
        }
    }

    narrative
}

fn history_narrative(
    msisdn: &ValidatedMsisdn,
    duration: &str,
    stats: &SummaryStats,
    history: &[HistoryEntry],
) -> String {
    let mut narrative = format!(
        "📱 **Riwayat Aktivitas Data**\n\n\
         **Nomor:** {} ({})\n\
         **Periode:** {duration}\n\n\
         📈 **Timeline Aktivitas:**\n",
        msisdn.display,
        msisdn.operator.name(),
    );

    let active_periods: Vec<String> = history
        .iter()
        .filter(|entry| entry.total_traffic > 1.0)
        .map(|entry| {
            let time = entry
                .text
                .split_once(' ')
                .map(|(_, t)| t)
                .unwrap_or(&entry.text);
            format!("• {time}: {:.1} MB", entry.total_traffic)
        })
        .collect();

    if active_periods.is_empty() {
        narrative.push_str("• Tidak ada aktivitas signifikan terdeteksi");
    } else {
        narrative.push_str(&active_periods[..active_periods.len().min(10)].join("\n"));
        if active_periods.len() > 10 {
            narrative.push_str(&format!(
                "\n... dan {} periode lainnya",
                active_periods.len() - 10
            ));
        }
    }

    narrative.push_str(&format!(
        "\n\n📊 **Statistik:**\n\
         • Total: {:.2} MB\n\
         • Peak: {:.2} MB\n\
         • Jam Aktif: {}/{}",
        stats.total_traffic, stats.peak_traffic, stats.active_hours, stats.data_points,
    ));

    narrative
}

fn detail_narrative(
    msisdn: &ValidatedMsisdn,
    start: &str,
    end: &str,
    duration: &str,
    stats: &SummaryStats,
) -> String {
    let mut narrative = format!(
        "📱 **Detail Teknis Lengkap**\n\n\
         **Informasi Nomor:**\n\
         • MSISDN: {display}\n\
         • Format Internal: {normalized}\n\
         • Operator: {operator}\n\n\
         **Periode Analisis:**\n\
         • Waktu: {start} - {end}\n\
         • Durasi: {duration}\n\n\
         **Metrik Performa:**\n\
         • Total Traffic: {traffic:.2} MB\n\
         • Average Score: {score:.1}/100\n\
         • Average Latency: {latency:.1} ms\n\
         • Peak Traffic: {peak:.2} MB pada {peak_time}\n\n\
         **Data Points:** {points} jam dianalisis\n\
         **Active Periods:** {active} jam dengan aktivitas\n",
        display = msisdn.display,
        normalized = msisdn.normalized,
        operator = msisdn.operator.name(),
        traffic = stats.total_traffic,
        score = stats.avg_score,
        latency = stats.avg_latency,
        peak = stats.peak_traffic,
        peak_time = stats.peak_time,
        points = stats.data_points,
        active = stats.active_hours,
    );

    if stats.avg_latency > 0.0 {
        if stats.avg_latency < 30.0 {
            narrative.push_str("\n🟢 **Latency:** Sangat baik (< 30ms)");
        } else if stats.avg_latency < 50.0 {
            narrative.push_str("\n🟡 **Latency:** Normal (30-50ms)");
        } else {
            narrative.push_str("\n🔴 **Latency:** Tinggi (> 50ms)");
        }
    }

    narrative
}

fn check_narrative(msisdn: &ValidatedMsisdn, duration: &str, stats: &SummaryStats) -> String {
    format!(
        "📱 **Status Check - {display}**\n\n\
         ✅ Data berhasil diambil untuk periode {duration}\n\n\
         📊 **Quick Stats:**\n\
         • Total Traffic: {traffic:.2} MB\n\
         • Quality Score: {score:.1}/100\n\
         • Data Points: {points} jam\n\n\
         💡 *Gunakan 'riwayat {normalized}' untuk timeline atau 'detail {normalized}' \
         untuk analisis mendalam.*",
        display = msisdn.display,
        traffic = stats.total_traffic,
        score = stats.avg_score,
        points = stats.data_points,
        normalized = msisdn.normalized,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(traffic: f64, score: f64, latency: f64, text: &str) -> HistoryEntry {
        HistoryEntry {
            total_traffic: traffic,
            total_score: score,
            latency,
            text: text.to_string(),
            utc: None,
        }
    }

    #[test]
    fn stats_exclude_zero_scores_from_average() {
        let history = vec![
            entry(10.0, 80.0, 20.0, "2025-07-15 09:00"),
            entry(0.0, 0.0, 0.0, "2025-07-15 10:00"),
            entry(30.0, 60.0, 40.0, "2025-07-15 11:00"),
        ];
        let stats = summarize_history(&history);
        assert_eq!(stats.total_traffic, 40.0);
        assert_eq!(stats.avg_score, 70.0);
        assert_eq!(stats.avg_latency, 30.0);
        assert_eq!(stats.peak_traffic, 30.0);
        assert_eq!(stats.peak_time, "2025-07-15 11:00");
        assert_eq!(stats.active_hours, 2);
    }

    #[test]
    fn detects_sub_intents() {
        assert_eq!(detect_smartcare_intent("usage 628111992172 hari ini"), SmartCareIntent::Usage);
        assert_eq!(
            detect_smartcare_intent("riwayat 08111992172 pagi tadi"),
            SmartCareIntent::History
        );
        assert_eq!(
            detect_smartcare_intent("detil 08111992172 2 jam lalu"),
            SmartCareIntent::Detail
        );
        assert_eq!(detect_smartcare_intent("cek 08111992172 jam 10"), SmartCareIntent::Check);
    }
}
