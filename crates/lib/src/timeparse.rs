//! # Time Expression Resolution
//!
//! Converts Indonesian/English time phrases ("2 jam lalu", "kemarin",
//! "jam 10") into concrete start/end timestamps. Patterns are tried in a
//! fixed priority order; an optional AI-assisted extractor is consulted as a
//! last resort before defaulting to the current day.
//!
//! Day ranges end at `:55` rather than `:59` to leave headroom before hourly
//! boundaries in the downstream APIs. Preserve this convention.

use crate::providers::ai::AiProvider;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use dyn_clone::DynClone;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// The timestamp format shared with the SmartCare API.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

static HOURS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(jam|hour)s?\s*(yang\s+)?lalu").expect("static pattern"));
static MINUTES_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(menit|minute)s?\s*(yang\s+)?lalu").expect("static pattern"));
static SPECIFIC_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"jam\s*(\d{1,2})").expect("static pattern"));
static SPECIFIC_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[:.](\d{2})").expect("static pattern"));
static TODAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"hari\s+ini|today|sekarang").expect("static pattern"));
static YESTERDAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"kemarin|yesterday").expect("static pattern"));
static DAYS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(hari|day)s?\s*(yang\s+)?lalu").expect("static pattern"));
static THIS_MORNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pagi\s+(ini|tadi)|this\s+morning").expect("static pattern"));
static THIS_AFTERNOON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"siang\s+(ini|tadi)|this\s+afternoon").expect("static pattern"));
static THIS_EVENING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"sore\s+(ini|tadi)|this\s+evening").expect("static pattern"));
static LAST_NIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"malam\s+tadi|last\s+night").expect("static pattern"));
static DATE_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})").expect("static pattern"));
static EXTRACTED_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2})\s*,\s*(\d{4}-\d{2}-\d{2} \d{2}:\d{2})")
        .expect("static pattern")
});

/// A resolved time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// `false` means no pattern matched and the current day was assumed, so
    /// callers can distinguish "explicit today" from "assumed today".
    pub matched: bool,
    /// The lowercased expression the range was resolved from.
    pub expression: String,
}

impl ResolvedRange {
    pub fn start_str(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(TIME_FORMAT).to_string()
    }
}

/// Distinct rejection reasons for [`TimeParser::validate_range`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("Start time must be before end time")]
    StartNotBeforeEnd,
    #[error("Time range cannot be in the future")]
    StartInFuture,
    #[error("Time range is too old (max 30 days ago)")]
    EndTooOld,
}

/// A validated range with display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSummary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_hours: f64,
    /// Indonesian duration text, e.g. "2 jam 30 menit".
    pub duration_text: String,
}

/// Last-resort free-text date extraction, consulted only after every local
/// pattern has failed. Implementations return a `(start, end)` pair or `None`.
#[async_trait]
pub trait DateExtractor: Send + Sync + Debug + DynClone {
    async fn extract(&self, text: &str) -> Option<(NaiveDateTime, NaiveDateTime)>;
}

dyn_clone::clone_trait_object!(DateExtractor);

/// AI-backed [`DateExtractor`]: asks the model for a strict
/// `YYYY-MM-DD HH:MM,YYYY-MM-DD HH:MM` pair and parses it defensively.
#[derive(Clone)]
pub struct LlmDateExtractor {
    ai: Arc<dyn AiProvider>,
}

impl LlmDateExtractor {
    pub fn new(ai: Arc<dyn AiProvider>) -> Self {
        Self { ai }
    }
}

impl Debug for LlmDateExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDateExtractor").finish_non_exhaustive()
    }
}

#[async_trait]
impl DateExtractor for LlmDateExtractor {
    async fn extract(&self, text: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let system_prompt = "You extract dates from short Indonesian text. \
            If a date is found, answer with ONLY `YYYY-MM-DD 00:00,YYYY-MM-DD 23:55`. \
            If no date is found, answer with: NONE";
        let user_prompt = format!(
            "Examples:\n\
             - \"1 juli 2025\" -> 2025-07-01 00:00,2025-07-01 23:55\n\
             - \"tanggal 15 agustus 2025\" -> 2025-08-15 00:00,2025-08-15 23:55\n\
             - \"15/8/25\" -> 2025-08-15 00:00,2025-08-15 23:55\n\n\
             Text: {text}\nAnswer:"
        );

        let response = match self.ai.generate(system_prompt, &user_prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!("AI date extraction failed: {e}");
                return None;
            }
        };

        let caps = EXTRACTED_PAIR.captures(&response)?;
        let start = NaiveDateTime::parse_from_str(&caps[1], TIME_FORMAT).ok()?;
        let end = NaiveDateTime::parse_from_str(&caps[2], TIME_FORMAT).ok()?;
        Some((start, end))
    }
}

/// Resolves natural-language time expressions to concrete windows.
#[derive(Debug, Clone, Default)]
pub struct TimeParser {
    assist: Option<Arc<dyn DateExtractor>>,
}

impl TimeParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assist(assist: Arc<dyn DateExtractor>) -> Self {
        Self {
            assist: Some(assist),
        }
    }

    /// Resolves using the local pattern ladder only.
    pub fn resolve(&self, text: &str, now: NaiveDateTime) -> ResolvedRange {
        let expression = text.to_lowercase().trim().to_string();
        match try_patterns(&expression, now) {
            Some((start, end)) => ResolvedRange {
                start,
                end,
                matched: true,
                expression,
            },
            None => default_today(now, expression),
        }
    }

    /// Resolves using the pattern ladder, then the assist extractor, then the
    /// default full-day window.
    pub async fn resolve_with_assist(&self, text: &str, now: NaiveDateTime) -> ResolvedRange {
        let expression = text.to_lowercase().trim().to_string();
        if let Some((start, end)) = try_patterns(&expression, now) {
            return ResolvedRange {
                start,
                end,
                matched: true,
                expression,
            };
        }

        if let Some(assist) = &self.assist {
            if let Some((start, end)) = assist.extract(&expression).await {
                debug!("assist extractor resolved '{expression}' to {start}..{end}");
                return ResolvedRange {
                    start,
                    end,
                    matched: true,
                    expression,
                };
            }
        }

        default_today(now, expression)
    }

    /// Validates a resolved range against the acceptance window.
    pub fn validate_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<RangeSummary, TimeRangeError> {
        if start >= end {
            return Err(TimeRangeError::StartNotBeforeEnd);
        }
        if start > now + Duration::days(1) {
            return Err(TimeRangeError::StartInFuture);
        }
        if end < now - Duration::days(30) {
            return Err(TimeRangeError::EndTooOld);
        }

        let duration = end - start;
        Ok(RangeSummary {
            start,
            end,
            duration_hours: duration.num_minutes() as f64 / 60.0,
            duration_text: duration_text(duration),
        })
    }
}

fn duration_text(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours} jam {minutes} menit")
    } else {
        format!("{minutes} menit")
    }
}

fn default_today(now: NaiveDateTime, expression: String) -> ResolvedRange {
    ResolvedRange {
        start: at(now.date(), 0, 0),
        end: at(now.date(), 23, 55),
        matched: false,
        expression,
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap_or(NaiveDateTime::MIN)
}

/// Tries every pattern in priority order.
fn try_patterns(text: &str, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
    // "2 jam lalu": the full clock hour two hours before now.
    if let Some(caps) = HOURS_AGO.captures(text) {
        let hours: i64 = caps[1].parse().ok()?;
        let target = now - Duration::try_hours(hours)?;
        return Some((
            at(target.date(), target.hour(), 0),
            at(target.date(), target.hour(), 59),
        ));
    }

    // "30 menit lalu": a 30-minute window either side of the target.
    if let Some(caps) = MINUTES_AGO.captures(text) {
        let minutes: i64 = caps[1].parse().ok()?;
        let target = now - Duration::try_minutes(minutes)?;
        return Some((target - Duration::minutes(30), target + Duration::minutes(30)));
    }

    // "jam 10": a 30-minute window either side of the named hour.
    if let Some(caps) = SPECIFIC_HOUR.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        if hour <= 23 {
            let target = at(now.date(), hour, 0);
            return Some((target - Duration::minutes(30), target + Duration::minutes(30)));
        }
    }

    // "10:30" or "10.30": a 30-minute window either side.
    if let Some(caps) = SPECIFIC_TIME.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        if hour <= 23 && minute <= 59 {
            let target = at(now.date(), hour, minute);
            return Some((target - Duration::minutes(30), target + Duration::minutes(30)));
        }
    }

    if TODAY.is_match(text) {
        return Some((at(now.date(), 0, 0), at(now.date(), 23, 55)));
    }

    if YESTERDAY.is_match(text) {
        let yesterday = (now - Duration::days(1)).date();
        return Some((at(yesterday, 0, 0), at(yesterday, 23, 55)));
    }

    if let Some(caps) = DAYS_AGO.captures(text) {
        let days: i64 = caps[1].parse().ok()?;
        let target = (now - Duration::try_days(days)?).date();
        return Some((at(target, 0, 0), at(target, 23, 55)));
    }

    if THIS_MORNING.is_match(text) {
        return Some((at(now.date(), 6, 0), at(now.date(), 11, 59)));
    }
    if THIS_AFTERNOON.is_match(text) {
        return Some((at(now.date(), 12, 0), at(now.date(), 17, 59)));
    }
    if THIS_EVENING.is_match(text) {
        return Some((at(now.date(), 18, 0), at(now.date(), 22, 59)));
    }
    // "malam tadi" starts yesterday evening and wraps past midnight.
    if LAST_NIGHT.is_match(text) {
        let yesterday = (now - Duration::days(1)).date();
        let start = at(yesterday, 23, 0);
        let end = at(yesterday + Duration::days(1), 5, 59);
        return Some((start, end));
    }

    // "01/07/2025" or "1-7-25".
    if let Some(caps) = DATE_DMY.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if caps[3].len() == 2 {
            year += 2000;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some((at(date, 0, 0), at(date, 23, 55)));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> NaiveDateTime {
        at(
            NaiveDate::from_ymd_opt(2025, 7, 15).expect("valid date"),
            14,
            20,
        )
    }

    #[test]
    fn today_window_uses_55_minute_end() {
        let parser = TimeParser::new();
        let range = parser.resolve("hari ini", fixed_now());
        assert!(range.matched);
        assert_eq!(range.start_str(), "2025-07-15 00:00");
        assert_eq!(range.end_str(), "2025-07-15 23:55");
    }

    #[test]
    fn unmatched_text_defaults_to_today() {
        let parser = TimeParser::new();
        let range = parser.resolve("sesuatu yang aneh", fixed_now());
        assert!(!range.matched);
        assert_eq!(range.end_str(), "2025-07-15 23:55");
    }

    #[test]
    fn explicit_date_with_two_digit_year() {
        let parser = TimeParser::new();
        let range = parser.resolve("15/8/25", fixed_now());
        assert!(range.matched);
        assert_eq!(range.start_str(), "2025-08-15 00:00");
        assert_eq!(range.end_str(), "2025-08-15 23:55");
    }

    #[test]
    fn last_night_wraps_midnight() {
        let parser = TimeParser::new();
        let range = parser.resolve("malam tadi", fixed_now());
        assert_eq!(range.start_str(), "2025-07-14 23:00");
        assert_eq!(range.end_str(), "2025-07-15 05:59");
    }
}
