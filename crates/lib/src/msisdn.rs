//! # MSISDN Validation
//!
//! Normalizes Indonesian mobile numbers to the canonical `628…` form and
//! identifies the carrier from the operator prefix. The API-facing `8…` form
//! is produced by a separate function so the two conversions can never be
//! applied on top of each other by accident.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Candidate number patterns, tried in order of confidence.
static MSISDN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b628\d{8,12}\b", // 628111992172
        r"\b08\d{8,12}\b",  // 08111992172
        r"\b8\d{9,12}\b",   // 8111992172
        r"\b\d{10,15}\b",   // fallback for any long digit run
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static MSISDN pattern"))
    .collect()
});

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static pattern"));

/// Indonesian mobile operators, partitioned by prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Telkomsel,
    Indosat,
    XlAxiata,
    Axis,
    Three,
}

impl Operator {
    /// Resolves an operator from the three-digit prefix following the `62`
    /// country code (e.g. `811` for `628111992172`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "811" | "812" | "813" | "821" | "822" | "823" | "851" | "852" | "853" => {
                Some(Operator::Telkomsel)
            }
            "814" | "815" | "816" | "855" | "856" | "857" | "858" => Some(Operator::Indosat),
            "817" | "818" | "819" | "859" | "877" | "878" => Some(Operator::XlAxiata),
            "838" | "831" | "832" | "833" => Some(Operator::Axis),
            "895" | "896" | "897" | "898" | "899" => Some(Operator::Three),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Telkomsel => "Telkomsel",
            Operator::Indosat => "Indosat",
            Operator::XlAxiata => "XL Axiata",
            Operator::Axis => "Axis",
            Operator::Three => "Three",
        }
    }
}

/// Validation failures. Both are non-fatal: callers treat them as "this is
/// not an MSISDN query".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MsisdnError {
    #[error("Invalid MSISDN format")]
    InvalidFormat,
    #[error("Invalid operator or number length")]
    InvalidOperator,
}

/// A number that passed normalization and the operator prefix check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMsisdn {
    /// Canonical `628…` form.
    pub normalized: String,
    pub operator: Operator,
    /// Grouped form for display, e.g. `628-111-992-172`.
    pub display: String,
}

impl ValidatedMsisdn {
    pub fn is_telkomsel(&self) -> bool {
        self.operator == Operator::Telkomsel
    }
}

/// Validates and normalizes Indonesian MSISDNs.
#[derive(Debug, Clone, Default)]
pub struct MsisdnValidator;

impl MsisdnValidator {
    pub fn new() -> Self {
        Self
    }

    /// Extracts the first valid MSISDN from free text, normalized to `628…`.
    pub fn extract(&self, text: &str) -> Option<String> {
        for pattern in MSISDN_PATTERNS.iter() {
            for m in pattern.find_iter(text) {
                if let Some(normalized) = self.normalize(m.as_str()) {
                    if is_valid_operator(&normalized) {
                        return Some(normalized);
                    }
                }
            }
        }
        None
    }

    /// Extracts every valid MSISDN from free text, deduplicated.
    pub fn extract_all(&self, text: &str) -> Vec<String> {
        let mut found = Vec::new();
        for pattern in MSISDN_PATTERNS.iter() {
            for m in pattern.find_iter(text) {
                if let Some(normalized) = self.normalize(m.as_str()) {
                    if is_valid_operator(&normalized) && !found.contains(&normalized) {
                        found.push(normalized);
                    }
                }
            }
        }
        found
    }

    /// Normalizes a raw number to the canonical international form:
    /// `62` followed by the subscriber digits (which start with `8`).
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut text = raw.trim();
        if let Some(stripped) = text.strip_prefix('+') {
            text = stripped;
        }
        let digits = NON_DIGITS.replace_all(text, "");
        if digits.is_empty() {
            return None;
        }

        let subscriber = if let Some(rest) = digits.strip_prefix("62") {
            rest.to_string()
        } else if let Some(rest) = digits.strip_prefix('0') {
            rest.to_string()
        } else if digits.starts_with('8') {
            digits.to_string()
        } else {
            return None;
        };

        if !subscriber.starts_with('8') || subscriber.len() < 10 {
            return None;
        }

        Some(format!("62{subscriber}"))
    }

    /// Normalizes to the `8…` form the SmartCare API expects (country code
    /// stripped). Kept separate from [`normalize`](Self::normalize) so the
    /// two conversions are never chained implicitly.
    pub fn normalize_for_api(&self, raw: &str) -> Option<String> {
        let digits = NON_DIGITS.replace_all(raw, "");
        if digits.is_empty() {
            return None;
        }

        if let Some(rest) = digits.strip_prefix("62") {
            Some(rest.to_string())
        } else if let Some(rest) = digits.strip_prefix('0') {
            Some(rest.to_string())
        } else if digits.starts_with('8') && digits.len() >= 10 {
            Some(digits.to_string())
        } else if digits.len() >= 10 {
            Some(format!("8{digits}"))
        } else {
            None
        }
    }

    /// Full validation with operator resolution.
    pub fn validate(&self, raw: &str) -> Result<ValidatedMsisdn, MsisdnError> {
        let normalized = self.normalize(raw).ok_or(MsisdnError::InvalidFormat)?;
        if !is_valid_operator(&normalized) {
            return Err(MsisdnError::InvalidOperator);
        }
        let operator = Operator::from_prefix(&normalized[2..5]).ok_or(MsisdnError::InvalidOperator)?;
        Ok(ValidatedMsisdn {
            display: display_format(&normalized),
            normalized,
            operator,
        })
    }

    /// Business rule: live lookups are only allowed for Telkomsel numbers.
    pub fn is_telkomsel(&self, raw: &str) -> bool {
        self.validate(raw)
            .map(|v| v.is_telkomsel())
            .unwrap_or(false)
    }
}

/// Checks the normalized length window and the operator prefix table.
fn is_valid_operator(normalized: &str) -> bool {
    if !normalized.starts_with("628") {
        return false;
    }
    if normalized.len() < 12 || normalized.len() > 15 {
        return false;
    }
    Operator::from_prefix(&normalized[2..5]).is_some()
}

/// Formats a normalized MSISDN as `628-xxx-xxx-xxx…` for display.
fn display_format(normalized: &str) -> String {
    if normalized.len() >= 12 {
        format!(
            "{}-{}-{}-{}",
            &normalized[..3],
            &normalized[3..6],
            &normalized[6..9],
            &normalized[9..]
        )
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_local_format() {
        let v = MsisdnValidator::new();
        assert_eq!(v.normalize("08111992172").as_deref(), Some("628111992172"));
        assert_eq!(v.normalize("8111992172").as_deref(), Some("628111992172"));
        assert_eq!(v.normalize("+628111992172").as_deref(), Some("628111992172"));
    }

    #[test]
    fn api_form_strips_country_code() {
        let v = MsisdnValidator::new();
        assert_eq!(v.normalize_for_api("628111992172").as_deref(), Some("8111992172"));
        assert_eq!(v.normalize_for_api("08111992172").as_deref(), Some("8111992172"));
        assert_eq!(v.normalize_for_api("8111992172").as_deref(), Some("8111992172"));
    }

    #[test]
    fn rejects_non_numeric() {
        let v = MsisdnValidator::new();
        assert_eq!(v.validate("hello"), Err(MsisdnError::InvalidFormat));
    }

    #[test]
    fn resolves_operator_partitions() {
        let v = MsisdnValidator::new();
        assert_eq!(v.validate("628123456789").map(|m| m.operator), Ok(Operator::Telkomsel));
        assert_eq!(v.validate("628151234567").map(|m| m.operator), Ok(Operator::Indosat));
        assert_eq!(v.validate("628771234567").map(|m| m.operator), Ok(Operator::XlAxiata));
        assert_eq!(v.validate("628951234567").map(|m| m.operator), Ok(Operator::Three));
    }
}
