//! MSISDN normalization and carrier partition tests.

use lapor::msisdn::{MsisdnError, MsisdnValidator, Operator};

const TELKOMSEL_PREFIXES: &[&str] = &[
    "811", "812", "813", "821", "822", "823", "851", "852", "853",
];
const OTHER_PREFIXES: &[&str] = &[
    "814", "815", "816", "855", "856", "857", "858", "817", "818", "819", "859", "877", "878",
    "838", "831", "832", "833", "895", "896", "897", "898", "899",
];

#[test]
fn normalization_is_idempotent() {
    let validator = MsisdnValidator::new();
    for input in ["08111992172", "628111992172", "8111992172", "+628111992172"] {
        let once = validator.normalize(input).expect("valid input normalizes");
        let twice = validator
            .normalize(&once)
            .expect("normalized form re-normalizes");
        assert_eq!(once, twice, "normalize must be idempotent for {input}");
    }
}

#[test]
fn all_telkomsel_prefixes_are_telkomsel() {
    let validator = MsisdnValidator::new();
    for prefix in TELKOMSEL_PREFIXES {
        let msisdn = format!("62{prefix}123456789");
        assert!(
            validator.is_telkomsel(&msisdn),
            "{msisdn} should be Telkomsel"
        );
    }
}

#[test]
fn non_telkomsel_prefixes_are_rejected_by_is_telkomsel() {
    let validator = MsisdnValidator::new();
    for prefix in OTHER_PREFIXES {
        let msisdn = format!("62{prefix}123456789");
        let validated = validator.validate(&msisdn).expect("valid operator");
        assert_ne!(validated.operator, Operator::Telkomsel);
        assert!(!validator.is_telkomsel(&msisdn));
    }
}

#[test]
fn api_form_is_separate_and_stable() {
    let validator = MsisdnValidator::new();
    assert_eq!(
        validator.normalize_for_api("628111992172").as_deref(),
        Some("8111992172")
    );
    assert_eq!(
        validator.normalize_for_api("08111992172").as_deref(),
        Some("8111992172")
    );
    // Applying the API conversion twice must not strip anything further.
    let once = validator.normalize_for_api("628111992172").unwrap();
    assert_eq!(validator.normalize_for_api(&once).as_deref(), Some("8111992172"));
}

#[test]
fn unknown_prefix_is_invalid_operator() {
    let validator = MsisdnValidator::new();
    assert_eq!(
        validator.validate("628401234567"),
        Err(MsisdnError::InvalidOperator)
    );
}

#[test]
fn garbage_is_invalid_format() {
    let validator = MsisdnValidator::new();
    assert_eq!(validator.validate("halo dunia"), Err(MsisdnError::InvalidFormat));
    assert_eq!(validator.validate("12345"), Err(MsisdnError::InvalidFormat));
}

#[test]
fn extracts_first_valid_number_from_text() {
    let validator = MsisdnValidator::new();
    assert_eq!(
        validator.extract("tolong cek 08111992172 sekarang").as_deref(),
        Some("628111992172")
    );
    assert_eq!(validator.extract("tidak ada nomor di sini"), None);
}

#[test]
fn extract_all_deduplicates_formats_of_the_same_number() {
    let validator = MsisdnValidator::new();
    let found = validator.extract_all("cek 08111992172 dan 628111992172");
    assert_eq!(found, vec!["628111992172".to_string()]);
}

#[test]
fn display_format_groups_digits() {
    let validator = MsisdnValidator::new();
    let validated = validator.validate("08111992172").expect("valid");
    assert_eq!(validated.display, "628-111-992-172");
}
