//! Entity extraction precedence tests.

use lapor::entities::{DetailEntity, EntityExtractor, GeoEntity, SearchType};
use lapor::followup::EnhancedContext;
use lapor::intent::QueryIntent;
use lapor::mapping::SemanticMapping;
use std::collections::HashMap;
use std::sync::Arc;

fn extractor() -> EntityExtractor {
    EntityExtractor::new(Arc::new(SemanticMapping::default()))
}

fn enhanced(inherit_location: bool, location: Option<&str>) -> EnhancedContext {
    EnhancedContext {
        intent: QueryIntent::List,
        inherit_location,
        inherit_time: false,
        location: location.map(String::from),
        timeframe: None,
        filters: String::new(),
        geo_entities: Vec::new(),
    }
}

#[test]
fn inherited_location_overrides_alias_in_query_text() {
    let extractor = extractor();
    let ctx = enhanced(true, Some("Bandung"));
    let entities = extractor.extract("berapa keluhan di Jakarta", None, Some(&ctx));

    assert_eq!(entities.geographic.len(), 5);
    for geo in &entities.geographic {
        assert_eq!(geo.value, "Bandung");
        assert_eq!(geo.search, SearchType::Contains);
    }
}

#[test]
fn resolved_geo_entities_are_used_verbatim() {
    let extractor = extractor();
    let mut ctx = enhanced(false, None);
    ctx.geo_entities = vec![GeoEntity::contains("provinsi_create_ticket", "Surabaya")];
    let entities = extractor.extract("contoh keluhan di jakbar", None, Some(&ctx));

    assert_eq!(entities.geographic.len(), 1);
    assert_eq!(entities.geographic[0].value, "Surabaya");
}

#[test]
fn alias_match_fans_out_to_every_geographic_field() {
    let extractor = extractor();
    let entities = extractor.extract("berapa keluhan di jakbar", None, None);

    assert_eq!(entities.geographic.len(), 5);
    assert!(entities.geographic.iter().all(|g| g.value == "Jakarta Barat"));
    let fields: Vec<&str> = entities.geographic.iter().map(|g| g.field.as_str()).collect();
    assert!(fields.contains(&"provinsi_create_ticket"));
    assert!(fields.contains(&"customer_region_create_ticket"));
}

#[test]
fn compound_alias_wins_over_city_wide_alias() {
    let extractor = extractor();
    let entities = extractor.extract("keluhan jakarta barat minggu ini", None, None);
    assert!(entities.geographic.iter().all(|g| g.value == "Jakarta Barat"));
}

#[test]
fn time_phrase_maps_to_raw_condition_with_bucket_hint() {
    let extractor = extractor();
    let entities = extractor.extract("ringkasan keluhan bulan ini", None, None);

    assert_eq!(entities.temporal.len(), 1);
    assert!(entities.temporal[0].condition.contains("date_trunc('month'"));
    assert!(entities.temporal[0].group_by.is_some());
}

#[test]
fn inherited_timeframe_beats_phrase_table() {
    let extractor = extractor();
    let mut ctx = enhanced(false, None);
    ctx.inherit_time = true;
    ctx.timeframe = Some("create_time >= now() - INTERVAL '7 day'".to_string());
    let entities = extractor.extract("contoh minggu ini", None, Some(&ctx));

    assert_eq!(entities.temporal.len(), 1);
    assert!(entities.temporal[0].condition.contains("INTERVAL '7 day'"));
}

#[test]
fn ticket_id_is_canonicalized_to_uppercase() {
    let extractor = extractor();
    let entities = extractor.extract("tolong cek cc-20250603-00000475", None, None);

    assert_eq!(
        entities.detail,
        vec![DetailEntity::Ticket {
            value: "CC-20250603-00000475".to_string()
        }]
    );
}

#[test]
fn local_msisdn_is_stored_in_international_form() {
    let extractor = extractor();
    let entities = extractor.extract("data pelanggan 08111992172", None, None);

    assert_eq!(
        entities.detail,
        vec![DetailEntity::Msisdn {
            value: "628111992172".to_string()
        }]
    );
}

#[test]
fn fuzzy_digits_are_last_resort_only() {
    let extractor = extractor();

    // A bare digit run with no structural prefix gets the fuzzy subtype.
    let entities = extractor.extract("nomor pelanggan 1234567890123", None, None);
    assert_eq!(
        entities.detail,
        vec![DetailEntity::MsisdnFuzzy {
            value: "1234567890123".to_string()
        }]
    );

    // A stricter match suppresses the fuzzy capture entirely.
    let entities = extractor.extract("cc-20250603-00000475 atau 628111992172", None, None);
    assert_eq!(entities.detail.len(), 2);
    assert!(entities
        .detail
        .iter()
        .all(|d| !matches!(d, DetailEntity::MsisdnFuzzy { .. })));
}

#[test]
fn status_filter_comes_only_from_enhanced_context() {
    let extractor = extractor();
    let mut ctx = enhanced(false, None);
    ctx.filters = "yang belum solve".to_string();
    let entities = extractor.extract("berikan contohnya", None, Some(&ctx));

    assert_eq!(entities.status.len(), 1);
    assert_eq!(entities.status[0].field, "business_status");
    assert_eq!(entities.status[0].value, "BusinessStatusInProgress");
    assert_eq!(entities.status[0].search, SearchType::ExactMatch);
}

#[test]
fn field_synonyms_fill_unpopulated_categories() {
    let extractor = extractor();
    let entities = extractor.extract("keluhan dengan status progress di jakarta", None, None);

    assert_eq!(entities.status.len(), 1);
    assert_eq!(entities.status[0].value, "BusinessStatusInProgress");
    // Geography still comes from the alias table.
    assert!(entities.geographic.iter().all(|g| g.value == "Jakarta"));
}

#[test]
fn prior_context_entities_never_reach_where_clauses() {
    let extractor = extractor();
    let mut context = HashMap::new();
    context.insert("last_location".to_string(), "Jakarta".to_string());
    context.insert("irrelevant".to_string(), "x".to_string());
    let entities = extractor.extract("halo", Some(&context), None);

    assert_eq!(entities.context.len(), 1);
    assert_eq!(entities.context[0].field, "last_location");
}

#[test]
fn empty_categories_are_omitted_from_serialized_form() {
    let extractor = extractor();
    let entities = extractor.extract("berapa keluhan di jakarta", None, None);
    let json = serde_json::to_value(&entities).expect("serializes");

    let object = json.as_object().expect("object");
    assert!(object.contains_key("geographic"));
    assert!(!object.contains_key("temporal"));
    assert!(!object.contains_key("status"));
    assert!(!object.contains_key("detail"));
}
