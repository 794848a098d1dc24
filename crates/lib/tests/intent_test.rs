//! Intent classification tier tests.

mod common;

use crate::common::{setup_tracing, FailingAiProvider, MockAiProvider};
use lapor::entities::{EntitySet, GeoEntity, TemporalEntity};
use lapor::intent::{IntentCategory, IntentClassifier, QueryIntent};
use lapor::providers::ai::AiProvider;
use lapor::session::FollowupContext;
use std::sync::Arc;

fn classifier_without_ai() -> IntentClassifier {
    IntentClassifier::new(None)
}

fn followup_ctx() -> FollowupContext {
    let mut entities = EntitySet::default();
    entities.geographic = vec![GeoEntity::contains("provinsi_create_ticket", "Bandung")];
    entities.temporal = vec![TemporalEntity {
        condition: "create_time >= date_trunc('month', CURRENT_DATE)".to_string(),
        group_by: None,
    }];
    FollowupContext {
        previous_query: "ringkasan keluhan di bandung bulan ini".to_string(),
        previous_response: "...".to_string(),
        previous_workflow: "summary".to_string(),
        previous_entities: entities,
    }
}

#[tokio::test]
async fn msisdn_always_forces_live_lookup() {
    setup_tracing();
    let classifier = classifier_without_ai();

    // Co-occurring keywords from other tiers must not win.
    for query in [
        "berapa total usage 08111992172",
        "ringkasan 628111992172 hari ini",
        "contoh keluhan 08111992172",
    ] {
        let result = classifier.classify(query, None).await;
        assert_eq!(result.category, IntentCategory::LiveLookup, "{query}");
    }
}

#[tokio::test]
async fn injected_system_prompts_are_skipped() {
    let classifier = classifier_without_ai();
    let result = classifier
        .classify("### Task: generate summaries", None)
        .await;
    assert_eq!(result.category, IntentCategory::SystemPrompt);
    assert!((result.confidence - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn knowledge_keywords_are_a_hard_rule() {
    let classifier = classifier_without_ai();
    let result = classifier
        .classify("bagaimana cara troubleshoot internet lambat", None)
        .await;
    assert_eq!(result.category, IntentCategory::Knowledge);
}

#[tokio::test]
async fn followup_without_ai_inherits_conservatively() {
    let classifier = classifier_without_ai();
    let ctx = followup_ctx();
    let result = classifier.classify("berikan contohnya", Some(&ctx)).await;

    assert_eq!(result.category, IntentCategory::Followup);
    let enhanced = result.enhanced_context.expect("enhanced context present");
    assert_eq!(enhanced.intent, QueryIntent::List);
    assert!(enhanced.inherit_location);
    assert!(enhanced.inherit_time);
    assert_eq!(enhanced.location.as_deref(), Some("Bandung"));
    assert_eq!(enhanced.geo_entities.len(), 1);
}

#[tokio::test]
async fn followup_with_ai_honors_the_labeled_decision() {
    let mock = MockAiProvider::new(vec![
        "INTENT: count\nINHERIT_LOCATION: yes\nINHERIT_TIME: no\nFILTERS: yang belum solve"
            .to_string(),
    ]);
    let classifier = IntentClassifier::new(Some(Arc::new(mock) as Arc<dyn AiProvider>));
    let ctx = followup_ctx();
    let result = classifier.classify("berapa yang belum selesai itu", Some(&ctx)).await;

    let enhanced = result.enhanced_context.expect("enhanced context present");
    assert_eq!(enhanced.intent, QueryIntent::Count);
    assert!(enhanced.inherit_location);
    assert!(!enhanced.inherit_time);
    assert_eq!(enhanced.location.as_deref(), Some("Bandung"));
    assert_eq!(enhanced.timeframe, None);
    assert_eq!(enhanced.filters, "yang belum solve");
}

#[tokio::test]
async fn ai_labels_map_to_categories() {
    let mock = MockAiProvider::new(vec![
        "CLASSIFICATION: COMPLAINT\nCONFIDENCE: 0.95\nREASONING: analisis geografis keluhan"
            .to_string(),
    ]);
    let classifier = IntentClassifier::new(Some(Arc::new(mock) as Arc<dyn AiProvider>));
    let result = classifier.classify("berapa keluhan di jakarta", None).await;

    assert_eq!(result.category, IntentCategory::ComplaintAnalytics);
    assert!((result.confidence - 0.95).abs() < f64::EPSILON);
}

#[tokio::test]
async fn ai_failure_falls_back_to_keyword_ladder() {
    let classifier = IntentClassifier::new(Some(Arc::new(FailingAiProvider) as Arc<dyn AiProvider>));

    let result = classifier.classify("nasi padang paling enak", None).await;
    assert_eq!(result.category, IntentCategory::OffTopic);

    let result = classifier.classify("berapa keluhan di jakarta", None).await;
    assert_eq!(result.category, IntentCategory::ComplaintAnalytics);
}

#[tokio::test]
async fn fallback_recognizes_ticket_ids() {
    let classifier = classifier_without_ai();
    let result = classifier.classify("CC-20250101-00000001", None).await;
    assert_eq!(result.category, IntentCategory::ComplaintAnalytics);
}

#[tokio::test]
async fn no_signal_defaults_to_off_topic_low_confidence() {
    let classifier = classifier_without_ai();
    let result = classifier.classify("zzz qqq", None).await;
    assert_eq!(result.category, IntentCategory::OffTopic);
    assert!(result.confidence <= 0.7);
}
