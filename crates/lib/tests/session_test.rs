//! Session store behavior: bounded history, expiry, follow-up detection.

use chrono::Utc;
use lapor::entities::{EntitySet, GeoEntity};
use lapor::session::{InMemorySessionStore, Interaction, SessionStore, MAX_HISTORY};

fn interaction(query: &str) -> Interaction {
    let mut entities = EntitySet::default();
    entities.geographic = vec![GeoEntity::contains("provinsi_create_ticket", "Jakarta")];
    Interaction {
        timestamp: Utc::now(),
        query: query.to_string(),
        response: "ok".to_string(),
        workflow: "count".to_string(),
        entities,
    }
}

#[tokio::test]
async fn history_is_bounded_to_ten_entries_oldest_first_out() {
    let store = InMemorySessionStore::new(3600);
    for i in 0..12 {
        store
            .save_interaction("s1", interaction(&format!("query {i}")))
            .await;
    }

    let session = store.snapshot("s1").await.expect("session exists");
    assert_eq!(session.history.len(), MAX_HISTORY);
    assert_eq!(session.history.first().map(|i| i.query.as_str()), Some("query 2"));
    assert_eq!(session.history.last().map(|i| i.query.as_str()), Some("query 11"));
}

#[tokio::test]
async fn followup_needs_both_trigger_and_history() {
    let store = InMemorySessionStore::new(3600);

    // Trigger phrase without history: not a follow-up.
    assert!(store.followup_context("s1", "berikan contohnya").await.is_none());

    store.save_interaction("s1", interaction("berapa keluhan di jakarta")).await;

    // History without a trigger phrase: not a follow-up.
    assert!(store
        .followup_context("s1", "berapa keluhan di surabaya")
        .await
        .is_none());

    // Both: the previous turn's context is returned.
    let ctx = store
        .followup_context("s1", "berikan contohnya")
        .await
        .expect("follow-up context");
    assert_eq!(ctx.previous_query, "berapa keluhan di jakarta");
    assert_eq!(ctx.previous_workflow, "count");
    assert_eq!(ctx.previous_entities.geographic.len(), 1);
}

#[tokio::test]
async fn sessions_are_isolated_by_id() {
    let store = InMemorySessionStore::new(3600);
    store.save_interaction("s1", interaction("query a")).await;

    assert!(store.followup_context("s2", "berikan contohnya").await.is_none());
    assert!(store.snapshot("s2").await.is_none());
}

#[tokio::test]
async fn expired_sessions_are_dropped_on_access() {
    let store = InMemorySessionStore::new(0);
    store.save_interaction("s1", interaction("query a")).await;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(store.snapshot("s1").await.is_none());
    assert!(store.followup_context("s1", "berikan contohnya").await.is_none());
}
