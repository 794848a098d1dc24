//! HTTP-level provider tests against mock servers.

use lapor::providers::ai::{AiProvider, OllamaProvider};
use lapor::providers::db::{ClickHouseProvider, ComplaintDatabase};
use lapor::providers::smartcare::{SmartCareApi, SmartCareClient, SmartCareConfig};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn smartcare_config(server: &MockServer) -> SmartCareConfig {
    SmartCareConfig {
        token_url: format!("{}/tokens", server.uri()),
        query_url: format!("{}/query", server.uri()),
        app_key: "test-key".to_string(),
        app_secret: "test-secret".to_string(),
        request_uuid: "test-uuid".to_string(),
        user_name: "admin".to_string(),
    }
}

#[tokio::test]
async fn ollama_provider_returns_trimmed_response_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("llama3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "  CLASSIFICATION: COMPLAINT\nCONFIDENCE: 0.9  ",
            "done": true,
        })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(format!("{}/api/generate", server.uri()), "llama3".to_string())
        .expect("provider builds");
    let response = provider.generate("system", "user").await.expect("generates");
    assert!(response.starts_with("CLASSIFICATION: COMPLAINT"));
    assert!(!response.ends_with(' '));
}

#[tokio::test]
async fn ollama_provider_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3".to_string()).expect("provider builds");
    let error = provider.generate("s", "u").await.expect_err("must fail");
    assert!(error.to_string().contains("model not loaded"));
}

#[tokio::test]
async fn clickhouse_provider_parses_json_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-ClickHouse-User", "default"))
        .and(body_string_contains("SELECT count()"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "total_count": 27 }],
            "rows": 1,
        })))
        .mount(&server)
        .await;

    let provider = ClickHouseProvider::new(server.uri(), "default".to_string(), String::new(), None)
        .expect("provider builds");
    let rows = provider
        .execute_query("SELECT count() AS total_count FROM t WHERE 1=1")
        .await
        .expect("query succeeds");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("total_count"), Some(&json!(27)));
}

#[tokio::test]
async fn clickhouse_provider_maps_http_errors_to_query_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Syntax error"))
        .mount(&server)
        .await;

    let provider = ClickHouseProvider::new(server.uri(), "default".to_string(), String::new(), None)
        .expect("provider builds");
    let error = provider.execute_query("SELEC oops").await.expect_err("must fail");
    assert!(error.to_string().contains("Syntax error"));
}

#[tokio::test]
async fn smartcare_client_fetches_token_then_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens"))
        .and(body_string_contains("test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "AccessToken": "tok-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(body_string_contains("8111992172"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                { "TOTALTRAFFIC": "12.5", "TOTALSCORE": 80, "TOTALINTERNALLATENCYCCH": "25", "TEXT": "2025-07-15 09:00" },
                { "TOTALTRAFFIC": 3, "TOTALSCORE": "90", "TEXT": "2025-07-15 10:00" },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartCareClient::new(smartcare_config(&server)).expect("client builds");
    let history = client
        .query_history("8111992172", "2025-07-15 09:30", "2025-07-15 10:30")
        .await
        .expect("query succeeds");

    // Numeric fields arrive as strings or numbers; both must parse.
    assert_eq!(history.history.len(), 2);
    assert_eq!(history.history[0].total_traffic, 12.5);
    assert_eq!(history.history[0].latency, 25.0);
    assert_eq!(history.history[1].total_score, 90.0);
}

#[tokio::test]
async fn smartcare_client_refreshes_token_on_401_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "AccessToken": "tok-1" })))
        .expect(2)
        .mount(&server)
        .await;
    // The first query attempt is rejected, forcing a token refresh.
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "history": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartCareClient::new(smartcare_config(&server)).expect("client builds");
    let history = client
        .query_history("8111992172", "2025-07-15 00:00", "2025-07-15 23:55")
        .await
        .expect("retry succeeds");
    assert!(history.history.is_empty());
}
