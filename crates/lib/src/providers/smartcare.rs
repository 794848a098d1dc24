//! # SmartCare API Client
//!
//! Client for the live per-MSISDN history API, with app-key/secret token
//! management. Tokens are cached and refreshed five minutes before expiry;
//! a 401 forces one refresh-and-retry, and a timeout is retried once.
//! The API is treated as flaky: callers degrade every failure to a
//! user-facing maintenance message.

use crate::errors::PipelineError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dyn_clone::DynClone;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::fmt::{self, Debug};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One hourly history sample. Numeric fields arrive as strings or numbers
/// depending on the backend version, so deserialization is tolerant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "TOTALTRAFFIC", default, deserialize_with = "flexible_f64")]
    pub total_traffic: f64,
    #[serde(rename = "TOTALSCORE", default, deserialize_with = "flexible_f64")]
    pub total_score: f64,
    #[serde(
        rename = "TOTALINTERNALLATENCYCCH",
        default,
        deserialize_with = "flexible_f64"
    )]
    pub latency: f64,
    #[serde(rename = "TEXT", default)]
    pub text: String,
    #[serde(rename = "UTC", default)]
    pub utc: Option<String>,
}

fn flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// The history payload for one MSISDN and time window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserHistory {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// A trait for the live telecom lookup API.
///
/// `msisdn` is the API-form `8…` number (country code stripped); timestamps
/// use the `YYYY-MM-DD HH:MM` format.
#[async_trait]
pub trait SmartCareApi: Send + Sync + Debug + DynClone {
    async fn query_history(
        &self,
        msisdn: &str,
        start: &str,
        end: &str,
    ) -> Result<UserHistory, PipelineError>;
}

dyn_clone::clone_trait_object!(SmartCareApi);

/// Connection settings for [`SmartCareClient`].
#[derive(Debug, Clone)]
pub struct SmartCareConfig {
    pub token_url: String,
    pub query_url: String,
    pub app_key: String,
    pub app_secret: String,
    /// Opaque request token required by the upstream API.
    pub request_uuid: String,
    pub user_name: String,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "AccessToken")]
    access_token: String,
}

/// The HTTP client for the SmartCare API.
#[derive(Clone)]
pub struct SmartCareClient {
    client: ReqwestClient,
    config: SmartCareConfig,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl SmartCareClient {
    pub fn new(config: SmartCareConfig) -> Result<Self, PipelineError> {
        let client = ReqwestClient::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(PipelineError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            config,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns a valid access token, refreshing five minutes before expiry.
    async fn access_token(&self) -> Result<String, PipelineError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if now < token.expires_at - Duration::minutes(5) {
                return Ok(token.token.clone());
            }
        }

        info!("requesting new SmartCare access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .timeout(std::time::Duration::from_secs(10))
            .json(&json!({
                "app_key": self.config.app_key,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::SmartCareToken(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::SmartCareToken(format!(
                "{status}: {error_text}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::SmartCareToken(e.to_string()))?;

        // Tokens are valid for one hour.
        let token = CachedToken {
            token: body.access_token,
            expires_at: now + Duration::hours(1),
        };
        let access = token.token.clone();
        *cached = Some(token);
        Ok(access)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

impl Debug for SmartCareClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartCareClient")
            .field("query_url", &self.config.query_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SmartCareApi for SmartCareClient {
    async fn query_history(
        &self,
        msisdn: &str,
        start: &str,
        end: &str,
    ) -> Result<UserHistory, PipelineError> {
        const MAX_ATTEMPTS: usize = 2;

        for attempt in 0..MAX_ATTEMPTS {
            let token = self.access_token().await?;

            let payload = json!({
                "numValue": msisdn,
                "startTime": start,
                "endTime": end,
                "sceneComb": 1002,
                "roamComb": 1,
                "uuid": self.config.request_uuid,
                "templateCode": "CCH",
                "language": "en_US",
                "userName": self.config.user_name,
                "granularity": "1h",
                "serviceid": "10010",
            });

            debug!("querying user history for {msisdn} from {start} to {end}");
            let result = self
                .client
                .post(&self.config.query_url)
                .timeout(std::time::Duration::from_secs(30))
                .header("X-APP-Key", &self.config.app_key)
                .bearer_auth(&token)
                .json(&payload)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() && attempt < MAX_ATTEMPTS - 1 => {
                    warn!("SmartCare request timed out, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    continue;
                }
                Err(e) => return Err(PipelineError::SmartCareRequest(e.to_string())),
            };

            if response.status() == reqwest::StatusCode::UNAUTHORIZED && attempt < MAX_ATTEMPTS - 1
            {
                warn!("SmartCare token rejected, forcing refresh");
                self.invalidate_token().await;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(PipelineError::SmartCareRequest(format!(
                    "{status}: {error_text}"
                )));
            }

            return response
                .json::<UserHistory>()
                .await
                .map_err(|e| PipelineError::SmartCareRequest(e.to_string()));
        }

        Err(PipelineError::SmartCareRequest(
            "maximum retries exceeded".to_string(),
        ))
    }
}
