use crate::errors::PipelineError;
use crate::providers::db::{ComplaintDatabase, Row};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::fmt::{self, Debug};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct ClickHouseResponse {
    #[serde(default)]
    data: Vec<Row>,
}

/// A provider for ClickHouse over its HTTP interface.
#[derive(Clone)]
pub struct ClickHouseProvider {
    client: ReqwestClient,
    base_url: String,
    user: String,
    password: String,
    database: Option<String>,
}

impl ClickHouseProvider {
    pub fn new(
        base_url: String,
        user: String,
        password: String,
        database: Option<String>,
    ) -> Result<Self, PipelineError> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(PipelineError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            base_url,
            user,
            password,
            database,
        })
    }
}

impl Debug for ClickHouseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseProvider")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ComplaintDatabase for ClickHouseProvider {
    fn name(&self) -> &str {
        "ClickHouse"
    }

    async fn execute_query(&self, sql: &str) -> Result<Vec<Row>, PipelineError> {
        debug!("executing query: {sql}");

        let mut params = vec![("default_format", "JSON")];
        if let Some(database) = &self.database {
            params.push(("database", database.as_str()));
        }

        let response = self
            .client
            .post(&self.base_url)
            .query(&params)
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(sql.to_string())
            .send()
            .await
            .map_err(|e| PipelineError::StorageConnection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::StorageQueryFailed(format!(
                "{status}: {error_text}"
            )));
        }

        let body: ClickHouseResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::StorageQueryFailed(e.to_string()))?;

        debug!("query returned {} row(s)", body.data.len());
        Ok(body.data)
    }
}
