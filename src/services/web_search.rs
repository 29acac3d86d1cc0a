//! Web search client used to curate learning resources.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WebSearchError;
use crate::models::WebSearchConfig;

/// Looks up result URLs for a query.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, WebSearchError>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
}

/// Client for the Tavily search API.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TavilyClient {
    /// Build a client, or `None` when no API key is configured.
    pub fn from_config(config: &WebSearchConfig) -> Result<Option<Self>, WebSearchError> {
        let Some(api_key) = config.api_key() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }))
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, WebSearchError> {
        let url = format!("{}/search", self.base_url);
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WebSearchError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| WebSearchError::InvalidResponse(e.to_string()))?;

        tracing::debug!(query, results = parsed.results.len(), "web search completed");
        Ok(parsed.results.into_iter().map(|r| r.url).collect())
    }
}
