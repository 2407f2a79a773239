//! Firecrawl search API binding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use compintel_shared::{CompintelError, Result, SearchHit, SearchProvider};

use crate::build_client;

/// Search provider backed by Firecrawl's `/v1/search` endpoint.
pub struct FirecrawlSearch {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FirecrawlHit {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl FirecrawlSearch {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Results come back either as `data: [...]` or `data: { web: [...] }`.
fn hits_from_data(data: Value) -> Vec<SearchHit> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("web") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<FirecrawlHit>(item).ok())
        .filter(|hit| !hit.url.is_empty())
        .map(|hit| SearchHit {
            title: hit.title.unwrap_or_default(),
            url: hit.url,
            description: hit.description.unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl SearchProvider for FirecrawlSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(format!("{}/v1/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SearchRequest { query, limit })
            .send()
            .await
            .map_err(|e| CompintelError::Network(format!("firecrawl search: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompintelError::Network(format!(
                "firecrawl search: HTTP {status}: {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CompintelError::parse(format!("firecrawl search response: {e}")))?;

        if !parsed.success {
            return Err(CompintelError::Network(format!(
                "firecrawl search: {}",
                parsed.error.unwrap_or_else(|| "unsuccessful".into())
            )));
        }

        let mut hits = hits_from_data(parsed.data);
        hits.truncate(limit);
        Ok(hits)
    }
}
