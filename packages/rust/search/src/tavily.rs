//! Tavily search API binding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compintel_shared::{CompintelError, Result, SearchHit, SearchProvider};

use crate::build_client;

/// Search provider backed by Tavily's `/search` endpoint.
pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            max_results: limit,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| CompintelError::Network(format!("tavily search: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompintelError::Network(format!(
                "tavily search: HTTP {status}: {body}"
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| CompintelError::parse(format!("tavily search response: {e}")))?;

        Ok(parsed
            .results
            .into_iter()
            .take(limit)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                description: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "api_key": "tv-key",
                "query": "Acme vs competitors",
                "max_results": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "Acme vs competitors",
                "results": [
                    {"title": "Widgetco", "url": "https://widgetco.test", "content": "Widgets for enterprises", "score": 0.9},
                    {"title": "Gadgetly", "url": "https://gadgetly.test", "content": "Gadgets", "score": 0.7}
                ]
            })))
            .mount(&server)
            .await;

        let search =
            TavilySearch::new("tv-key".into(), &server.uri(), Duration::from_secs(5)).unwrap();
        let hits = search.search("Acme vs competitors", 3).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].description, "Widgets for enterprises");
        assert_eq!(hits[1].url, "https://gadgetly.test");
    }

    #[tokio::test]
    async fn search_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let search =
            TavilySearch::new("wrong".into(), &server.uri(), Duration::from_secs(5)).unwrap();
        let err = search.search("Acme", 5).await.unwrap_err();
        assert!(matches!(err, CompintelError::Network(_)));
    }
}
