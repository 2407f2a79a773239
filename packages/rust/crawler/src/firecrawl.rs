//! Firecrawl scrape API content fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use compintel_shared::{CompintelError, ContentFetcher, FetchedContent, Result};

use crate::http::USER_AGENT;

/// Content fetcher backed by Firecrawl's `/v1/scrape` endpoint.
pub struct FirecrawlFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    only_main_content: bool,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<ScrapeMetadata>,
}

#[derive(Debug, Deserialize)]
struct ScrapeMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "sourceURL", alias = "sourceUrl")]
    source_url: Option<String>,
}

impl FirecrawlFetcher {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CompintelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let request = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: true,
        };

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompintelError::Network(format!("firecrawl scrape {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompintelError::Network(format!(
                "firecrawl scrape {url}: HTTP {status}: {body}"
            )));
        }

        let parsed: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| CompintelError::parse(format!("firecrawl scrape response: {e}")))?;

        if !parsed.success {
            return Err(CompintelError::Scrape(format!(
                "firecrawl scrape {url}: {}",
                parsed.error.unwrap_or_else(|| "unsuccessful".into())
            )));
        }

        let data = parsed
            .data
            .ok_or_else(|| CompintelError::Scrape(format!("firecrawl scrape {url}: no data")))?;
        let metadata = data.metadata;

        let text = data.markdown.unwrap_or_default();
        debug!(bytes = text.len(), "firecrawl page fetched");

        Ok(FetchedContent {
            url: metadata
                .as_ref()
                .and_then(|m| m.source_url.clone())
                .unwrap_or_else(|| url.to_string()),
            text,
            title: metadata.and_then(|m| m.title),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn scrape_returns_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .and(header("authorization", "Bearer fc-test"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://acme.test",
                "formats": ["markdown"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "markdown": "# Acme\n\nWidgets for teams.",
                    "metadata": { "title": "Acme", "sourceURL": "https://acme.test" }
                }
            })))
            .mount(&server)
            .await;

        let fetcher =
            FirecrawlFetcher::new("fc-test".into(), &server.uri(), Duration::from_secs(5)).unwrap();
        let content = fetcher.fetch("https://acme.test").await.unwrap();

        assert_eq!(content.text, "# Acme\n\nWidgets for teams.");
        assert_eq!(content.title.as_deref(), Some("Acme"));
        assert_eq!(content.url, "https://acme.test");
    }

    #[tokio::test]
    async fn scrape_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "blocked by robots"
            })))
            .mount(&server)
            .await;

        let fetcher =
            FirecrawlFetcher::new("fc-test".into(), &server.uri(), Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch("https://acme.test").await.unwrap_err();
        assert!(err.to_string().contains("blocked by robots"));
    }

    #[tokio::test]
    async fn scrape_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(402).set_body_string("payment required"))
            .mount(&server)
            .await;

        let fetcher =
            FirecrawlFetcher::new("fc-test".into(), &server.uri(), Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch("https://acme.test").await.unwrap_err();
        assert!(matches!(err, CompintelError::Network(_)));
    }
}
