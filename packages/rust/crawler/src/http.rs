//! Direct HTTP content fetcher.
//!
//! Fetches a page with reqwest and converts HTML bodies to Markdown via
//! `compintel-markdown`. Plain-text and Markdown bodies pass through.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use compintel_markdown::{ConvertOptions, convert};
use compintel_shared::{CompintelError, ContentFetcher, FetchedContent, Result};

use crate::guard::{is_ssrf_target, parse_target_url};

/// User-Agent string for fetch requests.
pub const USER_AGENT: &str = concat!("CompetitorIntel/", env!("CARGO_PKG_VERSION"));

/// Content fetcher that performs a plain GET per page.
pub struct HttpFetcher {
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_private_hosts: bool,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| CompintelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_private_hosts: false,
        })
    }

    /// Allow fetching localhost and private-network hosts.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let target = parse_target_url(url)?;

        if !self.allow_private_hosts && is_ssrf_target(&target) {
            warn!(%target, "SSRF protection: blocked");
            return Err(CompintelError::validation(format!(
                "refusing to fetch private or non-HTTP target {target}"
            )));
        }

        let response = self
            .client
            .get(target.as_str())
            .send()
            .await
            .map_err(|e| CompintelError::Network(format!("{target}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompintelError::Network(format!("{target}: HTTP {status}")));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        if !is_text_content(&content_type) {
            return Err(CompintelError::Scrape(format!(
                "{target}: unsupported content type {content_type}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CompintelError::Network(format!("{target}: body read failed: {e}")))?;

        debug!(%final_url, bytes = body.len(), %content_type, "page fetched");

        if content_type.contains("html") {
            let converted = convert(
                &body,
                &ConvertOptions {
                    source_url: final_url.clone(),
                },
            )?;
            return Ok(FetchedContent {
                url: final_url,
                text: converted.markdown,
                title: converted.title,
            });
        }

        Ok(FetchedContent {
            url: final_url,
            text: body,
            title: None,
        })
    }
}

fn is_text_content(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("markdown")
        || content_type.contains("xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5))
            .unwrap()
            .allow_private_hosts(true)
    }

    #[tokio::test]
    async fn fetch_converts_html() {
        let server = MockServer::start().await;
        let page = r#"<html><head><title>Acme Pricing</title></head><body>
            <nav><a href="/">Home</a></nav>
            <main><h1>Pricing</h1><p>Pro plan is $49 per month.</p></main>
        </body></html>"#;

        Mock::given(method("GET"))
            .and(path("/pricing"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(page, "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let content = fetcher()
            .fetch(&format!("{}/pricing", server.uri()))
            .await
            .unwrap();

        assert!(content.text.contains("Pro plan is $49 per month."));
        assert!(!content.text.contains("<main>"));
        assert_eq!(content.title.as_deref(), Some("Acme Pricing"));
        assert!(content.url.ends_with("/pricing"));
    }

    #[tokio::test]
    async fn fetch_passes_plain_text_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("# Acme\n\n<b>raw</b>"),
            )
            .mount(&server)
            .await;

        let content = fetcher()
            .fetch(&format!("{}/about", server.uri()))
            .await
            .unwrap();
        assert_eq!(content.text, "# Acme\n\n<b>raw</b>");
        assert_eq!(content.title, None);
    }

    #[tokio::test]
    async fn fetch_reports_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/careers"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/careers", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CompintelError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_rejects_binary_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deck.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.7".to_vec()),
            )
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/deck.pdf", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CompintelError::Scrape(_)));
    }

    #[tokio::test]
    async fn fetch_blocks_private_hosts_by_default() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, CompintelError::Validation { .. }));
    }
}
