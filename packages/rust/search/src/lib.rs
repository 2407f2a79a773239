//! Competitor search: query construction, concurrent fan-out and the
//! search API bindings.
//!
//! Each competitor search issues a fixed set of queries derived from the
//! company profile. Queries run concurrently and a failing or slow query
//! degrades to an empty result set instead of failing the whole search.

mod firecrawl;
mod tavily;

use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use compintel_shared::{CompanyProfile, CompintelError, Result, SearchHit, SearchProvider};

pub use firecrawl::FirecrawlSearch;
pub use tavily::TavilySearch;

/// User-Agent string for search API requests.
const USER_AGENT: &str = concat!("CompetitorIntel/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The three competitor-discovery queries for a profile.
pub fn competitor_queries(profile: &CompanyProfile) -> Vec<String> {
    let product_query = if profile.industry.trim().is_empty() {
        format!("{} competitors", profile.product)
    } else {
        format!("{} competitors {}", profile.product, profile.industry)
    };

    vec![
        format!("{} alternatives", profile.name),
        format!("{} vs competitors", profile.name),
        product_query,
    ]
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Run every query concurrently and flatten the results in query order.
///
/// No deduplication happens here; ranking handles duplicates.
#[instrument(skip_all, fields(queries = queries.len(), limit = limit))]
pub async fn search_all(
    provider: &dyn SearchProvider,
    queries: &[String],
    limit: usize,
    timeout: Duration,
) -> Vec<SearchHit> {
    let searches = queries.iter().map(|query| async move {
        match tokio::time::timeout(timeout, provider.search(query, limit)).await {
            Ok(Ok(hits)) => {
                debug!(%query, hits = hits.len(), "search complete");
                hits
            }
            Ok(Err(e)) => {
                warn!(%query, error = %e, "search query failed");
                Vec::new()
            }
            Err(_) => {
                warn!(%query, timeout_secs = timeout.as_secs(), "search query timed out");
                Vec::new()
            }
        }
    });

    let hits: Vec<SearchHit> = join_all(searches).await.into_iter().flatten().collect();
    info!(hits = hits.len(), "competitor search finished");
    hits
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CompintelError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn profile() -> CompanyProfile {
        CompanyProfile {
            name: "Acme".into(),
            product: "Team widget platform".into(),
            industry: "SaaS".into(),
            keywords: vec!["widgets".into()],
            target_market: "SMB".into(),
        }
    }

    #[test]
    fn queries_follow_profile() {
        assert_eq!(
            competitor_queries(&profile()),
            vec![
                "Acme alternatives".to_string(),
                "Acme vs competitors".to_string(),
                "Team widget platform competitors SaaS".to_string(),
            ]
        );
    }

    #[test]
    fn queries_without_industry() {
        let mut p = profile();
        p.industry = String::new();
        assert_eq!(competitor_queries(&p)[2], "Team widget platform competitors");
    }

    struct ScriptedSearch;

    #[async_trait]
    impl SearchProvider for ScriptedSearch {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
            if query.contains("vs") {
                return Err(CompintelError::Network("boom".into()));
            }
            if query.contains("SaaS") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok((0..limit)
                .map(|i| SearchHit {
                    title: format!("{query} #{i}"),
                    url: format!("https://hit{i}.test"),
                    description: String::new(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn search_all_degrades_failures_to_empty() {
        let queries = competitor_queries(&profile());
        let hits = search_all(&ScriptedSearch, &queries, 2, Duration::from_millis(50)).await;

        // Only the first query succeeds; the failing and the slow one yield nothing.
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.title.starts_with("Acme alternatives")));
    }
}
