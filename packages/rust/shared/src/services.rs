//! Collaborator traits consumed by the pipeline.
//!
//! Every external system the pipeline talks to sits behind one of these
//! traits. Concrete bindings live in the crawler, search, storage and core
//! crates; tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{FetchedContent, Report, ReportId, ReportSummary, SearchHit};

/// Fetches the text content of a single web page.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

/// Runs a free-text web search.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Extracts text from a PDF document.
///
/// Parsing is best-effort: any failure yields `None`.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse_pdf(&self, url: &str) -> Option<String>;
}

/// Document parser that never returns content.
pub struct NoopDocumentParser;

#[async_trait]
impl DocumentParser for NoopDocumentParser {
    async fn parse_pdf(&self, _url: &str) -> Option<String> {
        None
    }
}

/// A language model that completes a prompt with free-form text.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String>;
}

/// Persists and retrieves finished reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &Report) -> Result<ReportId>;

    /// Record that the report was emailed. Idempotent.
    async fn mark_sent(&self, id: &ReportId, email: &str) -> Result<()>;

    async fn get(&self, id: &ReportId) -> Result<Option<Report>>;

    /// Newest first.
    async fn list(&self, limit: usize) -> Result<Vec<ReportSummary>>;

    /// Returns the number of deleted reports.
    async fn delete_all(&self) -> Result<u64>;
}

/// A file attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

/// Sends email.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}
