//! Web content fetchers and the PDF document parser.
//!
//! This crate provides:
//! - [`HttpFetcher`]: direct HTTP GET with HTML → Markdown conversion
//! - [`FirecrawlFetcher`]: the Firecrawl scrape API
//! - [`CommandDocumentParser`]: PDF text through an external parser command
//! - [`guard`]: target URL parsing and SSRF protection

pub mod document;
pub mod firecrawl;
pub mod guard;
pub mod http;

pub use document::CommandDocumentParser;
pub use firecrawl::FirecrawlFetcher;
pub use guard::{is_private_ip, is_ssrf_target, parse_target_url};
pub use http::{HttpFetcher, USER_AGENT};
