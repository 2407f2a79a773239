//! Shared types, error model, and configuration for Competitor Intel.
//!
//! This crate is the foundation depended on by all other compintel crates.
//! It provides:
//! - [`CompintelError`], the unified error type
//! - Domain types ([`Report`], [`CompetitorAnalysis`], [`ReportId`], ...)
//! - Collaborator traits ([`ContentFetcher`], [`ReasoningEngine`], ...)
//! - Progress events ([`ProgressEvent`], [`ProgressSink`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod progress;
pub mod services;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DocumentsConfig, EmailConfig, OpenRouterConfig, ScrapeBackend,
    ScrapingConfig, SearchBackend, SearchConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, resolve_api_key, validate_api_key,
};
pub use error::{CompintelError, Result};
pub use progress::{ChannelProgress, EventKind, ProgressEvent, ProgressSink, SilentProgress};
pub use services::{
    ContentFetcher, DocumentParser, EmailAttachment, EmailMessage, NoopDocumentParser, Notifier,
    ReasoningEngine, ReportStore, SearchProvider,
};
pub use types::{
    CompanyProfile, CompetitorAnalysis, CompetitorCandidate, CompetitorRawData,
    ConsolidationRisk, FetchedContent, GrowthTrend, MarketOverview, PricingTier, Priority,
    Recommendation, Report, ReportId, ReportSummary, SearchHit, Stage, ThreatLevel,
};
