//! Core domain types for competitor reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One discrete step of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scrape,
    Extract,
    Search,
    Rank,
    DeepScrape,
    Analyze,
    Persist,
    Notify,
}

impl Stage {
    /// Stable identifier used in logs and progress events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Extract => "extract",
            Self::Search => "search",
            Self::Rank => "rank",
            Self::DeepScrape => "deep_scrape",
            Self::Analyze => "analyze",
            Self::Persist => "persist",
            Self::Notify => "notify",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReportId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for report identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl ReportId {
    /// Generate a new time-sortable report identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Enumerations with lenient parsing
// ---------------------------------------------------------------------------

/// How competitively dangerous a competitor is.
///
/// Unrecognized values deserialize to [`ThreatLevel::Low`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ThreatLevel {
    High,
    Medium,
    #[default]
    Low,
}

impl ThreatLevel {
    /// Parse a model-provided string, defaulting to `Low`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Display precedence: high threats first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    /// Score used when the model gave a level but no numeric score.
    pub fn default_score(&self) -> u8 {
        match self {
            Self::High => 80,
            Self::Medium => 50,
            Self::Low => 20,
        }
    }
}

impl From<String> for ThreatLevel {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

/// Priority of a recommendation. Unrecognized values become `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

/// Market growth direction. Unrecognized values become `Stable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum GrowthTrend {
    Growing,
    #[default]
    Stable,
    Declining,
}

impl GrowthTrend {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "growing" => Self::Growing,
            "declining" => Self::Declining,
            _ => Self::Stable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Growing => "growing",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

impl From<String> for GrowthTrend {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

/// Risk that the market consolidates. Unrecognized values become `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ConsolidationRisk {
    High,
    #[default]
    Medium,
    Low,
}

impl ConsolidationRisk {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl From<String> for ConsolidationRisk {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

// ---------------------------------------------------------------------------
// Pipeline entities
// ---------------------------------------------------------------------------

/// Structured facts about the company being analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    /// What the company does, in one or two sentences.
    pub product: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub target_market: String,
}

/// A competitor chosen by the ranking stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorCandidate {
    pub name: String,
    pub url: String,
}

/// Raw text scraped for one competitor. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorRawData {
    pub name: String,
    pub url: String,
    pub homepage: String,
    pub pricing: String,
    pub about: String,
    pub careers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_content: Option<String>,
}

/// Price range and billing model reported for a competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub model: String,
}

/// Analysis of a single competitor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorAnalysis {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub pricing: String,
    #[serde(default)]
    pub recent_moves: String,
    #[serde(default)]
    pub hiring_signals: String,
    #[serde(default)]
    pub key_differentiator: String,
    #[serde(default)]
    pub threat_level: ThreatLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_overlap: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_presence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_tier: Option<PricingTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_employees: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weaknesses: Vec<String>,
}

impl CompetitorAnalysis {
    /// The explicit threat score, else the default for the threat level.
    pub fn effective_threat_score(&self) -> u8 {
        self.threat_score
            .unwrap_or_else(|| self.threat_level.default_score())
    }
}

/// An actionable recommendation with a priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub impact: String,
}

/// Market-level view produced alongside the competitor analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    #[serde(default)]
    pub total_addressable_market: String,
    #[serde(default)]
    pub growth_trend: GrowthTrend,
    #[serde(default)]
    pub consolidation_risk: ConsolidationRisk,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A finished competitive-intelligence report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub source_url: String,
    pub company_name: String,
    pub company_summary: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub competitors: Vec<CompetitorAnalysis>,
    #[serde(default)]
    pub market_intelligence: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_overview: Option<MarketOverview>,
    #[serde(default)]
    pub report_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
}

impl Report {
    /// Competitors ordered high, medium, low; ties keep their original order.
    pub fn competitors_by_threat(&self) -> Vec<&CompetitorAnalysis> {
        let mut sorted: Vec<&CompetitorAnalysis> = self.competitors.iter().collect();
        sorted.sort_by_key(|c| c.threat_level.rank());
        sorted
    }

    /// The first high-threat competitor, else the first competitor.
    pub fn top_threat(&self) -> Option<&CompetitorAnalysis> {
        self.competitors
            .iter()
            .find(|c| c.threat_level == ThreatLevel::High)
            .or_else(|| self.competitors.first())
    }
}

/// One row of the report history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: ReportId,
    pub company_name: String,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub competitor_count: usize,
    pub report_sent: bool,
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id.clone(),
            company_name: report.company_name.clone(),
            source_url: report.source_url.clone(),
            created_at: report.created_at,
            competitor_count: report.competitors.len(),
            report_sent: report.report_sent,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// A single search result snippet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Text content fetched for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchedContent {
    pub url: String,
    /// Markdown or plain text.
    pub text: String,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_id_roundtrip() {
        let id = ReportId::new();
        let s = id.to_string();
        let parsed: ReportId = s.parse().expect("parse ReportId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn threat_level_lenient() {
        assert_eq!(ThreatLevel::parse_lenient("HIGH"), ThreatLevel::High);
        assert_eq!(ThreatLevel::parse_lenient(" medium "), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::parse_lenient("extreme"), ThreatLevel::Low);
        assert_eq!(ThreatLevel::parse_lenient("critical"), ThreatLevel::Low);
        assert_eq!(ThreatLevel::parse_lenient("moderate"), ThreatLevel::Low);
        assert_eq!(ThreatLevel::parse_lenient(""), ThreatLevel::Low);

        let level: ThreatLevel = serde_json::from_str(r#""apocalyptic""#).unwrap();
        assert_eq!(level, ThreatLevel::Low);
        assert_eq!(serde_json::to_string(&ThreatLevel::High).unwrap(), r#""high""#);
    }

    #[test]
    fn priority_defaults_to_medium() {
        let p: Priority = serde_json::from_str(r#""urgent""#).unwrap();
        assert_eq!(p, Priority::Medium);

        let rec: Recommendation = serde_json::from_str(r#"{"action":"Ship it"}"#).unwrap();
        assert_eq!(rec.priority, Priority::Medium);
        assert_eq!(rec.impact, "");
    }

    #[test]
    fn market_overview_defaults() {
        let overview: MarketOverview = serde_json::from_str(
            r#"{"totalAddressableMarket":"$4B","growthTrend":"exploding","consolidationRisk":"nope"}"#,
        )
        .unwrap();
        assert_eq!(overview.growth_trend, GrowthTrend::Stable);
        assert_eq!(overview.consolidation_risk, ConsolidationRisk::Medium);
    }

    #[test]
    fn competitor_analysis_uses_camel_case() {
        let analysis = CompetitorAnalysis {
            name: "Widgetco".into(),
            url: "https://widgetco.com".into(),
            key_differentiator: "Cheaper".into(),
            threat_level: ThreatLevel::Medium,
            threat_score: Some(55),
            ..Default::default()
        };
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["keyDifferentiator"], "Cheaper");
        assert_eq!(json["threatLevel"], "medium");
        assert_eq!(json["threatScore"], 55);
        assert!(json.get("strengths").is_none());
    }

    #[test]
    fn effective_threat_score_falls_back_to_level() {
        let mut analysis = CompetitorAnalysis {
            threat_level: ThreatLevel::Medium,
            ..Default::default()
        };
        assert_eq!(analysis.effective_threat_score(), 50);
        analysis.threat_score = Some(67);
        assert_eq!(analysis.effective_threat_score(), 67);
    }

    fn report_with(competitors: &[(&str, &str)]) -> Report {
        Report {
            id: ReportId::new(),
            source_url: "https://acme.test".into(),
            company_name: "Acme".into(),
            company_summary: "Widgets".into(),
            created_at: Utc::now(),
            competitors: competitors
                .iter()
                .map(|(name, level)| CompetitorAnalysis {
                    name: name.to_string(),
                    threat_level: ThreatLevel::parse_lenient(level),
                    ..Default::default()
                })
                .collect(),
            market_intelligence: vec![],
            recommendations: vec![],
            market_overview: None,
            report_sent: false,
            recipient_email: None,
        }
    }

    fn names<'a>(competitors: &[&'a CompetitorAnalysis]) -> Vec<&'a str> {
        competitors.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn threat_sort_is_stable() {
        let report = report_with(&[("a", "low"), ("b", "high"), ("c", "medium"), ("d", "high")]);
        assert_eq!(names(&report.competitors_by_threat()), ["b", "d", "c", "a"]);
    }

    #[test]
    fn unknown_threat_strings_sort_last() {
        let report = report_with(&[("a", "critical"), ("b", "low"), ("c", "medium")]);
        assert_eq!(names(&report.competitors_by_threat()), ["c", "a", "b"]);
        assert_eq!(report.competitors[0].threat_level, ThreatLevel::Low);
    }

    #[test]
    fn top_threat_prefers_first_high() {
        let report = report_with(&[("a", "medium"), ("b", "high"), ("c", "high")]);
        assert_eq!(report.top_threat().unwrap().name, "b");

        let calm = report_with(&[("x", "low"), ("y", "medium")]);
        assert_eq!(calm.top_threat().unwrap().name, "x");
        assert!(report_with(&[]).top_threat().is_none());
    }

    #[test]
    fn report_serialization_roundtrip() {
        let report = Report {
            id: ReportId::new(),
            source_url: "https://acme.test".into(),
            company_name: "Acme".into(),
            company_summary: "Widgets".into(),
            created_at: Utc::now(),
            competitors: vec![CompetitorAnalysis {
                name: "Widgetco".into(),
                url: "https://widgetco.com".into(),
                threat_level: ThreatLevel::High,
                ..Default::default()
            }],
            market_intelligence: vec!["Prices are falling".into()],
            recommendations: vec![Recommendation {
                action: "Cut prices".into(),
                priority: Priority::High,
                impact: "Retain SMB accounts".into(),
            }],
            market_overview: Some(MarketOverview {
                total_addressable_market: "$2B".into(),
                growth_trend: GrowthTrend::Growing,
                consolidation_risk: ConsolidationRisk::Low,
            }),
            report_sent: false,
            recipient_email: None,
        };

        let json = serde_json::to_string(&report).expect("serialize");
        let parsed: Report = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, report);
    }
}
