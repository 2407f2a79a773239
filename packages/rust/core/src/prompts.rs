//! Prompt builders and the JSON-in-text response boundary.
//!
//! Every reasoning-engine response passes through [`parse_json`] and one of
//! the typed parsers below. Required fields are checked here, once, and the
//! loosely typed analysis payload is mapped into the explicit optional
//! fields of [`CompetitorAnalysis`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use compintel_shared::{
    CompanyProfile, CompetitorAnalysis, CompetitorCandidate, CompetitorRawData, CompintelError,
    ConsolidationRisk, GrowthTrend, MarketOverview, PricingTier, Recommendation, Report, Result,
    SearchHit, Stage, ThreatLevel,
};

use crate::scoring::{coerce_score, normalize_recommendations};

/// Parsed result of the synthesis step.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub competitors: Vec<CompetitorAnalysis>,
    pub market_intelligence: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_overview: Option<MarketOverview>,
}

// ---------------------------------------------------------------------------
// Prompt builders
// ---------------------------------------------------------------------------

pub fn extraction_prompt(content: &str) -> String {
    format!(
        r#"Analyze this company website content and return ONLY valid JSON (no markdown):
{{
  "name": "company name",
  "product": "what they do in 1-2 sentences",
  "industry": "industry/category",
  "keywords": ["keyword1", "keyword2", "keyword3"],
  "targetMarket": "who they sell to"
}}

Website content:
{content}"#
    )
}

pub fn ranking_prompt(profile: &CompanyProfile, hits: &[SearchHit], max: usize) -> String {
    let results = serde_json::to_string_pretty(hits).unwrap_or_else(|_| "[]".into());
    format!(
        r#"Given this company: {name} - {product}

Here are search results for competitors:
{results}

Return ONLY a valid JSON array of the top {max} most relevant COMPETITORS. Each entry: {{"name": "...", "url": "..."}}
Exclude {name} itself and any non-competitor URLs (review sites like G2/Capterra, aggregators, blogs, news articles)."#,
        name = profile.name,
        product = profile.product,
    )
}

pub fn analysis_prompt(profile: &CompanyProfile, raw: &[CompetitorRawData]) -> String {
    let data = serde_json::to_string_pretty(raw).unwrap_or_else(|_| "[]".into());
    format!(
        r#"You are a competitive intelligence analyst. Analyze these competitors against {name} ({product}).

For each competitor, provide detailed analysis. Return ONLY valid JSON:
{{
  "competitors": [
    {{
      "name": "...",
      "url": "...",
      "summary": "what they do",
      "pricing": "pricing breakdown",
      "recentMoves": "recent activity from blog/news",
      "hiringSignals": "notable job postings and what they signal",
      "keyDifferentiator": "what makes them a threat",
      "threatLevel": "high|medium|low",
      "threatScore": 0-100,
      "featureOverlap": 0-100,
      "marketPresence": 0-100,
      "pricingTier": {{"low": 0, "high": 0, "model": "per seat|flat|usage|freemium"}},
      "fundingStage": "seed|series A|...|public|unknown",
      "estimatedEmployees": "e.g. 50-100",
      "strengths": ["..."],
      "weaknesses": ["..."]
    }}
  ],
  "marketIntelligence": ["insight1", "insight2", "insight3"],
  "recommendations": [
    {{"action": "actionable recommendation", "priority": "high|medium|low", "impact": "expected effect"}}
  ],
  "marketOverview": {{
    "totalAddressableMarket": "estimate with units",
    "growthTrend": "growing|stable|declining",
    "consolidationRisk": "high|medium|low"
  }}
}}

Only analyze the competitors listed below, using their exact names.

Competitor data:
{data}"#,
        name = profile.name,
        product = profile.product,
    )
}

pub fn analysis_system_prompt() -> &'static str {
    "You are an expert competitive intelligence analyst. Be specific and actionable. \
     Base analysis only on the provided data."
}

/// System instruction for answering questions about a stored report.
pub fn chat_system_prompt(report: &Report) -> String {
    let context = serde_json::json!({
        "company": report.company_name,
        "summary": report.company_summary,
        "competitors": report.competitors,
        "marketIntelligence": report.market_intelligence,
        "recommendations": report.recommendations,
        "marketOverview": report.market_overview,
    });
    let context = serde_json::to_string_pretty(&context).unwrap_or_default();
    format!(
        "You are a competitive intelligence analyst. You have this report:\n{context}\n\n\
         Answer questions about the competitors, market, and recommendations. \
         Be concise and specific. Use data from the report."
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string (e.g. `json`) up to the first newline.
        s = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse a JSON response, tolerating code fences and surrounding prose.
pub fn parse_json<T: DeserializeOwned>(stage: Stage, text: &str) -> Result<T> {
    let body = strip_code_fences(text);
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first) => {
            // Models sometimes wrap the JSON in a sentence; try the outermost span.
            let span = json_span(body).ok_or_else(|| {
                CompintelError::malformed(stage, format!("no JSON found: {first}"))
            })?;
            serde_json::from_str(span)
                .map_err(|e| CompintelError::malformed(stage, format!("invalid JSON: {e}")))
        }
    }
}

fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    }
}

fn opt_str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    Some(str_field(obj, key)).filter(|s| !s.is_empty())
}

fn list_field(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Parse the extraction response into a profile with a name and product.
pub fn parse_profile(text: &str) -> Result<CompanyProfile> {
    let value: Value = parse_json(Stage::Extract, text)?;
    let obj = value
        .as_object()
        .ok_or_else(|| CompintelError::malformed(Stage::Extract, "expected a JSON object"))?;

    let name = str_field(obj, "name");
    let product = str_field(obj, "product");
    if name.is_empty() {
        return Err(CompintelError::malformed(Stage::Extract, "missing company name"));
    }
    if product.is_empty() {
        return Err(CompintelError::malformed(Stage::Extract, "missing product description"));
    }

    Ok(CompanyProfile {
        name,
        product,
        industry: str_field(obj, "industry"),
        keywords: list_field(obj, "keywords"),
        target_market: str_field(obj, "targetMarket"),
    })
}

/// Parse the ranking response into candidates; every entry needs a name and URL.
pub fn parse_candidates(text: &str) -> Result<Vec<CompetitorCandidate>> {
    let value: Value = parse_json(Stage::Rank, text)?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("competitors")
            .and_then(Value::as_array)
            .ok_or_else(|| CompintelError::malformed(Stage::Rank, "expected a JSON array"))?,
        _ => return Err(CompintelError::malformed(Stage::Rank, "expected a JSON array")),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item.as_object().ok_or_else(|| {
                CompintelError::malformed(Stage::Rank, format!("entry {i} is not an object"))
            })?;
            let name = str_field(obj, "name");
            let url = str_field(obj, "url");
            if name.is_empty() || url.is_empty() {
                return Err(CompintelError::malformed(
                    Stage::Rank,
                    format!("entry {i} is missing name or url"),
                ));
            }
            Ok(CompetitorCandidate { name, url })
        })
        .collect()
}

fn parse_competitor(i: usize, item: &Value) -> Result<CompetitorAnalysis> {
    let obj = item.as_object().ok_or_else(|| {
        CompintelError::malformed(Stage::Analyze, format!("competitor {i} is not an object"))
    })?;
    let name = str_field(obj, "name");
    if name.is_empty() {
        return Err(CompintelError::malformed(
            Stage::Analyze,
            format!("competitor {i} is missing a name"),
        ));
    }

    let pricing_tier = obj.get("pricingTier").and_then(Value::as_object).and_then(|t| {
        let low = number(t.get("low"));
        let high = number(t.get("high"));
        (low.is_some() || high.is_some()).then(|| {
            let low = low.or(high).unwrap_or_default();
            PricingTier {
                low,
                high: high.unwrap_or(low),
                model: str_field(t, "model"),
            }
        })
    });

    Ok(CompetitorAnalysis {
        name,
        url: str_field(obj, "url"),
        summary: str_field(obj, "summary"),
        pricing: str_field(obj, "pricing"),
        recent_moves: str_field(obj, "recentMoves"),
        hiring_signals: str_field(obj, "hiringSignals"),
        key_differentiator: str_field(obj, "keyDifferentiator"),
        threat_level: ThreatLevel::parse_lenient(&str_field(obj, "threatLevel")),
        threat_score: obj.get("threatScore").and_then(coerce_score),
        feature_overlap: obj.get("featureOverlap").and_then(coerce_score),
        market_presence: obj.get("marketPresence").and_then(coerce_score),
        pricing_tier,
        funding_stage: opt_str_field(obj, "fundingStage"),
        estimated_employees: opt_str_field(obj, "estimatedEmployees"),
        strengths: list_field(obj, "strengths"),
        weaknesses: list_field(obj, "weaknesses"),
    })
}

/// Parse the synthesis response. The `competitors` key is required.
pub fn parse_analysis(text: &str) -> Result<AnalysisPayload> {
    let value: Value = parse_json(Stage::Analyze, text)?;
    let obj = value
        .as_object()
        .ok_or_else(|| CompintelError::malformed(Stage::Analyze, "expected a JSON object"))?;

    let competitors = obj
        .get("competitors")
        .and_then(Value::as_array)
        .ok_or_else(|| CompintelError::malformed(Stage::Analyze, "missing competitors array"))?
        .iter()
        .enumerate()
        .map(|(i, item)| parse_competitor(i, item))
        .collect::<Result<Vec<_>>>()?;

    let recommendations = obj
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| normalize_recommendations(items))
        .unwrap_or_default();

    let market_overview = obj
        .get("marketOverview")
        .and_then(Value::as_object)
        .map(|o| MarketOverview {
            total_addressable_market: str_field(o, "totalAddressableMarket"),
            growth_trend: GrowthTrend::parse_lenient(&str_field(o, "growthTrend")),
            consolidation_risk: ConsolidationRisk::parse_lenient(&str_field(
                o,
                "consolidationRisk",
            )),
        });

    Ok(AnalysisPayload {
        competitors,
        market_intelligence: list_field(obj, "marketIntelligence"),
        recommendations,
        market_overview,
    })
}
