//! Report assembly and scoring helpers.
//!
//! Pure functions over the domain types: recommendation normalization,
//! score coercion, candidate filtering, analysis
//! reconciliation and prompt budgeting. Nothing here performs I/O.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use compintel_crawler::parse_target_url;
use compintel_shared::{
    CompanyProfile, CompetitorAnalysis, CompetitorCandidate, CompetitorRawData, Priority,
    Recommendation, Report, ReportId,
};

use crate::prompts::AnalysisPayload;

/// Target page text kept for profile extraction.
pub const TARGET_CHAR_LIMIT: usize = 8000;
/// Per-field caps for competitor raw data.
pub const HOMEPAGE_CHAR_LIMIT: usize = 3000;
pub const PAGE_CHAR_LIMIT: usize = 2000;
pub const PDF_CHAR_LIMIT: usize = 2000;
/// Total raw-data budget for the synthesis prompt.
pub const ANALYSIS_CHAR_BUDGET: usize = 30_000;

/// Hosts that show up in competitor searches but are never competitors.
const NON_COMPETITOR_HOSTS: &[&str] = &[
    "g2.com",
    "capterra.com",
    "trustradius.com",
    "getapp.com",
    "softwareadvice.com",
    "producthunt.com",
    "crunchbase.com",
    "alternativeto.net",
    "saasworthy.com",
    "gartner.com",
    "wikipedia.org",
    "reddit.com",
    "quora.com",
    "medium.com",
    "substack.com",
    "youtube.com",
    "linkedin.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "github.com",
    "techcrunch.com",
    "forbes.com",
    "businessinsider.com",
    "venturebeat.com",
    "news.ycombinator.com",
];

// ---------------------------------------------------------------------------
// Recommendations and scores
// ---------------------------------------------------------------------------

/// Normalize one model-produced recommendation.
///
/// A bare string becomes an action with medium priority and no impact.
/// Objects keep `action` (or `recommendation` / `text`), a lenient
/// `priority` and `impact`.
pub fn normalize_recommendation(value: &Value) -> Recommendation {
    match value {
        Value::String(s) => Recommendation {
            action: s.trim().to_string(),
            priority: Priority::default(),
            impact: String::new(),
        },
        Value::Object(map) => {
            let text = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string()
            };
            let action = ["action", "recommendation", "text"]
                .iter()
                .map(|key| text(*key))
                .find(|s| !s.is_empty())
                .unwrap_or_default();

            Recommendation {
                action,
                priority: Priority::parse_lenient(&text("priority")),
                impact: text("impact"),
            }
        }
        _ => Recommendation {
            action: String::new(),
            priority: Priority::default(),
            impact: String::new(),
        },
    }
}

/// Normalize a list of recommendations, dropping entries without an action.
pub fn normalize_recommendations(values: &[Value]) -> Vec<Recommendation> {
    values
        .iter()
        .map(normalize_recommendation)
        .filter(|r| !r.action.is_empty())
        .collect()
}

/// Coerce a JSON number or numeric string into a 0-100 score.
pub fn coerce_score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// URLs and candidates
// ---------------------------------------------------------------------------

/// Scheme-qualified URL without query, fragment or trailing slash.
pub fn canonical_url(raw: &str) -> Option<String> {
    let url = parse_target_url(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    Some(format!("{}://{host}{port}{path}", url.scheme()))
}

/// Lowercased host with any leading `www.` removed.
pub fn host_key(url: &str) -> Option<String> {
    let parsed = parse_target_url(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn is_non_competitor_host(host: &str) -> bool {
    NON_COMPETITOR_HOSTS
        .iter()
        .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")))
}

/// Enforce the ranking invariants on the model's candidate list.
///
/// Canonicalizes URLs, drops the originating company (by name or host) and
/// non-competitor hosts, dedups by name and by host (first wins) and caps
/// the list at `max`. The model's order is otherwise kept.
pub fn filter_candidates(
    candidates: Vec<CompetitorCandidate>,
    profile: &CompanyProfile,
    origin_url: &str,
    max: usize,
) -> Vec<CompetitorCandidate> {
    let origin_name = profile.name.trim().to_lowercase();
    let origin_host = host_key(origin_url);

    let mut seen_names = HashSet::new();
    let mut seen_hosts = HashSet::new();
    let mut kept = Vec::new();

    for candidate in candidates {
        if kept.len() >= max {
            break;
        }

        let name = candidate.name.trim().to_string();
        let Some(url) = canonical_url(&candidate.url) else {
            debug!(url = %candidate.url, "dropping candidate with unusable URL");
            continue;
        };
        let Some(host) = host_key(&url) else {
            continue;
        };
        let name_key = name.to_lowercase();

        if name.is_empty()
            || name_key == origin_name
            || origin_host.as_deref() == Some(host.as_str())
            || is_non_competitor_host(&host)
        {
            debug!(%name, %host, "dropping excluded candidate");
            continue;
        }
        if !seen_names.insert(name_key) || !seen_hosts.insert(host) {
            debug!(%name, "dropping duplicate candidate");
            continue;
        }

        kept.push(CompetitorCandidate { name, url });
    }

    kept
}

/// Keep only analyses that match a scraped candidate, one per candidate.
///
/// Matching is by case-insensitive name, then by host. The candidate's name
/// and URL replace whatever the model wrote.
pub fn reconcile_analyses(
    candidates: &[CompetitorCandidate],
    analyses: Vec<CompetitorAnalysis>,
) -> Vec<CompetitorAnalysis> {
    let mut used = vec![false; candidates.len()];
    let mut kept = Vec::with_capacity(candidates.len());

    for mut analysis in analyses {
        let name = analysis.name.trim().to_lowercase();
        let host = host_key(&analysis.url);

        let matched = candidates
            .iter()
            .position(|c| c.name.trim().to_lowercase() == name)
            .or_else(|| {
                let host = host.as_deref()?;
                candidates
                    .iter()
                    .position(|c| host_key(&c.url).as_deref() == Some(host))
            });

        match matched {
            Some(i) if !used[i] => {
                used[i] = true;
                analysis.name = candidates[i].name.clone();
                analysis.url = candidates[i].url.clone();
                kept.push(analysis);
            }
            Some(_) => debug!(name = %analysis.name, "dropping duplicate analysis"),
            None => debug!(name = %analysis.name, "dropping analysis for unscraped competitor"),
        }
    }

    kept
}

/// Build the final report from the run's pieces.
pub fn assemble_report(
    source_url: &str,
    profile: &CompanyProfile,
    candidates: &[CompetitorCandidate],
    payload: AnalysisPayload,
) -> Report {
    Report {
        id: ReportId::new(),
        source_url: source_url.to_string(),
        company_name: profile.name.clone(),
        company_summary: profile.product.clone(),
        created_at: Utc::now(),
        competitors: reconcile_analyses(candidates, payload.competitors),
        market_intelligence: payload.market_intelligence,
        recommendations: payload.recommendations,
        market_overview: payload.market_overview,
        report_sent: false,
        recipient_email: None,
    }
}

// ---------------------------------------------------------------------------
// Truncation and budgeting
// ---------------------------------------------------------------------------

/// The first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn raw_len(raw: &CompetitorRawData) -> usize {
    [&raw.homepage, &raw.pricing, &raw.about, &raw.careers]
        .iter()
        .map(|s| s.chars().count())
        .sum::<usize>()
        + raw.pdf_content.as_deref().map_or(0, |s| s.chars().count())
}

fn shrink(field: &mut String, num: usize, den: usize) {
    let len = field.chars().count();
    let keep = len * num / den.max(1);
    if keep < len {
        *field = truncate_chars(field, keep).to_string();
    }
}

/// Apply per-field caps, then shrink candidates over their share of `total`.
///
/// Every candidate keeps an equal share of the budget; a candidate over its
/// share has each field cut proportionally. No candidate is ever dropped.
pub fn budget_raw_data(mut raw: Vec<CompetitorRawData>, total: usize) -> Vec<CompetitorRawData> {
    for r in &mut raw {
        r.homepage = truncate_chars(&r.homepage, HOMEPAGE_CHAR_LIMIT).to_string();
        r.pricing = truncate_chars(&r.pricing, PAGE_CHAR_LIMIT).to_string();
        r.about = truncate_chars(&r.about, PAGE_CHAR_LIMIT).to_string();
        r.careers = truncate_chars(&r.careers, PAGE_CHAR_LIMIT).to_string();
        if let Some(pdf) = r.pdf_content.as_mut() {
            *pdf = truncate_chars(pdf, PDF_CHAR_LIMIT).to_string();
        }
    }

    let used: usize = raw.iter().map(raw_len).sum();
    if raw.is_empty() || used <= total {
        return raw;
    }

    let share = total / raw.len();
    for r in &mut raw {
        let len = raw_len(r);
        if len <= share {
            continue;
        }
        shrink(&mut r.homepage, share, len);
        shrink(&mut r.pricing, share, len);
        shrink(&mut r.about, share, len);
        shrink(&mut r.careers, share, len);
        if let Some(pdf) = r.pdf_content.as_mut() {
            shrink(pdf, share, len);
        }
    }

    debug!(before = used, after = raw.iter().map(raw_len).sum::<usize>(), "raw data budgeted");
    raw
}
