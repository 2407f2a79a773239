//! Report rendering: the email body, standalone HTML and Markdown exports.
//!
//! All renderers are pure functions over a [`Report`]. Every piece of
//! model-generated text is HTML-escaped before it lands in markup.

mod email;
mod html;
mod markdown;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use compintel_shared::{CompintelError, Report, Result};

pub use email::{attachment_filename, email_subject, render_email_html};
pub use html::render_html;
pub use markdown::render_markdown;

/// Output format for `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Html,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

/// Render a report in the requested format.
pub fn render(report: &Report, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Html => Ok(render_html(report)),
        ExportFormat::Markdown => Ok(render_markdown(report)),
        ExportFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| CompintelError::parse(format!("failed to serialize report: {e}"))),
    }
}

/// Default export file name, e.g. `competitor-intel-acme.md`.
pub fn export_filename(report: &Report, format: ExportFormat) -> String {
    format!(
        "competitor-intel-{}.{}",
        slugify(&report.company_name),
        format.extension()
    )
}

/// Write rendered output to `path`, creating parent directories.
pub fn write_export(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CompintelError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| CompintelError::io(path, e))?;
    info!(path = %path.display(), bytes = content.len(), "report exported");
    Ok(())
}

/// Lowercase a company name into a file-name-safe slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Light and strong accent colors per threat level: (background, border, badge).
pub(crate) fn threat_colors(level: compintel_shared::ThreatLevel) -> (&'static str, &'static str, &'static str) {
    use compintel_shared::ThreatLevel;
    match level {
        ThreatLevel::High => ("#fff5f5", "#fecaca", "#ef4444"),
        ThreatLevel::Medium => ("#fffbeb", "#fde68a", "#f59e0b"),
        ThreatLevel::Low => ("#f0fdf4", "#bbf7d0", "#22c55e"),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};
    use compintel_shared::{
        CompetitorAnalysis, ConsolidationRisk, GrowthTrend, MarketOverview, PricingTier,
        Priority, Recommendation, Report, ReportId, ThreatLevel,
    };

    pub fn report() -> Report {
        Report {
            id: ReportId::new(),
            source_url: "https://acme.test".into(),
            company_name: "Acme Widgets".into(),
            company_summary: "Widget platform for <small> teams".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            competitors: vec![
                CompetitorAnalysis {
                    name: "Gadgetly".into(),
                    url: "https://gadgetly.test".into(),
                    summary: "Gadgets for hobbyists".into(),
                    pricing: "Free".into(),
                    threat_level: ThreatLevel::Low,
                    ..Default::default()
                },
                CompetitorAnalysis {
                    name: "Widgetco".into(),
                    url: "https://widgetco.test".into(),
                    summary: "Enterprise widgets".into(),
                    pricing: "$49/seat".into(),
                    recent_moves: "Raised Series B".into(),
                    hiring_signals: "10 sales roles".into(),
                    key_differentiator: "SSO & audit logs".into(),
                    threat_level: ThreatLevel::High,
                    threat_score: Some(85),
                    pricing_tier: Some(PricingTier {
                        low: 0.0,
                        high: 49.0,
                        model: "per seat".into(),
                    }),
                    strengths: vec!["Brand".into()],
                    weaknesses: vec!["Slow support".into()],
                    ..Default::default()
                },
            ],
            market_intelligence: vec!["Buyers consolidate vendors".into()],
            recommendations: vec![
                Recommendation {
                    action: "Ship SSO".into(),
                    priority: Priority::High,
                    impact: "Unblocks enterprise deals".into(),
                },
                Recommendation {
                    action: "Publish pricing".into(),
                    priority: Priority::Low,
                    impact: String::new(),
                },
            ],
            market_overview: Some(MarketOverview {
                total_addressable_market: "$4B".into(),
                growth_trend: GrowthTrend::Growing,
                consolidation_risk: ConsolidationRisk::High,
            }),
            report_sent: false,
            recipient_email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("Acme Widgets"), "acme-widgets");
        assert_eq!(slugify("  Foo   Bar  "), "foo-bar");
        assert_eq!(slugify("Ben & Jerry's"), "ben-jerry-s");
        assert_eq!(slugify("!!!"), "report");
    }

    #[test]
    fn escape_html_specials() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn render_json_is_lossless() {
        let report = fixtures::report();
        let json = render(&report, ExportFormat::Json).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn export_filename_uses_extension() {
        let report = fixtures::report();
        assert_eq!(
            export_filename(&report, ExportFormat::Markdown),
            "competitor-intel-acme-widgets.md"
        );
    }

    #[test]
    fn write_export_creates_dirs() {
        let dir = std::env::temp_dir().join(format!("ci-export-{}", std::process::id()));
        let path = dir.join("nested").join("out.html");
        write_export(&path, "<p>hi</p>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>hi</p>");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
