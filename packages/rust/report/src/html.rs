//! Standalone HTML report export.

use std::fmt::Write as _;

use compintel_shared::{CompetitorAnalysis, Priority, Recommendation, Report};

use crate::{escape_html, threat_colors};

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; max-width: 880px; margin: 0 auto; padding: 32px 20px; color: #1a1a1a; line-height: 1.6; }
header { border-bottom: 3px solid #000; padding-bottom: 16px; margin-bottom: 32px; }
header h1 { margin: 0; font-size: 28px; }
header p { margin: 4px 0 0; color: #666; }
h2 { font-size: 20px; border-bottom: 1px solid #e5e5e5; padding-bottom: 8px; margin-top: 40px; }
.overview { display: flex; gap: 16px; flex-wrap: wrap; }
.stat { flex: 1; min-width: 160px; background: #f7f7f8; border-radius: 8px; padding: 12px 16px; }
.stat .label { font-size: 12px; text-transform: uppercase; color: #666; }
.stat .value { font-size: 18px; font-weight: 600; }
.competitor { border-radius: 8px; padding: 16px 20px; margin-bottom: 20px; border: 1px solid; }
.competitor h3 { margin: 0 0 4px; }
.badge { font-size: 12px; padding: 2px 8px; border-radius: 12px; margin-left: 8px; color: white; }
.url { font-size: 14px; color: #666; margin: 0 0 8px; }
table.facts { width: 100%; font-size: 14px; border-collapse: collapse; }
table.facts td { padding: 4px 8px 4px 0; vertical-align: top; }
table.facts td:first-child { font-weight: 600; white-space: nowrap; width: 1%; }
.lists { display: flex; gap: 24px; font-size: 14px; }
.lists div { flex: 1; }
.priority-high { color: #b91c1c; }
.priority-medium { color: #b45309; }
.priority-low { color: #15803d; }
footer { margin-top: 48px; padding-top: 16px; border-top: 1px solid #e5e5e5; font-size: 12px; color: #999; }
"#;

/// Render a self-contained HTML document for the report.
///
/// Competitors are ordered by threat (high first) and recommendations by
/// priority; both sorts are stable.
pub fn render_html(report: &Report) -> String {
    let mut out = String::with_capacity(16 * 1024);
    let title = format!("Competitor Intel: {}", escape_html(&report.company_name));

    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    );

    let _ = write!(
        out,
        "<header>\n<h1>{title}</h1>\n<p>{}</p>\n<p><a href=\"{}\">{}</a> &middot; {}</p>\n</header>\n",
        escape_html(&report.company_summary),
        escape_html(&report.source_url),
        escape_html(&report.source_url),
        report.created_at.format("%B %-d, %Y %H:%M UTC"),
    );

    if let Some(overview) = &report.market_overview {
        out.push_str("<h2>Market Overview</h2>\n<div class=\"overview\">\n");
        for (label, value) in [
            (
                "Total addressable market",
                escape_html(&overview.total_addressable_market),
            ),
            ("Growth trend", overview.growth_trend.as_str().to_string()),
            (
                "Consolidation risk",
                overview.consolidation_risk.as_str().to_string(),
            ),
            ("Competitors analyzed", report.competitors.len().to_string()),
        ] {
            let _ = writeln!(
                out,
                "<div class=\"stat\"><div class=\"label\">{label}</div><div class=\"value\">{value}</div></div>"
            );
        }
        out.push_str("</div>\n");
    }

    out.push_str("<h2>Competitors</h2>\n");
    if report.competitors.is_empty() {
        out.push_str("<p>No direct competitors were identified.</p>\n");
    }
    for competitor in report.competitors_by_threat() {
        render_competitor(&mut out, competitor);
    }

    out.push_str("<h2>Market Intelligence</h2>\n<ul>\n");
    for insight in &report.market_intelligence {
        let _ = writeln!(out, "<li>{}</li>", escape_html(insight));
    }
    out.push_str("</ul>\n");

    out.push_str("<h2>Recommendations</h2>\n<ol>\n");
    for rec in recommendations_by_priority(&report.recommendations) {
        let priority = rec.priority.as_str();
        let _ = write!(
            out,
            "<li><strong class=\"priority-{priority}\">{}</strong> {}",
            priority.to_uppercase(),
            escape_html(&rec.action)
        );
        if !rec.impact.is_empty() {
            let _ = write!(out, "<br><em>Impact:</em> {}", escape_html(&rec.impact));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ol>\n");

    let _ = write!(
        out,
        "<footer>Generated by Competitor Intel &middot; report {}</footer>\n</body>\n</html>\n",
        report.id
    );
    out
}

fn render_competitor(out: &mut String, c: &CompetitorAnalysis) {
    let (bg, border, badge) = threat_colors(c.threat_level);
    let _ = write!(
        out,
        "<section class=\"competitor\" style=\"background:{bg};border-color:{border};\">\n\
         <h3>{}<span class=\"badge\" style=\"background:{badge};\">{} &middot; {}</span></h3>\n\
         <p class=\"url\"><a href=\"{}\">{}</a></p>\n<p>{}</p>\n<table class=\"facts\">\n",
        escape_html(&c.name),
        c.threat_level.as_str().to_uppercase(),
        c.effective_threat_score(),
        escape_html(&c.url),
        escape_html(&c.url),
        escape_html(&c.summary),
    );

    let mut facts: Vec<(&str, String)> = vec![
        ("Pricing", escape_html(&c.pricing)),
        ("Recent moves", escape_html(&c.recent_moves)),
        ("Hiring signals", escape_html(&c.hiring_signals)),
        ("Differentiator", escape_html(&c.key_differentiator)),
    ];
    if let Some(tier) = &c.pricing_tier {
        facts.push((
            "Price range",
            format!(
                "${} to ${} {}",
                tier.low,
                tier.high,
                escape_html(&tier.model)
            ),
        ));
    }
    if let Some(overlap) = c.feature_overlap {
        facts.push(("Feature overlap", format!("{overlap}/100")));
    }
    if let Some(presence) = c.market_presence {
        facts.push(("Market presence", format!("{presence}/100")));
    }
    if let Some(stage) = &c.funding_stage {
        facts.push(("Funding", escape_html(stage)));
    }
    if let Some(employees) = &c.estimated_employees {
        facts.push(("Employees", escape_html(employees)));
    }

    for (label, value) in facts.into_iter().filter(|(_, v)| !v.is_empty()) {
        let _ = writeln!(out, "<tr><td>{label}</td><td>{value}</td></tr>");
    }
    out.push_str("</table>\n");

    if !c.strengths.is_empty() || !c.weaknesses.is_empty() {
        out.push_str("<div class=\"lists\">\n");
        for (heading, items) in [("Strengths", &c.strengths), ("Weaknesses", &c.weaknesses)] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "<div><strong>{heading}</strong><ul>");
            for item in items {
                let _ = writeln!(out, "<li>{}</li>", escape_html(item));
            }
            out.push_str("</ul></div>\n");
        }
        out.push_str("</div>\n");
    }

    out.push_str("</section>\n");
}

fn recommendations_by_priority(recs: &[Recommendation]) -> Vec<&Recommendation> {
    let rank = |p: Priority| match p {
        Priority::High => 0,
        Priority::Medium => 1,
        Priority::Low => 2,
    };
    let mut sorted: Vec<&Recommendation> = recs.iter().collect();
    sorted.sort_by_key(|r| rank(r.priority));
    sorted
}
