//! Markdown report export.

use std::fmt::Write as _;

use compintel_shared::{CompetitorAnalysis, Report};

/// Render the report as a Markdown document, competitors ordered by threat.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::with_capacity(8 * 1024);

    let _ = writeln!(out, "# Competitor Intel: {}\n", report.company_name);
    let _ = writeln!(out, "> {}\n", report.company_summary);
    let _ = writeln!(
        out,
        "- **Source:** {}\n- **Generated:** {}\n- **Competitors:** {}\n",
        report.source_url,
        report.created_at.format("%Y-%m-%d %H:%M UTC"),
        report.competitors.len()
    );

    if let Some(top) = report.top_threat() {
        let _ = writeln!(
            out,
            "**Top threat:** {} ({})\n",
            top.name,
            one_line(&top.key_differentiator)
        );
    }

    if let Some(overview) = &report.market_overview {
        out.push_str("## Market Overview\n\n");
        out.push_str("| Total addressable market | Growth trend | Consolidation risk |\n");
        out.push_str("|---|---|---|\n");
        let _ = writeln!(
            out,
            "| {} | {} | {} |\n",
            cell(&overview.total_addressable_market),
            overview.growth_trend.as_str(),
            overview.consolidation_risk.as_str()
        );
    }

    out.push_str("## Competitors\n\n");
    if report.competitors.is_empty() {
        out.push_str("_No direct competitors were identified._\n\n");
    }
    for competitor in report.competitors_by_threat() {
        render_competitor(&mut out, competitor);
    }

    if !report.market_intelligence.is_empty() {
        out.push_str("## Market Intelligence\n\n");
        for insight in &report.market_intelligence {
            let _ = writeln!(out, "- {}", one_line(insight));
        }
        out.push('\n');
    }

    if !report.recommendations.is_empty() {
        out.push_str("## Recommendations\n\n");
        for (i, rec) in report.recommendations.iter().enumerate() {
            let _ = write!(
                out,
                "{}. **[{}]** {}",
                i + 1,
                rec.priority.as_str().to_uppercase(),
                one_line(&rec.action)
            );
            if !rec.impact.is_empty() {
                let _ = write!(out, " _({})_", one_line(&rec.impact));
            }
            out.push('\n');
        }
    }

    out
}

fn render_competitor(out: &mut String, c: &CompetitorAnalysis) {
    let _ = writeln!(
        out,
        "### {} ({} threat, {}/100)\n",
        c.name,
        c.threat_level.as_str(),
        c.effective_threat_score()
    );
    let _ = writeln!(out, "<{}>\n", c.url);
    if !c.summary.is_empty() {
        let _ = writeln!(out, "{}\n", c.summary);
    }

    out.push_str("| | |\n|---|---|\n");
    for (label, value) in [
        ("Pricing", &c.pricing),
        ("Recent moves", &c.recent_moves),
        ("Hiring signals", &c.hiring_signals),
        ("Differentiator", &c.key_differentiator),
    ] {
        if !value.is_empty() {
            let _ = writeln!(out, "| {label} | {} |", cell(value));
        }
    }
    if let Some(tier) = &c.pricing_tier {
        let _ = writeln!(
            out,
            "| Price range | ${} to ${} {} |",
            tier.low,
            tier.high,
            cell(&tier.model)
        );
    }
    if let Some(stage) = &c.funding_stage {
        let _ = writeln!(out, "| Funding | {} |", cell(stage));
    }
    if let Some(employees) = &c.estimated_employees {
        let _ = writeln!(out, "| Employees | {} |", cell(employees));
    }
    out.push('\n');

    if !c.strengths.is_empty() {
        let _ = writeln!(out, "**Strengths:** {}\n", c.strengths.join("; "));
    }
    if !c.weaknesses.is_empty() {
        let _ = writeln!(out, "**Weaknesses:** {}\n", c.weaknesses.join("; "));
    }
}

/// Table cells cannot hold pipes or newlines.
fn cell(s: &str) -> String {
    one_line(s).replace('|', "\\|")
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn markdown_has_sections() {
        let md = render_markdown(&fixtures::report());
        assert!(md.starts_with("# Competitor Intel: Acme Widgets\n"));
        assert!(md.contains("## Market Overview"));
        assert!(md.contains("| $4B | growing | high |"));
        assert!(md.contains("## Market Intelligence\n\n- Buyers consolidate vendors"));
        assert!(md.contains("1. **[HIGH]** Ship SSO _(Unblocks enterprise deals)_"));
        assert!(md.contains("2. **[LOW]** Publish pricing\n"));
    }

    #[test]
    fn markdown_sorts_competitors_by_threat() {
        let md = render_markdown(&fixtures::report());
        let widgetco = md.find("### Widgetco (high threat, 85/100)").unwrap();
        let gadgetly = md.find("### Gadgetly (low threat, 20/100)").unwrap();
        assert!(widgetco < gadgetly);
        assert!(md.contains("**Top threat:** Widgetco (SSO & audit logs)"));
        assert!(md.contains("| Price range | $0 to $49 per seat |"));
        assert!(md.contains("**Weaknesses:** Slow support"));
    }

    #[test]
    fn markdown_table_cells_are_escaped() {
        let mut report = fixtures::report();
        report.competitors[0].pricing = "Free | Pro\n$10".into();
        let md = render_markdown(&report);
        assert!(md.contains("| Pricing | Free \\| Pro $10 |"));
    }

    #[test]
    fn markdown_without_competitors() {
        let mut report = fixtures::report();
        report.competitors.clear();
        let md = render_markdown(&report);
        assert!(md.contains("_No direct competitors were identified._"));
        assert!(!md.contains("**Top threat:**"));
    }
}
