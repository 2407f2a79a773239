//! The report email: subject line, inline-styled HTML body, attachment name.

use std::fmt::Write as _;

use compintel_shared::Report;

use crate::{escape_html, slugify, threat_colors};

const H2_STYLE: &str = "font-size:18px;border-bottom:1px solid #e5e5e5;padding-bottom:8px;";
const LABEL_STYLE: &str =
    "padding:4px 8px 4px 0;font-weight:bold;vertical-align:top;white-space:nowrap;";

/// `Competitor Intel: {company} vs {n} Competitors`
pub fn email_subject(report: &Report) -> String {
    format!(
        "Competitor Intel: {} vs {} Competitors",
        report.company_name,
        report.competitors.len()
    )
}

/// File name of the HTML attachment, e.g. `competitor-intel-acme.html`.
pub fn attachment_filename(report: &Report) -> String {
    format!("competitor-intel-{}.html", slugify(&report.company_name))
}

/// Render the email body. Inline styles only, since mail clients drop `<style>`.
pub fn render_email_html(report: &Report) -> String {
    let mut out = String::with_capacity(8 * 1024);

    out.push_str(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width\"></head>\n",
    );
    out.push_str("<body style=\"font-family:-apple-system,BlinkMacSystemFont,sans-serif;max-width:680px;margin:0 auto;padding:20px;color:#1a1a1a;line-height:1.6;\">\n");

    // Header
    let _ = write!(
        out,
        "<div style=\"border-bottom:3px solid #000;padding-bottom:16px;margin-bottom:24px;\">\n\
         <h1 style=\"margin:0;font-size:24px;\">Competitor Intel Report</h1>\n\
         <p style=\"margin:4px 0 0;color:#666;\">{} &mdash; {}</p>\n</div>\n",
        escape_html(&report.company_name),
        escape_html(&report.company_summary)
    );

    // Executive summary
    let (top_name, top_diff) = report
        .top_threat()
        .map(|c| (c.name.as_str(), c.key_differentiator.as_str()))
        .unwrap_or(("N/A", ""));
    let key_insight = report
        .recommendations
        .first()
        .map(|r| r.action.as_str())
        .unwrap_or("");
    let _ = write!(
        out,
        "<div style=\"background:#f0f4ff;border-left:4px solid #2563eb;padding:16px;margin-bottom:24px;border-radius:0 8px 8px 0;\">\n\
         <h2 style=\"margin:0 0 8px;font-size:16px;color:#2563eb;\">Executive Summary</h2>\n\
         <p style=\"margin:0;\"><strong>Top threat:</strong> {} &mdash; {}</p>\n\
         <p style=\"margin:8px 0 0;\"><strong>Key insight:</strong> {}</p>\n</div>\n",
        escape_html(top_name),
        escape_html(top_diff),
        escape_html(key_insight)
    );

    // Competitor cards
    let _ = writeln!(out, "<h2 style=\"{H2_STYLE}\">Competitor Analysis</h2>");
    for (i, c) in report.competitors.iter().enumerate() {
        let (bg, border, badge) = threat_colors(c.threat_level);
        let _ = write!(
            out,
            "<div style=\"margin-bottom:24px;padding:16px;background:{bg};border-radius:8px;border:1px solid {border};\">\n\
             <h3 style=\"margin:0 0 8px;\">{}. {} <span style=\"font-size:12px;padding:2px 8px;border-radius:12px;margin-left:8px;background:{badge};color:white;\">{}</span></h3>\n\
             <p style=\"margin:0 0 4px;font-size:14px;color:#666;\">{}</p>\n\
             <p style=\"margin:0 0 8px;\">{}</p>\n\
             <table style=\"width:100%;font-size:14px;\">\n",
            i + 1,
            escape_html(&c.name),
            c.threat_level.as_str().to_uppercase(),
            escape_html(&c.url),
            escape_html(&c.summary),
        );
        for (label, value) in [
            ("Pricing:", &c.pricing),
            ("Recent moves:", &c.recent_moves),
            ("Hiring signals:", &c.hiring_signals),
            ("Differentiator:", &c.key_differentiator),
        ] {
            let _ = writeln!(
                out,
                "<tr><td style=\"{LABEL_STYLE}\">{label}</td><td style=\"padding:4px 0;\">{}</td></tr>",
                escape_html(value)
            );
        }
        out.push_str("</table>\n</div>\n");
    }

    // Market intelligence
    let _ = writeln!(out, "<h2 style=\"{H2_STYLE}\">Market Intelligence</h2>");
    out.push_str("<ul style=\"padding-left:20px;\">\n");
    for insight in &report.market_intelligence {
        let _ = writeln!(
            out,
            "<li style=\"margin-bottom:8px;\">{}</li>",
            escape_html(insight)
        );
    }
    out.push_str("</ul>\n");

    // Recommendations
    let _ = writeln!(out, "<h2 style=\"{H2_STYLE}\">Recommendations</h2>");
    out.push_str("<ol style=\"padding-left:20px;\">\n");
    for rec in &report.recommendations {
        let _ = write!(
            out,
            "<li style=\"margin-bottom:8px;\"><strong>[{}]</strong> {}",
            rec.priority.as_str().to_uppercase(),
            escape_html(&rec.action)
        );
        if !rec.impact.is_empty() {
            let _ = write!(
                out,
                " <span style=\"color:#666;\">({})</span>",
                escape_html(&rec.impact)
            );
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ol>\n");

    out.push_str(
        "<div style=\"margin-top:32px;padding-top:16px;border-top:1px solid #e5e5e5;font-size:12px;color:#999;\">Generated by Competitor Intel</div>\n",
    );
    out.push_str("</body>\n</html>\n");
    out
}
