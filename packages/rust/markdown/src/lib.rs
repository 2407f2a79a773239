//! HTML-to-Markdown conversion, cleanup passes and link scanning.
//!
//! Converts scraped HTML pages to compact Markdown using the `htmd` crate,
//! then applies a series of cleanup passes that drop images, site chrome and
//! excess whitespace. The result is what gets fed to the reasoning engine.

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use compintel_shared::{CompintelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of converting an HTML page to Markdown.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// The cleaned Markdown content.
    pub markdown: String,
    /// Page title from `<title>` or the first H1, if any.
    pub title: Option<String>,
    /// Approximate word count of the Markdown.
    pub word_count: usize,
}

/// Options for the HTML-to-Markdown conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Source URL used for resolving relative links.
    pub source_url: String,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// Convert HTML to clean Markdown.
///
/// 1. Extracts the content HTML (`<main>`, `[role=main]`, `<article>`, else `<body>`)
/// 2. Pre-processes HTML tables (pricing grids) into markdown tables
/// 3. Converts HTML → Markdown via `htmd`
/// 4. Runs the cleanup pipeline
#[instrument(skip(html), fields(url = %opts.source_url))]
pub fn convert(html: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    let doc = Html::parse_document(html);
    let document_title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let content_html = extract_content_html(&doc, html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "header", "footer", "iframe", "noscript", "svg", "form",
            "button",
        ])
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| CompintelError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let base_url = Url::parse(&opts.source_url).ok();
    let markdown = cleanup::run_pipeline(&raw_markdown, base_url.as_ref());

    let title = document_title.or_else(|| extract_title_from_markdown(&markdown));
    let word_count = markdown.split_whitespace().count();

    debug!(word_count, final_len = markdown.len(), "conversion complete");

    Ok(ConvertResult {
        markdown,
        title,
        word_count,
    })
}

// ---------------------------------------------------------------------------
// Link scanning
// ---------------------------------------------------------------------------

/// Find absolute PDF links in page text, in order of first appearance.
pub fn pdf_links(text: &str) -> Vec<String> {
    static PDF_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)https?://[^\s)"'<>\]]+\.pdf\b"#).expect("valid regex")
    });

    let mut links: Vec<String> = Vec::new();
    for m in PDF_RE.find_iter(text) {
        let link = m.as_str().to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Convert HTML `<table>` elements to markdown table syntax before htmd conversion.
///
/// `htmd` 0.1 doesn't support table conversion, so we handle it manually.
fn preprocess_tables(html: &str) -> String {
    let doc = Html::parse_fragment(html);

    if doc.select(&TABLE_SEL).next().is_none() {
        return html.to_string();
    }

    let mut result = html.to_string();
    for table_el in doc.select(&TABLE_SEL) {
        let md_table = html_table_to_markdown(&table_el);
        result = result.replacen(&table_el.html(), &md_table, 1);
    }

    result
}

/// Convert a single HTML table element to a markdown table string.
fn html_table_to_markdown(table: &scraper::ElementRef) -> String {
    let cell_text = |cell: scraper::ElementRef| {
        cell.text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;

    for tr in table.select(&TR_SEL) {
        let ths: Vec<String> = tr.select(&TH_SEL).map(cell_text).collect();
        if !ths.is_empty() && rows.is_empty() {
            has_header = true;
            rows.push(ths);
            continue;
        }

        let mut cells = ths;
        cells.extend(tr.select(&TD_SEL).map(cell_text));
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let col_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::from("\n\n");

    if !has_header {
        rows.insert(0, vec![String::new(); col_count]);
    }

    let header = &rows[0];
    md.push_str(&format!("| {} |\n", header.join(" | ")));
    md.push_str(&format!("| {} |\n", vec!["---"; col_count].join(" | ")));
    for row in &rows[1..] {
        md.push_str(&format!("| {} |\n", row.join(" | ")));
    }

    md.push('\n');
    md
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the main content HTML, falling back to the whole `<body>`.
fn extract_content_html(doc: &Html, raw: &str) -> String {
    let selectors = ["main", "[role=\"main\"]", "article", "body"];

    for sel_str in &selectors {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                let inner = el.inner_html();
                if !inner.trim().is_empty() {
                    return inner;
                }
            }
        }
    }

    raw.to_string()
}

/// Extract title from the first H1 in the Markdown text.
fn extract_title_from_markdown(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_opts(url: &str) -> ConvertOptions {
        ConvertOptions {
            source_url: url.to_string(),
        }
    }

    #[test]
    fn convert_simple_html() {
        let html = "<html><head><title>Acme | Widgets</title></head><body><main><h1>Widgets for teams</h1><p>Ship faster.</p></main></body></html>";
        let result = convert(html, &make_opts("https://acme.test/")).unwrap();

        assert!(result.markdown.contains("# Widgets for teams"));
        assert!(result.markdown.contains("Ship faster."));
        assert_eq!(result.title.as_deref(), Some("Acme | Widgets"));
        assert!(result.word_count > 0);
    }

    #[test]
    fn convert_title_falls_back_to_h1() {
        let html = "<html><body><main><h1>Pricing</h1><p>Free forever.</p></main></body></html>";
        let result = convert(html, &make_opts("https://acme.test/pricing")).unwrap();
        assert_eq!(result.title.as_deref(), Some("Pricing"));
    }

    #[test]
    fn convert_strips_site_chrome() {
        let html = r#"<html><body>
            <header><a href="/">Acme</a></header>
            <nav><a href="/docs">Docs</a></nav>
            <main><h1>About</h1><p>Founded in 2019.</p></main>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;

        let result = convert(html, &make_opts("https://acme.test/about")).unwrap();
        assert!(result.markdown.contains("Founded in 2019."));
        assert!(!result.markdown.contains("Copyright 2024"));
        assert!(!result.markdown.contains("Docs"));
    }

    #[test]
    fn convert_preserves_pricing_tables() {
        let html = r#"<html><body><main>
            <h1>Plans</h1>
            <table>
                <thead><tr><th>Plan</th><th>Price</th></tr></thead>
                <tbody>
                    <tr><td>Starter</td><td>$10/mo</td></tr>
                    <tr><td>Business</td><td>$49/mo</td></tr>
                </tbody>
            </table>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://acme.test/pricing")).unwrap();
        assert!(result.markdown.contains("| Plan | Price |"));
        assert!(result.markdown.contains("| Business | $49/mo |"));
    }

    #[test]
    fn convert_resolves_relative_pdf_links() {
        let html = r#"<html><body><main>
            <p>Read our <a href="/assets/security.pdf">security whitepaper</a>.</p>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://acme.test/about")).unwrap();
        assert_eq!(
            pdf_links(&result.markdown),
            vec!["https://acme.test/assets/security.pdf".to_string()]
        );
    }

    #[test]
    fn convert_drops_images() {
        let html = r#"<html><body><main><img src="/hero.png" alt="Hero"><p>Text</p></main></body></html>"#;
        let result = convert(html, &make_opts("https://acme.test/")).unwrap();
        assert!(!result.markdown.contains("hero.png"));
        assert!(result.markdown.contains("Text"));
    }

    #[test]
    fn convert_no_main_element() {
        let html = "<html><body><h1>Direct Body</h1><p>Content in body.</p></body></html>";
        let result = convert(html, &make_opts("https://acme.test/plain")).unwrap();
        assert!(result.markdown.contains("Direct Body"));
        assert!(result.markdown.contains("Content in body."));
    }

    #[test]
    fn convert_empty_html() {
        let html = "<html><body></body></html>";
        let result = convert(html, &make_opts("https://acme.test/empty")).unwrap();
        assert!(result.markdown.trim().is_empty());
        assert_eq!(result.title, None);
        assert_eq!(result.word_count, 0);
    }

    #[test]
    fn pdf_links_case_insensitive_and_deduped() {
        let text = "See https://a.test/Deck.PDF and [again](https://a.test/Deck.PDF), \
                    plus http://b.test/report.pdf. Not https://c.test/page.html";
        assert_eq!(
            pdf_links(text),
            vec![
                "https://a.test/Deck.PDF".to_string(),
                "http://b.test/report.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn pdf_links_none() {
        assert!(pdf_links("no documents here").is_empty());
        assert!(pdf_links("/relative/file.pdf").is_empty());
    }
}
