//! Post-conversion cleanup pipeline for page text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Scraped marketing pages are fed to a language model under a character
//! budget, so the passes favor dropping noise over preserving layout.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.to_string();

    result = strip_images(&result);
    result = resolve_links(&result, base_url);
    result = strip_leftover_html(&result);
    result = drop_boilerplate_lines(&result);
    result = normalize_whitespace(&result);
    result = collapse_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Strip images
// ---------------------------------------------------------------------------

/// Remove Markdown images, including linked logos like `[![alt](src)](href)`.
fn strip_images(md: &str) -> String {
    static LINKED_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[!\[[^\]]*\]\([^)]*\)\]\([^)]*\)").expect("valid regex")
    });
    static IMG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

    let without_linked = LINKED_IMG_RE.replace_all(md, "");
    IMG_RE.replace_all(&without_linked, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve relative URLs in Markdown links against the page URL, so that
/// later link scans (PDF discovery) see absolute URLs.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let text = &caps[1];
            let href = &caps[2];

            if href.starts_with("http://")
                || href.starts_with("https://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
            {
                return format!("[{text}]({href})");
            }

            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => format!("[{text}]({href})"),
            }
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray layout tags that survived the conversion, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|picture|source|button|form|input|label)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Drop site chrome
// ---------------------------------------------------------------------------

/// Drop lines that are cookie banners, skip links and similar chrome.
fn drop_boilerplate_lines(md: &str) -> String {
    static BOILERPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^\s*(?:\[)?(?:skip to (?:main )?content|accept (?:all )?cookies|reject (?:all )?cookies|cookie (?:settings|preferences)|we use cookies\b.*|manage consent)(?:\]\([^)]*\))?\s*$",
        )
        .expect("valid regex")
    });

    md.lines()
        .filter(|line| !BOILERPLATE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace and collapse inner runs of spaces and tabs.
fn normalize_whitespace(md: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\S)[ \t]{2,}").expect("valid regex"));

    md.lines()
        .map(|line| SPACES_RE.replace_all(line.trim_end(), "$1 ").to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Collapse blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into a single blank line.
fn collapse_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Trim
// ---------------------------------------------------------------------------

/// Trim leading blank lines and end with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_start_matches('\n').trim_end_matches('\n');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
