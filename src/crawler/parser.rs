//! HTML parser for extracting readable text and article links
//!
//! This module turns a fetched HTML document into:
//! - The page title
//! - The visible text (what the classifier reads)
//! - Absolute, normalized, de-duplicated links to candidate articles

use crate::url::normalize_url;
use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text content is never shown to a reader
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text with whitespace collapsed to single spaces
    pub text: String,

    /// Links found on the page (absolute, normalized, unique, in document order)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts title, text and links
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` resolved against `base_url`, http(s) only.
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links and `<a download>`
/// - Links that normalize to the page itself
/// - Duplicates (after normalization)
///
/// # Example
///
/// ```
/// use scout_crawler::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Feed</title></head>
///     <body><p>Hello</p><a href="/post/1">One</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title.as_deref(), Some("Feed"));
/// assert_eq!(parsed.links, vec!["https://example.com/post/1".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects visible text nodes, skipping scripts, styles and the head
fn extract_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| INVISIBLE_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        words.extend(text.split_whitespace());
    }

    words.join(" ")
}

/// Extracts unique article candidate links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let own_url = normalize_url(base_url.as_str())
        .map(|u| u.to_string())
        .ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if own_url.as_deref() == Some(link.as_str()) {
            continue;
        }

        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None for special schemes, fragment-only anchors, and anything that
/// does not resolve to an http(s) URL.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok().map(|u| u.to_string())
}
