//! Content matcher: turns a rendered page into text, links and pagination candidates
//!
//! # Text rendering
//!
//! Matched elements are rendered one stripped text node per line. Content of
//! `script`, `style`, `noscript`, `template` and `head` is dropped. With links
//! requested, each anchor inside the selection is rendered inline as
//! `"<text> — <absolute url>"` and collected.
//!
//! # Link rules
//!
//! **Excluded:** `javascript:`, `mailto:`, `tel:`, `data:`, fragment-only hrefs
//! and anything that does not resolve to http(s).

use crate::crawler::Link;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::ops::Deref;
use thiserror::Error;
use url::Url;

/// Elements whose content never counts as page text
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Errors raised by a content matcher
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Input to one match call
#[derive(Debug, Clone, Copy)]
pub struct MatchRequest<'a> {
    pub body: &'a str,
    /// Base for resolving relative hrefs (the page's post-redirect URL)
    pub base_url: &'a Url,
    /// CSS selector; the whole body when `None`
    pub selector: Option<&'a str>,
    pub include_links: bool,
}

/// A navigation anchor that may point at the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub url: Url,
    /// Visible text, whitespace collapsed
    pub text: String,
    /// Lowercased `rel` tokens
    pub rel: Vec<String>,
    pub aria_label: Option<String>,
    /// Lowercased class tokens of the anchor and its parent element
    pub classes: Vec<String>,
    pub disabled: bool,
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMatch {
    /// Text lines of the selected content, in document order
    pub fragments: Vec<String>,
    /// Links inside the selected content (empty unless requested)
    pub links: Vec<Link>,
    /// Anchors across the whole document, in document order
    pub navigation: Vec<NavLink>,
}

/// Extracts matched text and links from a page body
pub trait ContentMatcher: Send + Sync {
    fn match_page(&self, request: &MatchRequest<'_>) -> Result<PageMatch, MatchError>;
}

/// CSS-selector matcher backed by `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct CssMatcher;

impl CssMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentMatcher for CssMatcher {
    fn match_page(&self, request: &MatchRequest<'_>) -> Result<PageMatch, MatchError> {
        // Parse the selector first so an invalid one fails even on an empty page
        let selector = request
            .selector
            .map(|s| {
                Selector::parse(s).map_err(|e| MatchError::InvalidSelector {
                    selector: s.to_string(),
                    message: format!("{:?}", e),
                })
            })
            .transpose()?;

        let document = Html::parse_document(request.body);
        let roots = match &selector {
            Some(selector) => outermost(document.select(selector).collect()),
            None => vec![body_or_root(&document)],
        };

        let mut text = TextCollector {
            base_url: request.base_url,
            include_links: request.include_links,
            fragments: Vec::new(),
            links: Vec::new(),
        };
        for root in roots {
            text.walk(root, true);
        }

        Ok(PageMatch {
            fragments: text.fragments,
            links: text.links,
            navigation: navigation_links(&document, request.base_url),
        })
    }
}

/// Drops matches nested inside another match, keeping document order
fn outermost(matches: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<_> = matches.iter().map(|el| el.deref().id()).collect();
    matches
        .into_iter()
        .filter(|el| !el.deref().ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

fn body_or_root(document: &Html) -> ElementRef<'_> {
    Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element())
}

struct TextCollector<'u> {
    base_url: &'u Url,
    include_links: bool,
    fragments: Vec<String>,
    links: Vec<Link>,
}

impl TextCollector<'_> {
    fn walk(&mut self, element: ElementRef<'_>, is_root: bool) {
        let value = element.value();
        if !is_root && SKIPPED_ELEMENTS.contains(&value.name()) {
            return;
        }

        if self.include_links && value.name() == "a" {
            if let Some(href) = value.attr("href") {
                if let Some(url) = resolve_link(href, self.base_url) {
                    self.push_link(collapse_whitespace(element.text()), href, url);
                    return;
                }
            }
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let line = text.trim();
                    if !line.is_empty() {
                        self.fragments.push(line.to_string());
                    }
                }
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.walk(child, false);
                    }
                }
                _ => {}
            }
        }
    }

    fn push_link(&mut self, text: String, href: &str, url: Url) {
        let url = url.to_string();
        if text.is_empty() {
            self.fragments.push(url.clone());
            self.links.push(Link {
                text: href.trim().to_string(),
                url,
            });
        } else {
            self.fragments.push(format!("{} — {}", text, url));
            self.links.push(Link { text, url });
        }
    }
}

/// Collects every `a[href]` / `link[href]` in the document as a pagination candidate
fn navigation_links(document: &Html, base_url: &Url) -> Vec<NavLink> {
    let Ok(selector) = Selector::parse("a[href], link[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let value = element.value();
        let Some(url) = value.attr("href").and_then(|href| resolve_link(href, base_url)) else {
            continue;
        };

        let own_classes: Vec<String> = value.classes().map(str::to_ascii_lowercase).collect();
        let parent_classes: Vec<String> = element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| parent.value().classes().map(str::to_ascii_lowercase).collect())
            .unwrap_or_default();

        let disabled = value.attr("disabled").is_some()
            || value
                .attr("aria-disabled")
                .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
            || own_classes.iter().chain(&parent_classes).any(|c| c == "disabled");

        links.push(NavLink {
            url,
            text: collapse_whitespace(element.text()),
            rel: value
                .attr("rel")
                .map(|rel| rel.split_whitespace().map(str::to_ascii_lowercase).collect())
                .unwrap_or_default(),
            aria_label: value.attr("aria-label").map(|s| s.trim().to_string()),
            classes: own_classes.into_iter().chain(parent_classes).collect(),
            disabled,
        });
    }

    links
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}
