//! Next-page discovery
//!
//! Candidates are checked in tiers, first match wins, document order within a tier:
//!
//! | Tier | Signal |
//! |------|--------|
//! | 1 | `rel` contains `next` |
//! | 2 | `aria-label` contains "next" |
//! | 3 | anchor or parent class has a `next` token (`next`, `pager-next`, ...) |
//! | 4 | visible text reads like a "next" control (`Next`, `Next page`, `»`, ...) |
//!
//! Disabled candidates, candidates on another site and links back to the current
//! page never qualify.

use crate::crawler::NavLink;
use crate::url::{dedup_key, same_site};
use url::Url;

/// Link texts accepted by the text tier, compared lowercased and trimmed
const NEXT_TEXTS: &[&str] = &["next", "next page", "next ›", "next »", "›", "»", ">", ">>"];

/// Picks the next page among a page's navigation links
///
/// # Arguments
///
/// * `navigation` - Candidates in document order
/// * `current` - URL of the page they were found on
///
/// # Returns
///
/// The first candidate of the highest tier that has one, or `None`.
pub fn discover_next_page(navigation: &[NavLink], current: &Url) -> Option<Url> {
    let current_key = dedup_key(current);
    let candidates: Vec<&NavLink> = navigation
        .iter()
        .filter(|link| !link.disabled)
        .filter(|link| same_site(&link.url, current))
        .filter(|link| dedup_key(&link.url) != current_key)
        .collect();

    let tiers: [fn(&NavLink) -> bool; 4] = [has_next_rel, has_next_label, has_next_class, has_next_text];
    tiers
        .iter()
        .find_map(|tier| candidates.iter().find(|link| tier(link)))
        .map(|link| link.url.clone())
}

fn has_next_rel(link: &NavLink) -> bool {
    link.rel.iter().any(|rel| rel == "next")
}

fn has_next_label(link: &NavLink) -> bool {
    link.aria_label
        .as_deref()
        .map_or(false, |label| label.to_lowercase().contains("next"))
}

fn has_next_class(link: &NavLink) -> bool {
    link.classes
        .iter()
        .any(|class| class.split(['-', '_']).any(|part| part == "next"))
}

fn has_next_text(link: &NavLink) -> bool {
    let text = link.text.trim().to_lowercase();
    NEXT_TEXTS.contains(&text.as_str()) || text.starts_with("next ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> Url {
        Url::parse("https://example.com/articles?page=1").unwrap()
    }

    fn nav(url: &str) -> NavLink {
        NavLink {
            url: Url::parse(url).unwrap(),
            text: String::new(),
            rel: Vec::new(),
            aria_label: None,
            classes: Vec::new(),
            disabled: false,
        }
    }

    #[test]
    fn test_rel_next_wins_over_text() {
        let mut by_text = nav("https://example.com/articles?page=9");
        by_text.text = "Next".to_string();
        let mut by_rel = nav("https://example.com/articles?page=2");
        by_rel.rel = vec!["next".to_string()];

        let next = discover_next_page(&[by_text, by_rel], &current()).unwrap();
        assert_eq!(next.as_str(), "https://example.com/articles?page=2");
    }

    #[test]
    fn test_aria_label_tier() {
        let mut link = nav("https://example.com/articles?page=2");
        link.aria_label = Some("Go to NEXT page".to_string());
        assert!(discover_next_page(&[link], &current()).is_some());
    }

    #[test]
    fn test_class_tier_matches_tokens_only() {
        let mut pager = nav("https://example.com/articles?page=2");
        pager.classes = vec!["pagination-next".to_string()];
        assert!(discover_next_page(&[pager], &current()).is_some());

        let mut unrelated = nav("https://example.com/framework");
        unrelated.classes = vec!["nextjs-logo".to_string()];
        assert!(discover_next_page(&[unrelated], &current()).is_none());
    }

    #[test]
    fn test_text_tier() {
        for text in ["Next", " next page ", "»", "Next chapter"] {
            let mut link = nav("https://example.com/articles?page=2");
            link.text = text.to_string();
            assert!(
                discover_next_page(&[link], &current()).is_some(),
                "text {:?} should qualify",
                text
            );
        }

        let mut link = nav("https://example.com/articles?page=2");
        link.text = "Nextdoor".to_string();
        assert!(discover_next_page(&[link], &current()).is_none());
    }

    #[test]
    fn test_disabled_is_skipped() {
        let mut link = nav("https://example.com/articles?page=2");
        link.rel = vec!["next".to_string()];
        link.disabled = true;
        assert!(discover_next_page(&[link], &current()).is_none());
    }

    #[test]
    fn test_other_site_is_skipped() {
        let mut link = nav("https://other.com/articles?page=2");
        link.rel = vec!["next".to_string()];
        assert!(discover_next_page(&[link], &current()).is_none());
    }

    #[test]
    fn test_self_link_is_skipped() {
        let mut link = nav("https://www.example.com/articles?page=1#top");
        link.text = "Next".to_string();
        assert!(discover_next_page(&[link], &current()).is_none());
    }

    #[test]
    fn test_document_order_within_tier() {
        let mut first = nav("https://example.com/articles?page=2");
        first.text = "Next".to_string();
        let mut second = nav("https://example.com/articles?page=3");
        second.text = "Next".to_string();

        let next = discover_next_page(&[first, second], &current()).unwrap();
        assert!(next.as_str().ends_with("page=2"));
    }
}
