//! Pagination crawler: one request becomes a bounded, strictly sequential series
//! of page fetches whose text and links are aggregated in crawl order.

use crate::crawler::{
    discover_next_page, ContentMatcher, Link, MatchRequest, PageRenderer, RenderRequest,
};
use crate::job::ExtractionRequest;
use crate::url::dedup_key;
use crate::{ExtractionError, UrlError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Running totals reported after every page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProgress {
    pub pages_extracted: u32,
    pub total_characters: u64,
    pub total_links: u64,
    pub current_url: Url,
}

/// Receiver of crawl progress, and the source of the cancellation signal
///
/// `report` is called synchronously between pages, so page N's report is
/// handled before page N+1 is fetched.
pub trait ProgressSink: Send {
    /// Checked at the top of every crawl iteration
    fn is_cancelled(&self) -> bool;

    fn report(&mut self, progress: &CrawlProgress);
}

/// Aggregated output of a finished crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOutput {
    /// Page texts joined with a blank line, in crawl order
    pub content: String,
    /// Links deduplicated by normalized URL, first occurrence kept
    pub links: Vec<Link>,
    pub pages_extracted: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Finished(CrawlOutput),
    /// Cancellation was observed before the budget or the chain ran out
    Cancelled { pages_extracted: u32 },
}

/// Drives the renderer and matcher across paginated content
#[derive(Clone)]
pub struct PaginationCrawler {
    renderer: Arc<dyn PageRenderer>,
    matcher: Arc<dyn ContentMatcher>,
    page_delay: Duration,
}

impl PaginationCrawler {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        matcher: Arc<dyn ContentMatcher>,
        page_delay: Duration,
    ) -> Self {
        Self {
            renderer,
            matcher,
            page_delay,
        }
    }

    /// Crawls `request` until the page budget is spent, no next page is found,
    /// or `sink` reports cancellation
    ///
    /// Any render or match failure aborts the whole crawl; there is no partial
    /// result.
    pub async fn crawl(
        &self,
        request: &ExtractionRequest,
        sink: &mut dyn ProgressSink,
    ) -> Result<CrawlOutcome, ExtractionError> {
        let start = Url::parse(request.url.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        let budget = request.page_budget();

        let mut visited = HashSet::new();
        visited.insert(dedup_key(&start));

        let mut aggregate = Aggregate::default();
        let mut next = Some(start);

        while let Some(url) = next.take() {
            if aggregate.pages_extracted >= budget {
                break;
            }

            if aggregate.pages_extracted > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            if sink.is_cancelled() {
                debug!(pages = aggregate.pages_extracted, "Crawl cancelled");
                return Ok(CrawlOutcome::Cancelled {
                    pages_extracted: aggregate.pages_extracted,
                });
            }

            debug!(url = %url, page = aggregate.pages_extracted + 1, "Fetching page");
            let page = self
                .renderer
                .render(&RenderRequest {
                    url,
                    use_js: request.use_js,
                    wait_time: request.wait_duration(),
                })
                .await?;

            let matched = self.matcher.match_page(&MatchRequest {
                body: &page.body,
                base_url: &page.final_url,
                selector: request.selector(),
                include_links: request.include_links,
            })?;

            aggregate.push_page(&matched.fragments);
            if request.include_links {
                aggregate.push_links(matched.links);
            }
            visited.insert(dedup_key(&page.final_url));

            sink.report(&CrawlProgress {
                pages_extracted: aggregate.pages_extracted,
                total_characters: aggregate.total_characters,
                total_links: aggregate.links.len() as u64,
                current_url: page.final_url.clone(),
            });

            if request.has_pagination && aggregate.pages_extracted < budget {
                next = discover_next_page(&matched.navigation, &page.final_url)
                    .filter(|candidate| visited.insert(dedup_key(candidate)));

                if next.is_none() {
                    debug!(url = %page.final_url, "No unvisited next page, stopping");
                }
            }
        }

        Ok(CrawlOutcome::Finished(aggregate.into_output()))
    }
}

#[derive(Default)]
struct Aggregate {
    content: String,
    total_characters: u64,
    links: Vec<Link>,
    seen_links: HashSet<String>,
    pages_extracted: u32,
}

impl Aggregate {
    fn push_page(&mut self, fragments: &[String]) {
        self.pages_extracted += 1;
        if fragments.is_empty() {
            return;
        }

        let text = fragments.join("\n");
        if !self.content.is_empty() {
            self.content.push_str("\n\n");
            self.total_characters += 2;
        }
        self.total_characters += text.chars().count() as u64;
        self.content.push_str(&text);
    }

    fn push_links(&mut self, links: Vec<Link>) {
        for link in links {
            let key = Url::parse(&link.url)
                .map(|url| dedup_key(&url))
                .unwrap_or_else(|_| link.url.clone());
            if self.seen_links.insert(key) {
                self.links.push(link);
            }
        }
    }

    fn into_output(self) -> CrawlOutput {
        CrawlOutput {
            content: self.content,
            links: self.links,
            pages_extracted: self.pages_extracted,
        }
    }
}
