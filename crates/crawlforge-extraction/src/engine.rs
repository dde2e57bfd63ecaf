//! Extraction Engine: listens for `new_responses`, runs every
//! configured [`TargetElement`]'s hierarchy against each page, and
//! publishes `scraped_data`.
//!
//! Grounded on `data_scraper.py`'s `parse_data` (iterate responses,
//! skip sub-pages-only seeds, run every element against each page in
//! configured order).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use crawlforge_events::{Event, EventBus, Listener};
use crawlforge_types::{ScrapedData, TargetElement};
use scraper::Html;
use tracing::{debug, warn};

use crate::hierarchy::match_hierarchy;

/// Tracks which seed URLs are configured `only_scrape_sub_pages=true`:
/// the seed page itself is skipped (but still counted visited), its
/// descendants are scraped normally. Keyed by exact seed URL, same as
/// the teacher's `only_scrape_sub_pages` lookup table.
#[derive(Debug, Clone, Default)]
pub struct SubPagePolicy {
    sub_pages_only_seeds: HashSet<String>,
}

impl SubPagePolicy {
    pub fn new(sub_pages_only_seeds: HashSet<String>) -> Self {
        Self { sub_pages_only_seeds }
    }

    pub fn should_skip(&self, url: &str) -> bool {
        self.sub_pages_only_seeds.contains(url)
    }
}

/// Runs every configured element's hierarchy against newly fetched
/// HTML and republishes the matches as `scraped_data`.
pub struct ExtractionEngine {
    elements: Vec<TargetElement>,
    policy: SubPagePolicy,
    events: Arc<EventBus>,
}

impl ExtractionEngine {
    pub fn new(elements: Vec<TargetElement>, policy: SubPagePolicy, events: Arc<EventBus>) -> Self {
        Self { elements, policy, events }
    }

    /// Parses `html` once and runs every element's hierarchy against
    /// it, in configured order.
    pub fn extract_page(&self, url: &str, html: &str) -> Vec<ScrapedData> {
        let document = Html::parse_document(html);
        self.elements
            .iter()
            .map(|element| {
                let nodes_html = match_hierarchy(&document, element)
                    .into_iter()
                    .map(|node| node.html())
                    .collect();
                ScrapedData {
                    source_url: crawlforge_types::CrawlUrl::parse(url)
                        .unwrap_or_else(|_| panic!("new_responses carries only URLs the fetch engine already parsed: {url}")),
                    target_element_id: element.id,
                    nodes_html,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Listener for ExtractionEngine {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let Some(responses) = event.data::<HashMap<String, String>>() else {
            warn!(topic = %event.topic, "new_responses event carried unexpected payload type");
            return Ok(());
        };

        let mut scraped = Vec::new();
        for (url, html) in responses {
            if self.policy.should_skip(url) {
                debug!(url = %url, "sub-pages-only seed, skipping extraction but counting as visited");
                continue;
            }
            scraped.extend(self.extract_page(url, html));
        }

        if scraped.is_empty() {
            return Ok(());
        }

        self.events
            .async_trigger(Event::new("scraped_data", "extraction", scraped))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlforge_types::{HierarchyPolicy, ParsingOption, Requirements};

    fn element(id: u32, name: &str, hierarchy: &[&str]) -> TargetElement {
        TargetElement {
            id,
            name: name.to_string(),
            search_hierarchy: hierarchy.iter().map(|s| s.to_string()).collect(),
            parsing_option: Some(ParsingOption::CollectText),
            requires: Requirements::default(),
            hierarchy_policy: HierarchyPolicy::KeepPrevious,
        }
    }

    #[test]
    fn extract_page_runs_every_element_in_order() {
        let engine = ExtractionEngine::new(
            vec![element(1, "title", &["h1"]), element(2, "price", &[".price"])],
            SubPagePolicy::default(),
            Arc::new(EventBus::new()),
        );

        let html = r#"<html><body><h1>Widget</h1><span class="price">$9</span></body></html>"#;
        let data = engine.extract_page("http://s/a", html);

        assert_eq!(data.len(), 2);
        assert_eq!(data[0].target_element_id, 1);
        assert_eq!(data[0].nodes_html[0].contains("Widget"), true);
        assert_eq!(data[1].target_element_id, 2);
    }

    #[test]
    fn sub_pages_only_policy_matches_exact_seed_url() {
        let policy = SubPagePolicy::new(["http://s/seed".to_string()].into_iter().collect());
        assert!(policy.should_skip("http://s/seed"));
        assert!(!policy.should_skip("http://s/seed/child"));
    }
}
