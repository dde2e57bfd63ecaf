//! Core data model: target elements, requirements, scraped data, proxies.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::url::CrawlUrl;

/// How a matched DOM node's value should be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsingOption {
    /// Visible text content, whitespace-trimmed.
    CollectText,
    /// Outer markup (serialized HTML) of the node.
    RemoveTags,
    /// Value of a named attribute; missing attribute yields `""`.
    CollectAttr { attr_name: String },
}

/// Page-event names a rendered fetch may be asked to wait for.
pub const VALID_EVENTS: &[&str] = &[
    "close",
    "console",
    "crash",
    "dialog",
    "domcontentloaded",
    "download",
    "filechooser",
    "frameattached",
    "framedetached",
    "framenavigated",
    "load",
    "pageerror",
    "popup",
    "request",
    "requestfailed",
    "requestfinished",
    "response",
    "websocket",
    "worker",
];

/// Load-state names a rendered fetch may wait for.
pub const VALID_STATES: &[&str] = &["domcontentloaded", "load", "networkidle"];

/// Crawl-wide readiness requirements, merged (set union) across every
/// configured [`TargetElement`] and passed to the fetch engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// `(selector_kind, selector_value)` pairs the page must contain
    /// before extraction is attempted.
    pub loaded_elements: HashSet<(String, String)>,
    /// Page event names (subset of [`VALID_EVENTS`]) to wait for.
    pub events: HashSet<String>,
    /// Load state names (subset of [`VALID_STATES`]) to wait for.
    pub states: HashSet<String>,
}

impl Requirements {
    pub fn merge(mut self, other: &Requirements) -> Self {
        self.loaded_elements
            .extend(other.loaded_elements.iter().cloned());
        self.events.extend(other.events.iter().cloned());
        self.states.extend(other.states.iter().cloned());
        self
    }

    pub fn merge_all<'a>(items: impl IntoIterator<Item = &'a Requirements>) -> Requirements {
        items
            .into_iter()
            .fold(Requirements::default(), |acc, r| acc.merge(r))
    }
}

/// Whether a hierarchy stage that matches nothing should discard
/// everything gathered so far, or keep the previous stage's result set.
/// spec.md §9 picks `KeepPrevious` as the default; `EmptyOnPartial` is
/// kept available per the same note ("implementations should make this
/// configurable").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HierarchyPolicy {
    #[default]
    KeepPrevious,
    EmptyOnPartial,
}

/// One element to extract from every crawled page.
#[derive(Debug, Clone)]
pub struct TargetElement {
    pub id: u32,
    pub name: String,
    /// Stage N is applied to every node returned by stage N-1.
    pub search_hierarchy: Vec<String>,
    pub parsing_option: Option<ParsingOption>,
    pub requires: Requirements,
    pub hierarchy_policy: HierarchyPolicy,
}

/// A single DOM node matched for a [`TargetElement`] on one page.
#[derive(Debug, Clone)]
pub struct ScrapedData {
    pub source_url: CrawlUrl,
    pub target_element_id: u32,
    /// Serialized outer HTML of every matched node, in document order.
    /// Kept as markup (rather than a borrowed tree reference) so a
    /// `ScrapedData` can cross the event bus and outlive the parsed DOM
    /// it came from.
    pub nodes_html: Vec<String>,
}

/// `protocol://ip:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proxy {
    pub protocol: String,
    pub ip: String,
    pub port: u16,
}

impl Proxy {
    pub fn formatted(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.ip, self.port)
    }
}

/// Result of fetching one URL, static or rendered. Generic over the
/// page handle type so this crate doesn't need to depend on
/// `crawlforge-browser`/`spider_chrome`: `crawlforge-fetch` instantiates
/// it as `ScrapedResponse<crawlforge_browser::BrowserPage>`, static
/// fetches instantiate it as `ScrapedResponse<std::convert::Infallible>`
/// and always leave `page` `None`.
#[derive(Debug)]
pub struct ScrapedResponse<P> {
    pub url: CrawlUrl,
    pub html: String,
    pub status_code: u16,
    /// Present only in render mode. Ownership transfers to the
    /// consumer, who must return it to the browser pool.
    pub page: Option<P>,
    /// Locators (by CSS selector, in document order) for `<a[href]>`
    /// elements whose href is one of the clickable-null-href markers.
    pub href_elements: Vec<String>,
}

impl<P> ScrapedResponse<P> {
    pub fn is_render_mode(&self) -> bool {
        self.page.is_some()
    }

    pub fn take_page(&mut self) -> Option<P> {
        self.page.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_merge_is_set_union() {
        let a = Requirements {
            events: ["load".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let b = Requirements {
            events: ["load".to_string(), "requestfinished".to_string()]
                .into_iter()
                .collect(),
            states: ["networkidle".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let merged = Requirements::merge_all([&a, &b]);
        assert_eq!(merged.events.len(), 2);
        assert_eq!(merged.states.len(), 1);
    }

    #[test]
    fn proxy_formats_as_url() {
        let proxy = Proxy {
            protocol: "http".into(),
            ip: "1.2.3.4".into(),
            port: 8080,
        };
        assert_eq!(proxy.formatted(), "http://1.2.3.4:8080");
    }
}
