//! Frontier state for one crawl: the URLs queued for the next depth
//! level, the set already visited, the current depth, and the
//! click-through dedup key set.
//!
//! Per spec.md §3 invariants: a URL appears in `visited` at most once
//! (membership checked before enqueue); `current_depth` is
//! monotonically non-decreasing and bounded by `max_depth`.

use std::collections::HashSet;

use crawlforge_types::CrawlUrl;

/// `(source_page_url, selector_index_within_page)` — the click-through
/// dedup key from spec.md §9's design note, used instead of DOM
/// locator identity (which doesn't survive a reload).
pub type LocatorKey = (String, usize);

#[derive(Debug, Default)]
pub struct Frontier {
    pub to_visit: HashSet<CrawlUrl>,
    pub visited: HashSet<CrawlUrl>,
    pub current_depth: u32,
    pub processed_locators: HashSet<LocatorKey>,
}

impl Frontier {
    pub fn new(seed: CrawlUrl) -> Self {
        let mut to_visit = HashSet::new();
        to_visit.insert(seed);
        Self {
            to_visit,
            visited: HashSet::new(),
            current_depth: 0,
            processed_locators: HashSet::new(),
        }
    }

    /// Whether `url` has already been visited or is already queued in
    /// the current round's discoveries — used to avoid re-enqueuing.
    pub fn already_known(&self, url: &CrawlUrl, pending: &HashSet<CrawlUrl>) -> bool {
        self.visited.contains(url) || pending.contains(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_frontier_seeds_to_visit_with_one_url() {
        let seed = CrawlUrl::parse("http://s/a").unwrap();
        let frontier = Frontier::new(seed.clone());
        assert!(frontier.to_visit.contains(&seed));
        assert_eq!(frontier.current_depth, 0);
    }

    #[test]
    fn already_known_checks_both_visited_and_pending() {
        let seed = CrawlUrl::parse("http://s/a").unwrap();
        let mut frontier = Frontier::new(seed.clone());
        let other = CrawlUrl::parse("http://s/b").unwrap();
        let pending = HashSet::new();
        assert!(!frontier.already_known(&other, &pending));

        frontier.visited.insert(other.clone());
        assert!(frontier.already_known(&other, &pending));
    }
}
