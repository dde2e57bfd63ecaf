//! Crawl Controller: a breadth-limited frontier with robots/domain/
//! pattern gating, deduplication, and AJAX click-through discovery.
//!
//! One [`Crawler`] drives one seed, owning a [`crawlforge_fetch::FetchEngine`]
//! and republishing discovered pages through it. Grounded on the
//! original `Crawler` (`scraping/crawler.py`) for the frontier state
//! machine and the original's exit-summary counters, extended with
//! spec.md's newer AJAX click-through description.

pub mod controller;
pub mod frontier;
pub mod gate;
pub mod links;
pub mod robots;

pub use controller::{CrawlSummary, Crawler, CrawlerConfig};
pub use frontier::{Frontier, LocatorKey};
pub use gate::Gate;
pub use links::{extract_links, LinkHarvest};
pub use robots::RobotsGate;
