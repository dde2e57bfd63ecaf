//! Shared data model and error types for the crawlforge web crawler.
//!
//! Kept dependency-light (no `tokio`, no `reqwest`, no `scraper`) so
//! every other crate in the workspace can depend on it without pulling
//! in I/O or DOM-parsing machinery transitively.

pub mod error;
pub mod model;
pub mod url;

pub use error::{CrawlError, Result};
pub use model::{
    HierarchyPolicy, ParsingOption, Proxy, Requirements, ScrapedData, ScrapedResponse,
    TargetElement, VALID_EVENTS, VALID_STATES,
};
pub use url::CrawlUrl;
