//! Extraction Engine: hierarchical CSS-selector traversal over a
//! parsed DOM, producing typed field values from `new_responses`
//! events and republishing them as `scraped_data`.

pub mod engine;
pub mod hierarchy;

pub use engine::{ExtractionEngine, SubPagePolicy};
pub use hierarchy::{extract_value, match_hierarchy};
