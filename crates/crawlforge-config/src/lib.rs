//! Config Binding: reads the JSON configuration document and
//! materializes per-seed Fetch Engine / Crawl Controller settings, a
//! dense-id element list, the merged crawl-wide Requirements, and the
//! output data ordering — all with the defaults spec.md §4.I requires.
//!
//! Parsed as `serde_json::Value` first, then validated field-by-field,
//! rather than a single `#[derive(Deserialize)]` struct: an element
//! descriptor is a tagged union resolved by which keys are present
//! (`attributes` XOR `search_hierarchy` XOR `css_selector`), which a
//! derived deserializer can't express directly. Grounded on the
//! original's dict-walking `loaders/config_loader.py`.

mod document;
mod elements;
mod load;
mod seed;

pub use document::{ConfigDocument, CsvSinkConfig, DataSavingConfig};
pub use elements::parse_elements;
pub use load::load_config_file;
pub use seed::{materialize_crawler_config, materialize_fetch_config, SeedConfig};
