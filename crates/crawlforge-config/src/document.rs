//! The parsed, validated configuration document: per-seed settings,
//! compiled elements, the merged crawl-wide Requirements, the output
//! field ordering, and sink settings.
//!
//! Grounded on `ConfigLoader` (`loaders/config_loader.py`): top-level
//! `target_urls`/`elements`/`data_order`/`data_saving` walked in the
//! same order the original loads them.

use std::collections::HashSet;

use crawlforge_types::{CrawlError, Requirements, Result, TargetElement};
use serde_json::Value;

use crate::elements::parse_elements;
use crate::seed::SeedConfig;

#[derive(Debug, Clone)]
pub struct ConfigDocument {
    pub seeds: Vec<SeedConfig>,
    pub elements: Vec<TargetElement>,
    pub requirements: Requirements,
    pub data_order: Vec<String>,
    pub data_saving: DataSavingConfig,
    pub user_agent: String,
    /// The proxy list endpoint per spec.md §6 ("a simple text
    /// endpoint yielding `protocol://ip:port` lines"). Required only
    /// when at least one seed sets `use_proxies`.
    pub proxy_provider_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DataSavingConfig {
    pub csv: Option<CsvSinkConfig>,
    pub txt_enabled: bool,
    pub database_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CsvSinkConfig {
    pub file_path: String,
    /// `"horizontal"` or `"vertical"`, validated at load time per
    /// spec.md §7 ("invalid orientation" is a fatal configuration
    /// error). `crawlforge-output` owns the sink that interprets it.
    pub orientation: String,
    /// Whether the sink truncates the output file at setup rather
    /// than appending to an existing one. Per spec.md §4.H ("CSV
    /// truncation on setup is toggleable").
    pub truncate_on_setup: bool,
}

impl ConfigDocument {
    pub fn from_value(value: Value) -> Result<Self> {
        let target_urls = value
            .get("target_urls")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if target_urls.is_empty() {
            return Err(CrawlError::configuration(
                "no urls were found in config, at least one is required",
            ));
        }
        let seeds = target_urls
            .iter()
            .map(SeedConfig::from_value)
            .collect::<Result<Vec<_>>>()?;

        let raw_elements = value
            .get("elements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if raw_elements.is_empty() {
            return Err(CrawlError::configuration("no elements were found in config"));
        }
        let elements = parse_elements(&raw_elements)?;
        let requirements = Requirements::merge_all(elements.iter().map(|e| &e.requires));

        let data_order = build_data_order(value.get("data_order"), &elements)?;
        let data_saving = parse_data_saving(value.get("data_saving"))?;

        let user_agent = value
            .get("user_agent")
            .and_then(Value::as_str)
            .unwrap_or("crawlforge/0.1")
            .to_string();
        let proxy_provider_url = value
            .get("proxy_provider_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        if proxy_provider_url.is_none() && seeds.iter().any(|s| s.use_proxies) {
            return Err(CrawlError::configuration(
                "a seed enables use_proxies but no proxy_provider_url is configured",
            ));
        }

        Ok(Self {
            seeds,
            elements,
            requirements,
            data_order,
            data_saving,
            user_agent,
            proxy_provider_url,
        })
    }
}

/// Augments the user-supplied `data_order` with any element names it
/// omits, appended in declaration order; rejects names it doesn't
/// recognize. Per spec.md §4.I and §6.
fn build_data_order(raw: Option<&Value>, elements: &[TargetElement]) -> Result<Vec<String>> {
    let declared: Vec<String> = elements.iter().map(|e| e.name.clone()).collect();
    let known: HashSet<&str> = declared.iter().map(String::as_str).collect();

    let mut order: Vec<String> = match raw.and_then(Value::as_array) {
        Some(arr) => arr
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    };

    for name in &order {
        if !known.contains(name.as_str()) {
            return Err(CrawlError::configuration(format!(
                "data_order names unknown element '{name}'"
            )));
        }
    }

    let mut seen: HashSet<String> = order.iter().cloned().collect();
    for name in declared {
        if seen.insert(name.clone()) {
            order.push(name);
        }
    }

    Ok(order)
}

fn parse_data_saving(raw: Option<&Value>) -> Result<DataSavingConfig> {
    let Some(raw) = raw else {
        return Ok(DataSavingConfig::default());
    };

    let csv = match raw.get("csv") {
        Some(csv) if csv.get("enabled").and_then(Value::as_bool).unwrap_or(false) => {
            let file_path = csv
                .get("file_path")
                .and_then(Value::as_str)
                .ok_or_else(|| CrawlError::configuration("csv sink enabled without a file_path"))?
                .to_string();
            let orientation = csv
                .get("orientation")
                .and_then(Value::as_str)
                .unwrap_or("horizontal")
                .to_string();
            if orientation != "horizontal" && orientation != "vertical" {
                return Err(CrawlError::configuration(format!(
                    "invalid csv orientation '{orientation}'"
                )));
            }
            let truncate_on_setup = csv
                .get("truncate_on_setup")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            Some(CsvSinkConfig {
                file_path,
                orientation,
                truncate_on_setup,
            })
        }
        _ => None,
    };

    let txt_enabled = raw
        .get("txt")
        .and_then(|v| v.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let database_enabled = raw
        .get("database")
        .and_then(|v| v.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(DataSavingConfig {
        csv,
        txt_enabled,
        database_enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_doc() -> Value {
        json!({
            "target_urls": [{"url": "http://s/"}],
            "elements": [{"name": "title", "css_selector": "h1", "data_parsing": {"collect_text": true}}],
        })
    }

    #[test]
    fn missing_target_urls_is_a_configuration_error() {
        let value = json!({"elements": [{"css_selector": "h1"}]});
        assert!(ConfigDocument::from_value(value).is_err());
    }

    #[test]
    fn missing_elements_is_a_configuration_error() {
        let value = json!({"target_urls": [{"url": "http://s/"}]});
        assert!(ConfigDocument::from_value(value).is_err());
    }

    #[test]
    fn data_order_defaults_to_declaration_order() {
        let doc = ConfigDocument::from_value(minimal_doc()).unwrap();
        assert_eq!(doc.data_order, vec!["title".to_string()]);
    }

    #[test]
    fn data_order_rejects_unknown_names() {
        let mut value = minimal_doc();
        value["data_order"] = json!(["not_an_element"]);
        assert!(ConfigDocument::from_value(value).is_err());
    }

    #[test]
    fn csv_sink_requires_a_file_path_when_enabled() {
        let mut value = minimal_doc();
        value["data_saving"] = json!({"csv": {"enabled": true}});
        assert!(ConfigDocument::from_value(value).is_err());
    }

    #[test]
    fn csv_sink_rejects_invalid_orientation() {
        let mut value = minimal_doc();
        value["data_saving"] = json!({"csv": {"enabled": true, "file_path": "out.csv", "orientation": "sideways"}});
        assert!(ConfigDocument::from_value(value).is_err());
    }
}
