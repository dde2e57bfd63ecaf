//! Output Binder: listens for `scraped_data`, maps element id to
//! parsed value(s), assembles rows in the configured `data_order`, and
//! hands them to the configured sink.
//!
//! Grounded on `DataParser.parse_data` (`scraping/data_parser.py`) for
//! the element-id → parsed-value mapping, and spec.md §4.H for the
//! row-per-page/`data_order` assembly `data_parser.py` never actually
//! wired up to a sink.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use crawlforge_events::{Event, Listener};
use crawlforge_types::{ParsingOption, ScrapedData, TargetElement};
use tracing::warn;

use crate::sink::{Row, Sink};

/// Maps element id to its configured name and parsing option, so a
/// batch of [`ScrapedData`] can be folded into rows without re-walking
/// the original element list on every event.
struct FieldSpec {
    name: String,
    parsing_option: Option<ParsingOption>,
}

/// Listens for `scraped_data`, turns each event's matches into
/// field-ordered rows, and writes them to the configured sink.
pub struct OutputBinder {
    fields_by_id: HashMap<u32, FieldSpec>,
    data_order: Vec<String>,
    sink: Mutex<Box<dyn Sink>>,
}

impl OutputBinder {
    pub fn new(elements: &[TargetElement], data_order: Vec<String>, sink: Box<dyn Sink>) -> Self {
        let fields_by_id = elements
            .iter()
            .map(|e| {
                (
                    e.id,
                    FieldSpec {
                        name: e.name.clone(),
                        parsing_option: e.parsing_option.clone(),
                    },
                )
            })
            .collect();

        Self {
            fields_by_id,
            data_order,
            sink: Mutex::new(sink),
        }
    }

    /// Groups scraped data by source URL (one row per page), producing
    /// `data_order`-shaped rows. A field with no `parsing_option` set
    /// is produced by the Extraction Engine but ignored here per
    /// spec.md §4.F. Multiple matched nodes for one field are joined
    /// with `"; "` so each cell stays a single CSV value.
    fn to_rows(&self, scraped: &[ScrapedData]) -> Vec<Row> {
        let mut by_url: HashMap<&str, HashMap<&str, String>> = HashMap::new();
        let mut url_order: Vec<&str> = Vec::new();

        for item in scraped {
            let Some(field) = self.fields_by_id.get(&item.target_element_id) else {
                continue;
            };
            let Some(parsing_option) = &field.parsing_option else {
                continue;
            };

            let value = item
                .nodes_html
                .iter()
                .map(|html| crawlforge_extraction::extract_value(html, parsing_option))
                .collect::<Vec<_>>()
                .join("; ");

            let url = item.source_url.as_str();
            if !by_url.contains_key(url) {
                url_order.push(url);
            }
            by_url.entry(url).or_default().insert(field.name.as_str(), value);
        }

        url_order
            .into_iter()
            .map(|url| {
                self.data_order
                    .iter()
                    .map(|name| {
                        by_url
                            .get(url)
                            .and_then(|fields| fields.get(name.as_str()))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl Listener for OutputBinder {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let Some(scraped) = event.data::<Vec<ScrapedData>>() else {
            warn!(topic = %event.topic, "scraped_data event carried unexpected payload type");
            return Ok(());
        };

        let rows = self.to_rows(scraped);
        if rows.is_empty() {
            return Ok(());
        }

        let mut sink = self.sink.lock().expect("sink mutex poisoned");
        sink.write(&rows, &self.data_order)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlforge_types::{CrawlUrl, HierarchyPolicy, Requirements};
    use std::sync::{Arc, Mutex as StdMutex};

    fn element(id: u32, name: &str, option: ParsingOption) -> TargetElement {
        TargetElement {
            id,
            name: name.to_string(),
            search_hierarchy: vec![],
            parsing_option: Some(option),
            requires: Requirements::default(),
            hierarchy_policy: HierarchyPolicy::KeepPrevious,
        }
    }

    struct RecordingSink(Arc<StdMutex<Vec<Row>>>);

    impl Sink for RecordingSink {
        fn write(&mut self, rows: &[Row], _field_names: &[String]) -> crawlforge_types::Result<()> {
            self.0.lock().unwrap().extend(rows.iter().cloned());
            Ok(())
        }

        fn truncate(&mut self) -> crawlforge_types::Result<()> {
            self.0.lock().unwrap().clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn assembles_one_row_per_page_in_data_order() {
        let elements = vec![
            element(1, "title", ParsingOption::CollectText),
            element(2, "price", ParsingOption::CollectText),
        ];
        let recorded = Arc::new(StdMutex::new(Vec::new()));
        let binder = OutputBinder::new(
            &elements,
            vec!["price".to_string(), "title".to_string()],
            Box::new(RecordingSink(recorded.clone())),
        );

        let scraped = vec![
            ScrapedData {
                source_url: CrawlUrl::parse("http://s/a").unwrap(),
                target_element_id: 1,
                nodes_html: vec!["<h1>Widget</h1>".to_string()],
            },
            ScrapedData {
                source_url: CrawlUrl::parse("http://s/a").unwrap(),
                target_element_id: 2,
                nodes_html: vec!["<span>$5</span>".to_string()],
            },
        ];

        let event = Event::new("scraped_data", "test", scraped);
        binder.handle(&event).await.unwrap();

        let rows = recorded.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], vec!["$5".to_string(), "Widget".to_string()]);
    }

    #[tokio::test]
    async fn elements_without_a_parsing_option_are_ignored() {
        let elements = vec![element(1, "title", ParsingOption::CollectText)];
        let mut no_option = element(2, "unused", ParsingOption::CollectText);
        no_option.parsing_option = None;
        let elements = [elements, vec![no_option]].concat();

        let recorded = Arc::new(StdMutex::new(Vec::new()));
        let binder = OutputBinder::new(
            &elements,
            vec!["title".to_string(), "unused".to_string()],
            Box::new(RecordingSink(recorded.clone())),
        );

        let scraped = vec![
            ScrapedData {
                source_url: CrawlUrl::parse("http://s/a").unwrap(),
                target_element_id: 1,
                nodes_html: vec!["<h1>Widget</h1>".to_string()],
            },
            ScrapedData {
                source_url: CrawlUrl::parse("http://s/a").unwrap(),
                target_element_id: 2,
                nodes_html: vec!["<span>ignored</span>".to_string()],
            },
        ];

        let event = Event::new("scraped_data", "test", scraped);
        binder.handle(&event).await.unwrap();

        let rows = recorded.lock().unwrap();
        assert_eq!(rows[0], vec!["Widget".to_string(), "".to_string()]);
    }
}
