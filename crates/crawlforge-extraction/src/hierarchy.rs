//! Hierarchical CSS-selector matching and per-field value extraction.
//!
//! Grounded on `target_element.py`'s stage-by-stage narrowing and
//! `data_parser.py`'s `collect_attr_value` (a regex match against the
//! node's own outer markup, not a DOM re-parse).

use crawlforge_types::{HierarchyPolicy, ParsingOption, TargetElement};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Runs a [`TargetElement`]'s hierarchy against a parsed document:
/// stage 0 matches against the whole document, each subsequent stage
/// matches against descendants of every node currently in the result
/// set. A stage that matches nothing terminates the traversal; under
/// [`HierarchyPolicy::KeepPrevious`] the prior stage's nodes are kept,
/// under [`HierarchyPolicy::EmptyOnPartial`] the whole match is empty.
pub fn match_hierarchy<'a>(document: &'a Html, element: &TargetElement) -> Vec<ElementRef<'a>> {
    let mut current: Vec<ElementRef<'a>> = Vec::new();

    for (stage_idx, stage) in element.search_hierarchy.iter().enumerate() {
        let selector = match Selector::parse(stage) {
            Ok(selector) => selector,
            Err(e) => {
                warn!(element = %element.name, stage = %stage, error = ?e, "invalid stage selector, stopping hierarchy");
                break;
            }
        };

        let matched: Vec<ElementRef<'a>> = if stage_idx == 0 {
            document.select(&selector).collect()
        } else {
            current.iter().flat_map(|node| node.select(&selector)).collect()
        };

        if matched.is_empty() {
            return match element.hierarchy_policy {
                HierarchyPolicy::KeepPrevious => current,
                HierarchyPolicy::EmptyOnPartial => Vec::new(),
            };
        }
        current = matched;
    }

    current
}

/// Applies one [`ParsingOption`] to a single matched node's outer HTML.
pub fn extract_value(node_html: &str, parsing_option: &ParsingOption) -> String {
    match parsing_option {
        ParsingOption::RemoveTags => node_html.to_string(),
        ParsingOption::CollectText => {
            let fragment = Html::parse_fragment(node_html);
            fragment
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join("")
                .trim()
                .to_string()
        }
        ParsingOption::CollectAttr { attr_name } => collect_attr_value(attr_name, node_html),
    }
}

/// `attr_name="value"` lifted straight out of the node's serialized
/// markup, mirroring the teacher's regex rather than a DOM re-parse
/// (the node's own opening tag is always well-formed markup here).
fn collect_attr_value(attr_name: &str, node_html: &str) -> String {
    let needle = format!("{attr_name}=\"");
    let Some(start) = node_html.find(&needle) else {
        return String::new();
    };
    let value_start = start + needle.len();
    match node_html[value_start..].find('"') {
        Some(end) => node_html[value_start..value_start + end].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlforge_types::Requirements;

    fn element(hierarchy: &[&str], policy: HierarchyPolicy) -> TargetElement {
        TargetElement {
            id: 1,
            name: "field".to_string(),
            search_hierarchy: hierarchy.iter().map(|s| s.to_string()).collect(),
            parsing_option: None,
            requires: Requirements::default(),
            hierarchy_policy: policy,
        }
    }

    #[test]
    fn matches_nested_stages_in_order() {
        let html = r#"<html><body><div class="card"><span class="price">$5</span></div></body></html>"#;
        let document = Html::parse_document(html);
        let el = element(&[".card", ".price"], HierarchyPolicy::KeepPrevious);
        let matches = match_hierarchy(&document, &el);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text().collect::<String>(), "$5");
    }

    #[test]
    fn keep_previous_preserves_last_nonempty_stage() {
        let html = r#"<html><body><div class="card">no price here</div></body></html>"#;
        let document = Html::parse_document(html);
        let el = element(&[".card", ".price"], HierarchyPolicy::KeepPrevious);
        let matches = match_hierarchy(&document, &el);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].value().has_class("card", Default::default()));
    }

    #[test]
    fn empty_on_partial_discards_everything() {
        let html = r#"<html><body><div class="card">no price here</div></body></html>"#;
        let document = Html::parse_document(html);
        let el = element(&[".card", ".price"], HierarchyPolicy::EmptyOnPartial);
        let matches = match_hierarchy(&document, &el);
        assert!(matches.is_empty());
    }

    #[test]
    fn collect_text_trims_whitespace() {
        let value = extract_value("<span>  hello world  </span>", &ParsingOption::CollectText);
        assert_eq!(value, "hello world");
    }

    #[test]
    fn remove_tags_keeps_outer_markup() {
        let node = r#"<a href="/x">link</a>"#;
        let value = extract_value(node, &ParsingOption::RemoveTags);
        assert_eq!(value, node);
    }

    #[test]
    fn collect_attr_extracts_named_attribute() {
        let node = r#"<a href="/x" data-id="42">link</a>"#;
        let value = extract_value(
            node,
            &ParsingOption::CollectAttr {
                attr_name: "data-id".to_string(),
            },
        );
        assert_eq!(value, "42");
    }

    #[test]
    fn collect_attr_missing_yields_empty_string() {
        let node = r#"<a href="/x">link</a>"#;
        let value = extract_value(
            node,
            &ParsingOption::CollectAttr {
                attr_name: "data-id".to_string(),
            },
        );
        assert_eq!(value, "");
    }
}
