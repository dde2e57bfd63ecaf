//! Parses raw element descriptors into compiled [`TargetElement`]s.
//!
//! Grounded on `ConfigLoader.get_raw_target_elements`/`_formate_config`
//! (`loaders/config_loader.py`): classify each descriptor by which keys
//! are present, then assign dense ids in declaration order. Unlike the
//! original, a user-supplied `id` field is never preserved — the
//! original's "keep if present, else assign" rule can collide with a
//! later auto-assigned id, so ids here are always dense by position.

use std::collections::HashSet;

use crawlforge_selector::{compile, RawAttribute, RawAttributeValue, RawHierarchySpec};
use crawlforge_types::{
    CrawlError, HierarchyPolicy, ParsingOption, Requirements, Result, TargetElement,
    VALID_EVENTS, VALID_STATES,
};
use serde_json::Value;

pub fn parse_elements(raw: &[Value]) -> Result<Vec<TargetElement>> {
    raw.iter()
        .enumerate()
        .map(|(id, value)| parse_element(id as u32, value))
        .collect()
}

fn parse_element(id: u32, value: &Value) -> Result<TargetElement> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("element_{id}"));

    let search_hierarchy = parse_hierarchy_spec(value)?;
    let parsing_option = parse_parsing_option(value.get("data_parsing"));
    let requires = parse_requirements(value.get("requires"))?;

    Ok(TargetElement {
        id,
        name,
        search_hierarchy,
        parsing_option,
        requires,
        hierarchy_policy: HierarchyPolicy::default(),
    })
}

fn parse_hierarchy_spec(value: &Value) -> Result<Vec<String>> {
    let has_attributes = value.get("attributes").is_some();
    let has_hierarchy = value.get("search_hierarchy").is_some();
    let has_css = value.get("css_selector").is_some();

    match (has_attributes, has_hierarchy, has_css) {
        (true, false, false) => {
            let attrs = parse_attribute_array(value.get("attributes").unwrap())?;
            compile(RawHierarchySpec::Attributes(attrs))
        }
        (false, true, false) => {
            let sets = value
                .get("search_hierarchy")
                .and_then(Value::as_array)
                .ok_or_else(|| CrawlError::configuration("search_hierarchy must be an array"))?
                .iter()
                .map(|set| {
                    let arr = set.as_array().ok_or_else(|| {
                        CrawlError::configuration(
                            "search_hierarchy entry must be an array of attribute descriptors",
                        )
                    })?;
                    parse_attribute_entries(arr)
                })
                .collect::<Result<Vec<_>>>()?;
            compile(RawHierarchySpec::SearchHierarchy(sets))
        }
        (false, false, true) => {
            let selector = value
                .get("css_selector")
                .and_then(Value::as_str)
                .ok_or_else(|| CrawlError::configuration("css_selector must be a string"))?
                .to_string();
            compile(RawHierarchySpec::CssSelector(selector))
        }
        (false, false, false) => Err(CrawlError::configuration(
            "element descriptor must specify one of attributes, search_hierarchy, css_selector",
        )),
        _ => Err(CrawlError::configuration(
            "element descriptor must specify exactly one of attributes, search_hierarchy, css_selector",
        )),
    }
}

fn parse_attribute_array(value: &Value) -> Result<Vec<RawAttribute>> {
    let arr = value
        .as_array()
        .ok_or_else(|| CrawlError::configuration("attributes must be an array"))?;
    parse_attribute_entries(arr)
}

fn parse_attribute_entries(arr: &[Value]) -> Result<Vec<RawAttribute>> {
    arr.iter()
        .map(|entry| {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| CrawlError::configuration("attribute descriptor missing a name"))?
                .to_string();
            let value = match entry.get("value") {
                Some(Value::String(s)) => RawAttributeValue::Single(s.clone()),
                Some(Value::Array(items)) => RawAttributeValue::Multi(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                ),
                _ => {
                    return Err(CrawlError::configuration(format!(
                        "attribute '{name}' missing a value"
                    )))
                }
            };
            Ok(RawAttribute { name, value })
        })
        .collect()
}

/// Unlike the hierarchy fields, a missing or unrecognized
/// `data_parsing` block is not a configuration error: spec.md §4.F
/// says an element with no parsing option still produces
/// `ScrapedData`, just ignored by the Output Binder.
fn parse_parsing_option(value: Option<&Value>) -> Option<ParsingOption> {
    let obj = value?.as_object()?;

    if obj.get("collect_text").and_then(Value::as_bool).unwrap_or(false) {
        return Some(ParsingOption::CollectText);
    }
    if obj.get("remove_tags").and_then(Value::as_bool).unwrap_or(false) {
        return Some(ParsingOption::RemoveTags);
    }
    if let Some(attr_name) = obj.get("collect_attr").and_then(Value::as_str) {
        return Some(ParsingOption::CollectAttr {
            attr_name: attr_name.to_string(),
        });
    }

    None
}

fn parse_requirements(value: Option<&Value>) -> Result<Requirements> {
    let Some(value) = value else {
        return Ok(Requirements::default());
    };

    let loaded_elements = value
        .get("loaded")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|pair| {
                    let pair = pair.as_array()?;
                    let kind = pair.first()?.as_str()?.to_string();
                    let selector_value = pair.get(1)?.as_str()?.to_string();
                    Some((kind, selector_value))
                })
                .collect()
        })
        .unwrap_or_default();

    let events = parse_whitelisted(value.get("event"), VALID_EVENTS, "event")?;
    let states = parse_whitelisted(value.get("state"), VALID_STATES, "state")?;

    Ok(Requirements {
        loaded_elements,
        events,
        states,
    })
}

fn parse_whitelisted(
    value: Option<&Value>,
    whitelist: &[&str],
    label: &str,
) -> Result<HashSet<String>> {
    let Some(arr) = value.and_then(Value::as_array) else {
        return Ok(HashSet::new());
    };
    arr.iter()
        .map(|v| {
            let s = v
                .as_str()
                .ok_or_else(|| CrawlError::configuration(format!("{label} entries must be strings")))?;
            if !whitelist.contains(&s) {
                return Err(CrawlError::configuration(format!(
                    "unknown {label} name '{s}'"
                )));
            }
            Ok(s.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dense_ids_assigned_by_declaration_order() {
        let raw = vec![
            json!({"css_selector": ".a"}),
            json!({"css_selector": ".b"}),
        ];
        let elements = parse_elements(&raw).unwrap();
        assert_eq!(elements[0].id, 0);
        assert_eq!(elements[1].id, 1);
        assert_eq!(elements[0].name, "element_0");
    }

    #[test]
    fn attributes_and_search_hierarchy_together_is_an_error() {
        let raw = json!({
            "attributes": [{"name": "class", "value": "a"}],
            "search_hierarchy": [[{"name": "id", "value": "x"}]],
        });
        assert!(parse_element(0, &raw).is_err());
    }

    #[test]
    fn no_hierarchy_field_is_an_error() {
        let raw = json!({"name": "title"});
        assert!(parse_element(0, &raw).is_err());
    }

    #[test]
    fn attributes_compile_to_class_and_attr_selectors() {
        let raw = json!({
            "attributes": [{"name": "class", "value": "a b"}, {"name": "id", "value": "x"}],
        });
        let element = parse_element(0, &raw).unwrap();
        assert_eq!(element.search_hierarchy, vec![".a.b".to_string(), "[id=x]".to_string()]);
    }

    #[test]
    fn data_parsing_collect_attr_reads_attr_name() {
        let raw = json!({"css_selector": "a", "data_parsing": {"collect_attr": "href"}});
        let element = parse_element(0, &raw).unwrap();
        assert_eq!(
            element.parsing_option,
            Some(ParsingOption::CollectAttr { attr_name: "href".to_string() })
        );
    }

    #[test]
    fn unknown_event_name_is_a_configuration_error() {
        let raw = json!({"css_selector": "a", "requires": {"event": ["not_a_real_event"]}});
        assert!(parse_element(0, &raw).is_err());
    }
}
