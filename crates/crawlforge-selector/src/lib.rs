//! Compiles the raw `attributes` / `search_hierarchy` / `css_selector`
//! config shapes into the CSS selector hierarchy a [`TargetElement`]
//! carries at runtime.
//!
//! [`TargetElement`]: crawlforge_types::TargetElement

use std::collections::HashMap;

use crawlforge_types::{CrawlError, Result};

const CLASS_ATTR: &str = "class";

/// A single raw `{name, value}` attribute descriptor as it appears in
/// config, before same-name entries are merged.
#[derive(Debug, Clone)]
pub struct RawAttribute {
    pub name: String,
    pub value: RawAttributeValue,
}

/// An attribute value is either one string or several (joined with a
/// space when merged, same as a repeated attribute).
#[derive(Debug, Clone)]
pub enum RawAttributeValue {
    Single(String),
    Multi(Vec<String>),
}

impl RawAttributeValue {
    fn into_parts(self) -> Vec<String> {
        match self {
            RawAttributeValue::Single(s) => vec![s],
            RawAttributeValue::Multi(v) => v,
        }
    }
}

/// The three mutually-exclusive ways a config element can describe its
/// search hierarchy. The config layer is responsible for rejecting an
/// element that supplies more than one of these (the XOR rule from the
/// selector model).
#[derive(Debug, Clone)]
pub enum RawHierarchySpec {
    /// Bypasses compilation entirely: a single-stage hierarchy.
    CssSelector(String),
    /// A flat attribute list; each *distinct* merged attribute name
    /// becomes one stage.
    Attributes(Vec<RawAttribute>),
    /// A sequence of attribute-descriptor sets; each set compiles to
    /// one stage, concatenating every selector piece the set produces.
    SearchHierarchy(Vec<Vec<RawAttribute>>),
}

/// Merges attribute entries with a repeated `name`, consolidating
/// values into a single space-joined string, and preserves the order
/// in which each distinct name was first seen.
fn merge_attributes(attrs: Vec<RawAttribute>) -> Result<Vec<(String, String)>> {
    let mut order: Vec<String> = Vec::new();
    let mut values: HashMap<String, Vec<String>> = HashMap::new();

    for attr in attrs {
        if attr.name.is_empty() {
            return Err(CrawlError::configuration(
                "attribute descriptor missing a name",
            ));
        }
        let parts = attr.value.into_parts();
        if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
            return Err(CrawlError::configuration(format!(
                "attribute '{}' missing a value",
                attr.name
            )));
        }
        values
            .entry(attr.name.clone())
            .or_insert_with(|| {
                order.push(attr.name.clone());
                Vec::new()
            })
            .extend(parts);
    }

    Ok(order
        .into_iter()
        .map(|name| {
            let joined = values.remove(&name).unwrap_or_default().join(" ");
            (name, joined)
        })
        .collect())
}

/// One merged `(name, value)` pair into its CSS selector piece:
/// `class` becomes `.token1.token2…`, anything else becomes
/// `[name=value]`.
fn selector_piece(name: &str, value: &str) -> String {
    if name == CLASS_ATTR {
        format!(".{}", value.split_whitespace().collect::<Vec<_>>().join("."))
    } else {
        format!("[{name}={value}]")
    }
}

/// Compiles a flat `attributes` list: each distinct merged name is its
/// own hierarchy stage.
pub fn compile_attributes(attrs: Vec<RawAttribute>) -> Result<Vec<String>> {
    Ok(merge_attributes(attrs)?
        .into_iter()
        .map(|(name, value)| selector_piece(&name, &value))
        .collect())
}

/// Compiles one `search_hierarchy` set into a single concatenated
/// stage string.
fn compile_set(attrs: Vec<RawAttribute>) -> Result<String> {
    Ok(merge_attributes(attrs)?
        .into_iter()
        .map(|(name, value)| selector_piece(&name, &value))
        .collect::<Vec<_>>()
        .join(""))
}

/// Compiles a `search_hierarchy` sequence of attribute-descriptor sets
/// into the final ordered hierarchy.
pub fn compile_search_hierarchy(sets: Vec<Vec<RawAttribute>>) -> Result<Vec<String>> {
    sets.into_iter().map(compile_set).collect()
}

/// Compiles any of the three raw forms into the ordered hierarchy
/// stored on a `TargetElement`.
pub fn compile(spec: RawHierarchySpec) -> Result<Vec<String>> {
    match spec {
        RawHierarchySpec::CssSelector(s) => Ok(vec![s]),
        RawHierarchySpec::Attributes(attrs) => compile_attributes(attrs),
        RawHierarchySpec::SearchHierarchy(sets) => compile_search_hierarchy(sets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(name: &str, value: &str) -> RawAttribute {
        RawAttribute {
            name: name.to_string(),
            value: RawAttributeValue::Single(value.to_string()),
        }
    }

    #[test]
    fn attributes_compile_one_stage_per_distinct_name() {
        let attrs = vec![single("class", "a b"), single("id", "x")];
        let hierarchy = compile_attributes(attrs).unwrap();
        assert_eq!(hierarchy, vec![".a.b".to_string(), "[id=x]".to_string()]);
    }

    #[test]
    fn repeated_attribute_names_merge_space_joined() {
        let attrs = vec![single("class", "btn"), single("id", "submit-button"), single("class", "active")];
        let merged = merge_attributes(attrs).unwrap();
        assert_eq!(
            merged,
            vec![
                ("class".to_string(), "btn active".to_string()),
                ("id".to_string(), "submit-button".to_string()),
            ]
        );
    }

    #[test]
    fn css_selector_bypasses_compilation() {
        let hierarchy = compile(RawHierarchySpec::CssSelector(".foo".to_string())).unwrap();
        assert_eq!(hierarchy, vec![".foo".to_string()]);
    }

    #[test]
    fn search_hierarchy_concatenates_each_set_into_one_stage() {
        let sets = vec![
            vec![single("class", "p"), single("class", "other")],
            vec![single("id", "x")],
        ];
        let hierarchy = compile_search_hierarchy(sets).unwrap();
        assert_eq!(hierarchy, vec![".p.other".to_string(), "[id=x]".to_string()]);
    }

    #[test]
    fn search_hierarchy_set_can_mix_attribute_kinds() {
        let sets = vec![vec![single("class", "p other"), single("id", "x")]];
        let hierarchy = compile_search_hierarchy(sets).unwrap();
        assert_eq!(hierarchy, vec![".p.other[id=x]".to_string()]);
    }

    #[test]
    fn missing_value_is_a_configuration_error() {
        let attrs = vec![RawAttribute {
            name: "id".to_string(),
            value: RawAttributeValue::Single(String::new()),
        }];
        assert!(compile_attributes(attrs).is_err());
    }

    #[test]
    fn missing_name_is_a_configuration_error() {
        let attrs = vec![single("", "x")];
        assert!(compile_attributes(attrs).is_err());
    }
}
