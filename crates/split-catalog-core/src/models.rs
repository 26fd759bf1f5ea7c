//! Core data models used throughout Split Catalog.
//!
//! These types represent the metacards that flow through the router and the
//! scored results and error markers that come back from the collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tag applied to metacards that carry no tags of their own.
pub const DEFAULT_TAG: &str = "resource";

/// A metadata record describing a piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metacard {
    /// Catalog-wide identifier. Empty until a store assigns one.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Content type of the record (e.g. `"resource"`, `"workspace"`).
    #[serde(default = "default_metacard_type", rename = "type")]
    pub metacard_type: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

fn default_metacard_type() -> String {
    DEFAULT_TAG.to_string()
}

impl Metacard {
    /// Create an empty metacard with the given id and the default type.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            metacard_type: default_metacard_type(),
            tags: BTreeSet::new(),
            created: None,
            modified: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_type(mut self, metacard_type: impl Into<String>) -> Self {
        self.metacard_type = metacard_type.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Tags used for collection assignment.
    ///
    /// Untagged metacards are treated as carrying [`DEFAULT_TAG`].
    pub fn effective_tags(&self) -> BTreeSet<String> {
        if self.tags.is_empty() {
            BTreeSet::from([DEFAULT_TAG.to_string()])
        } else {
            self.tags.clone()
        }
    }
}

/// A query hit: a metacard plus its relevance score, when the backend
/// produced one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMetacard {
    pub metacard: Metacard,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl ScoredMetacard {
    pub fn new(metacard: Metacard, relevance: Option<f64>) -> Self {
        Self {
            metacard,
            relevance,
        }
    }
}

/// A non-fatal failure reported alongside a response.
///
/// Ordered so that aggregate responses can collect them into a set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProcessingError {
    /// Collection the failure came from, when known.
    pub collection: Option<String>,
    pub message: String,
}

impl ProcessingError {
    pub fn new(collection: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            collection: collection.map(str::to_string),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.collection {
            Some(c) => write!(f, "[{}] {}", c, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_metacard_gets_default_tag() {
        let mc = Metacard::new("a");
        assert_eq!(mc.effective_tags(), BTreeSet::from(["resource".to_string()]));
    }

    #[test]
    fn test_explicit_tags_replace_default() {
        let mc = Metacard::new("a").with_tag("revision");
        let tags = mc.effective_tags();
        assert!(tags.contains("revision"));
        assert!(!tags.contains("resource"));
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let mc: Metacard = serde_json::from_str(r#"{"title": "Harbor survey"}"#).unwrap();
        assert!(mc.id.is_empty());
        assert_eq!(mc.metacard_type, "resource");
        assert_eq!(mc.title.as_deref(), Some("Harbor survey"));
    }

    #[test]
    fn test_processing_error_display() {
        let err = ProcessingError::new(Some("history"), "not found: x");
        assert_eq!(err.to_string(), "[history] not found: x");
        let err = ProcessingError::new(None, "boom");
        assert_eq!(err.to_string(), "boom");
    }
}
