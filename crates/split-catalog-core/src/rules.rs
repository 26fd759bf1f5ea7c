//! Collection-assignment rules.
//!
//! A [`CollectionRule`] is a pure function from a metacard and its
//! effective tag set to an optional collection name. A [`RuleSet`] evaluates
//! its rules in registration order and resolves the candidates to exactly one
//! collection:
//!
//! 1. No candidate: the default collection.
//! 2. More than one candidate: the default collection is dropped, since it
//!    is a fallback rather than a preference.
//! 3. The first remaining candidate wins.
//!
//! The default rule always fires, so a metacard that also matches any
//! specific rule lands in that rule's collection.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::models::Metacard;

type RuleFn = dyn Fn(&Metacard, &BTreeSet<String>) -> Option<String> + Send + Sync;

/// A named, pure collection-assignment function.
#[derive(Clone)]
pub struct CollectionRule {
    name: String,
    resolve: Arc<RuleFn>,
}

impl fmt::Debug for CollectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionRule")
            .field("name", &self.name)
            .finish()
    }
}

impl CollectionRule {
    pub fn new<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Metacard, &BTreeSet<String>) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }

    /// Always names `collection`.
    pub fn default_collection(collection: impl Into<String>) -> Self {
        let collection = collection.into();
        Self::new(format!("default:{}", collection), move |_, _| {
            Some(collection.clone())
        })
    }

    /// Fires when the effective tag set contains `tag`.
    pub fn tag(tag: impl Into<String>, collection: impl Into<String>) -> Self {
        let tag = tag.into();
        let collection = collection.into();
        Self::new(format!("tag:{}", tag), move |_, tags| {
            tags.contains(&tag).then(|| collection.clone())
        })
    }

    /// Fires on an exact metacard type.
    pub fn metacard_type(metacard_type: impl Into<String>, collection: impl Into<String>) -> Self {
        let metacard_type = metacard_type.into();
        let collection = collection.into();
        Self::new(format!("type:{}", metacard_type), move |mc, _| {
            (mc.metacard_type == metacard_type).then(|| collection.clone())
        })
    }

    /// Fires when an attribute equals `value`.
    pub fn attribute(
        name: impl Into<String>,
        value: serde_json::Value,
        collection: impl Into<String>,
    ) -> Self {
        let attr = name.into();
        let collection = collection.into();
        Self::new(format!("attribute:{}", attr), move |mc, _| {
            (mc.attribute(&attr) == Some(&value)).then(|| collection.clone())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, metacard: &Metacard, tags: &BTreeSet<String>) -> Option<String> {
        (self.resolve)(metacard, tags)
    }
}

/// An ordered list of rules plus the default collection they fall back to.
#[derive(Debug, Clone)]
pub struct RuleSet {
    default_collection: String,
    rules: Vec<CollectionRule>,
}

impl RuleSet {
    /// A rule set holding only the default rule.
    pub fn new(default_collection: impl Into<String>) -> Self {
        let default_collection = default_collection.into();
        Self {
            rules: vec![CollectionRule::default_collection(default_collection.clone())],
            default_collection,
        }
    }

    /// Append a rule. Rules are evaluated in the order they were added.
    pub fn with_rule(mut self, rule: CollectionRule) -> Self {
        self.push(rule);
        self
    }

    pub fn push(&mut self, rule: CollectionRule) {
        self.rules.push(rule);
    }

    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    pub fn rules(&self) -> &[CollectionRule] {
        &self.rules
    }

    /// Every distinct collection the rules propose, in first-fire order.
    pub fn candidates(&self, metacard: &Metacard) -> Vec<String> {
        let tags = metacard.effective_tags();
        let mut out: Vec<String> = Vec::new();
        for rule in &self.rules {
            if let Some(c) = rule.evaluate(metacard, &tags) {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Resolve the single collection a metacard belongs to.
    pub fn resolve(&self, metacard: &Metacard) -> String {
        let mut candidates = self.candidates(metacard);
        if candidates.len() > 1 {
            candidates.retain(|c| *c != self.default_collection);
        }
        candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_collection.clone())
    }

    /// Number of rules, including the default rule.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> RuleSet {
        RuleSet::new("default")
            .with_rule(CollectionRule::tag("revision", "history"))
            .with_rule(CollectionRule::metacard_type("workspace", "workspace"))
            .with_rule(CollectionRule::attribute(
                "media.format",
                json!("jpeg"),
                "imagery",
            ))
    }

    #[test]
    fn test_no_specific_match_resolves_default() {
        let mc = Metacard::new("a").with_title("plain record");
        assert_eq!(rules().resolve(&mc), "default");
    }

    #[test]
    fn test_empty_rule_list_resolves_default() {
        let set = RuleSet {
            default_collection: "fallback".into(),
            rules: Vec::new(),
        };
        assert_eq!(set.resolve(&Metacard::new("a")), "fallback");
    }

    #[test]
    fn test_default_removed_when_specific_rule_fires() {
        let mc = Metacard::new("a").with_tag("revision");
        let set = rules();
        assert_eq!(set.candidates(&mc), vec!["default", "history"]);
        assert_eq!(set.resolve(&mc), "history");
    }

    #[test]
    fn test_first_specific_match_wins() {
        let mc = Metacard::new("a")
            .with_tag("revision")
            .with_type("workspace")
            .with_attribute("media.format", json!("jpeg"));
        assert_eq!(rules().resolve(&mc), "history");
    }

    #[test]
    fn test_registration_order_decides_ties() {
        let set = RuleSet::new("default")
            .with_rule(CollectionRule::metacard_type("workspace", "workspace"))
            .with_rule(CollectionRule::tag("revision", "history"));
        let mc = Metacard::new("a").with_tag("revision").with_type("workspace");
        assert_eq!(set.resolve(&mc), "workspace");
    }

    #[test]
    fn test_rule_naming_default_explicitly_still_resolves_default() {
        let set = RuleSet::new("default").with_rule(CollectionRule::tag("resource", "default"));
        assert_eq!(set.resolve(&Metacard::new("a")), "default");
    }

    #[test]
    fn test_untagged_metacard_matches_resource_tag_rule() {
        let set = RuleSet::new("default").with_rule(CollectionRule::tag("resource", "resources"));
        assert_eq!(set.resolve(&Metacard::new("a")), "resources");
    }

    #[test]
    fn test_custom_closure_rule() {
        let set = RuleSet::new("default").with_rule(CollectionRule::new("big", |mc, _| {
            mc.attribute("size")
                .and_then(|v| v.as_u64())
                .filter(|s| *s > 1000)
                .map(|_| "large".to_string())
        }));
        let small = Metacard::new("s").with_attribute("size", json!(10));
        let large = Metacard::new("l").with_attribute("size", json!(5000));
        assert_eq!(set.resolve(&small), "default");
        assert_eq!(set.resolve(&large), "large");
    }
}
