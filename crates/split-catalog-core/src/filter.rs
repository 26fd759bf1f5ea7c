//! Query filters evaluated by store backends.
//!
//! A [`Filter`] is a small boolean expression over metacard fields. Only
//! text terms produce a relevance score; structural predicates (ids, tags,
//! types, attributes) match without scoring, the way a real-time get does.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{Metacard, ScoredMetacard};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every metacard.
    Any,
    Ids(Vec<String>),
    /// Matches against [`Metacard::effective_tags`].
    Tag(String),
    MetacardType(String),
    Attribute {
        name: String,
        value: serde_json::Value,
    },
    /// Case-insensitive terms searched in the title and string attributes.
    Text(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Combine filters with AND, collapsing the trivial cases.
    pub fn all(mut filters: Vec<Filter>) -> Filter {
        match filters.len() {
            0 => Filter::Any,
            1 => filters.remove(0),
            _ => Filter::And(filters),
        }
    }

    pub fn matches(&self, metacard: &Metacard) -> bool {
        match self {
            Filter::Any => true,
            Filter::Ids(ids) => ids.iter().any(|id| *id == metacard.id),
            Filter::Tag(tag) => metacard.effective_tags().contains(tag),
            Filter::MetacardType(ty) => metacard.metacard_type == *ty,
            Filter::Attribute { name, value } => metacard.attribute(name) == Some(value),
            Filter::Text(query) => term_hits(query, metacard) > 0,
            Filter::And(fs) => fs.iter().all(|f| f.matches(metacard)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(metacard)),
            Filter::Not(f) => !f.matches(metacard),
        }
    }

    /// Relevance of a matching metacard, or `None` when the filter has no
    /// text component to score.
    pub fn relevance(&self, metacard: &Metacard) -> Option<f64> {
        match self {
            Filter::Text(query) => {
                let hits = term_hits(query, metacard);
                (hits > 0).then_some(hits as f64)
            }
            Filter::And(fs) => fs
                .iter()
                .filter_map(|f| f.relevance(metacard))
                .reduce(|a, b| a + b),
            Filter::Or(fs) => fs
                .iter()
                .filter_map(|f| f.relevance(metacard))
                .reduce(f64::max),
            _ => None,
        }
    }

    /// Score a metacard, returning `None` when it does not match.
    pub fn evaluate(&self, metacard: &Metacard) -> Option<ScoredMetacard> {
        if self.matches(metacard) {
            Some(ScoredMetacard::new(
                metacard.clone(),
                self.relevance(metacard),
            ))
        } else {
            None
        }
    }
}

fn term_hits(query: &str, metacard: &Metacard) -> usize {
    let query_lower = query.to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    if terms.is_empty() {
        return 0;
    }

    let mut haystack = metacard.title.clone().unwrap_or_default().to_lowercase();
    for value in metacard.attributes.values() {
        if let Some(s) = value.as_str() {
            haystack.push('\n');
            haystack.push_str(&s.to_lowercase());
        }
    }

    terms.iter().filter(|t| haystack.contains(*t)).count()
}

/// Order hits the way a single collection does: relevance descending,
/// unscored hits last, ties broken by id.
pub fn compare_hits(a: &ScoredMetacard, b: &ScoredMetacard) -> Ordering {
    match (a.relevance, b.relevance) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.metacard.id.cmp(&b.metacard.id))
}

/// Sort `hits`, then cut out the requested page.
///
/// Returns the page and the total number of hits before pagination.
pub fn rank(mut hits: Vec<ScoredMetacard>, start: usize, page_size: usize) -> (Vec<ScoredMetacard>, u64) {
    let total = hits.len() as u64;
    hits.sort_by(compare_hits);
    let page = hits.into_iter().skip(start).take(page_size).collect();
    (page, total)
}
