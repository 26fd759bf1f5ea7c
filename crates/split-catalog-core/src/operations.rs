//! Request and response shapes for catalog operations.
//!
//! The same types describe a single collection's sub-request and the
//! router's aggregate response, so callers never need to know how many
//! collections took part.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::filter::Filter;
use crate::models::{Metacard, ProcessingError, ScoredMetacard};

/// Per-operation properties carried on requests and responses.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Merge `from` into `into`. Later values win on key collision.
pub fn merge_properties(into: &mut Properties, from: &Properties) {
    for (k, v) in from {
        into.insert(k.clone(), v.clone());
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub metacards: Vec<Metacard>,
    pub properties: Properties,
}

impl CreateRequest {
    pub fn new(metacards: Vec<Metacard>) -> Self {
        Self {
            metacards,
            properties: Properties::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateResponse {
    pub created: Vec<Metacard>,
    pub properties: Properties,
    pub processing_errors: BTreeSet<ProcessingError>,
}

/// Replaces the metacard stored under each id with a new version.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub updates: Vec<(String, Metacard)>,
    pub properties: Properties,
}

impl UpdateRequest {
    pub fn new(updates: Vec<(String, Metacard)>) -> Self {
        Self {
            updates,
            properties: Properties::new(),
        }
    }
}

/// Before and after versions of one updated metacard.
#[derive(Debug, Clone, Serialize)]
pub struct Update {
    pub old: Metacard,
    pub new: Metacard,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateResponse {
    pub updated: Vec<Update>,
    pub properties: Properties,
    pub processing_errors: BTreeSet<ProcessingError>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub ids: Vec<String>,
    pub properties: Properties,
}

impl DeleteRequest {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            properties: Properties::new(),
        }
    }
}

/// What a single collection did with a fanned-out delete.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub deleted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteResponse {
    pub deleted: Vec<Metacard>,
    pub properties: Properties,
    pub processing_errors: BTreeSet<ProcessingError>,
    /// One entry per collection the delete reached. Empty for
    /// single-collection responses.
    pub outcomes: Vec<CollectionOutcome>,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub filter: Filter,
    /// Zero-based offset of the first result to return.
    pub start: usize,
    pub page_size: usize,
    /// Real-time get: must observe writes that have not been committed yet.
    pub realtime: bool,
    pub properties: Properties,
}

impl QueryRequest {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            start: 0,
            page_size: 10,
            realtime: false,
            properties: Properties::new(),
        }
    }

    /// Real-time get of specific ids.
    pub fn realtime_get(ids: Vec<String>) -> Self {
        let page_size = ids.len().max(1);
        Self {
            filter: Filter::Ids(ids),
            start: 0,
            page_size,
            realtime: true,
            properties: Properties::new(),
        }
    }

    pub fn with_page(mut self, start: usize, page_size: usize) -> Self {
        self.start = start;
        self.page_size = page_size;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceResponse {
    pub results: Vec<ScoredMetacard>,
    /// Total matches before pagination.
    pub hits: u64,
    pub properties: Properties,
    pub processing_errors: BTreeSet<ProcessingError>,
}
