//! In-memory [`CatalogStore`] implementation for tests and embedding.
//!
//! Models a near-real-time backend: every write lands in a live map that
//! real-time gets read from, and becomes visible to normal queries once the
//! collection is committed. Auto-commit is on by default. The alias view only
//! ever reads committed data, so a real-time get through the alias misses
//! uncommitted writes.

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::filter::{rank, Filter};
use crate::models::{Metacard, ProcessingError, ScoredMetacard};
use crate::operations::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, QueryRequest, SourceResponse,
    Update, UpdateRequest, UpdateResponse,
};

use super::{CatalogStore, StoreFactory};

/// One in-memory collection.
pub struct InMemoryStore {
    name: String,
    auto_commit: bool,
    live: RwLock<BTreeMap<String, Metacard>>,
    committed: RwLock<BTreeMap<String, Metacard>>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_commit: true,
            live: RwLock::new(BTreeMap::new()),
            committed: RwLock::new(BTreeMap::new()),
        }
    }

    /// A collection whose writes stay invisible to normal queries until
    /// [`CatalogStore::commit`] is called.
    pub fn deferred_commit(name: impl Into<String>) -> Self {
        Self {
            auto_commit: false,
            ..Self::new(name)
        }
    }

    /// Number of metacards written, committed or not.
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    fn after_write(&self) {
        if self.auto_commit {
            self.publish();
        }
    }

    fn publish(&self) {
        let snapshot = self.live.read().clone();
        *self.committed.write() = snapshot;
    }

    fn matching(&self, filter: &Filter, realtime: bool) -> Vec<ScoredMetacard> {
        let guard = if realtime {
            self.live.read()
        } else {
            self.committed.read()
        };
        guard.values().filter_map(|mc| filter.evaluate(mc)).collect()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, request: &CreateRequest) -> Result<CreateResponse> {
        let mut created = Vec::with_capacity(request.metacards.len());
        {
            let mut live = self.live.write();
            for mc in &request.metacards {
                let mut mc = mc.clone();
                if mc.id.is_empty() {
                    mc.id = Uuid::new_v4().simple().to_string();
                }
                live.insert(mc.id.clone(), mc.clone());
                created.push(mc);
            }
        }
        self.after_write();

        Ok(CreateResponse {
            created,
            properties: request.properties.clone(),
            processing_errors: BTreeSet::new(),
        })
    }

    async fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse> {
        let mut updated = Vec::new();
        let mut processing_errors = BTreeSet::new();
        {
            let mut live = self.live.write();
            for (id, mc) in &request.updates {
                let mut new = mc.clone();
                new.id = id.clone();
                match live.get_mut(id) {
                    Some(slot) => {
                        let old = std::mem::replace(slot, new.clone());
                        updated.push(Update { old, new });
                    }
                    None => {
                        processing_errors.insert(ProcessingError::new(
                            Some(self.name.as_str()),
                            format!("metacard not found: {}", id),
                        ));
                    }
                }
            }
        }
        self.after_write();

        Ok(UpdateResponse {
            updated,
            properties: request.properties.clone(),
            processing_errors,
        })
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse> {
        let deleted: Vec<Metacard> = {
            let mut live = self.live.write();
            request.ids.iter().filter_map(|id| live.remove(id)).collect()
        };
        self.after_write();

        Ok(DeleteResponse {
            deleted,
            properties: request.properties.clone(),
            ..Default::default()
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<SourceResponse> {
        let hits = self.matching(&request.filter, request.realtime);
        let (results, hits) = rank(hits, request.start, request.page_size);
        Ok(SourceResponse {
            results,
            hits,
            properties: request.properties.clone(),
            processing_errors: BTreeSet::new(),
        })
    }

    async fn content_types(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .live
            .read()
            .values()
            .map(|mc| mc.metacard_type.clone())
            .collect())
    }

    async fn commit(&self) -> Result<()> {
        self.publish();
        Ok(())
    }
}

/// Read-only union over every collection of an [`InMemoryStoreFactory`].
pub struct InMemoryAliasStore {
    name: String,
    members: Arc<DashMap<String, Arc<InMemoryStore>>>,
}

impl InMemoryAliasStore {
    fn members(&self) -> Vec<Arc<InMemoryStore>> {
        let mut members: Vec<Arc<InMemoryStore>> =
            self.members.iter().map(|e| Arc::clone(e.value())).collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }
}

#[async_trait]
impl CatalogStore for InMemoryAliasStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, _request: &CreateRequest) -> Result<CreateResponse> {
        bail!("alias '{}' is read-only", self.name)
    }

    async fn update(&self, _request: &UpdateRequest) -> Result<UpdateResponse> {
        bail!("alias '{}' is read-only", self.name)
    }

    async fn delete(&self, _request: &DeleteRequest) -> Result<DeleteResponse> {
        bail!("alias '{}' is read-only", self.name)
    }

    async fn query(&self, request: &QueryRequest) -> Result<SourceResponse> {
        // Real-time get does not reach through the alias.
        let hits: Vec<ScoredMetacard> = self
            .members()
            .iter()
            .flat_map(|m| m.matching(&request.filter, false))
            .collect();
        let (results, hits) = rank(hits, request.start, request.page_size);
        Ok(SourceResponse {
            results,
            hits,
            properties: request.properties.clone(),
            processing_errors: BTreeSet::new(),
        })
    }

    async fn content_types(&self) -> Result<BTreeSet<String>> {
        let mut types = BTreeSet::new();
        for m in self.members() {
            types.extend(m.content_types().await?);
        }
        Ok(types)
    }
}

/// Factory for in-memory collections sharing one alias.
#[derive(Clone, Default)]
pub struct InMemoryStoreFactory {
    collections: Arc<DashMap<String, Arc<InMemoryStore>>>,
    deferred_commit: bool,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision collections with auto-commit turned off.
    pub fn deferred_commit() -> Self {
        Self {
            deferred_commit: true,
            ..Self::default()
        }
    }

    /// Direct access to a provisioned collection.
    pub fn collection(&self, name: &str) -> Option<Arc<InMemoryStore>> {
        self.collections.get(name).map(|e| Arc::clone(e.value()))
    }
}

#[async_trait]
impl StoreFactory for InMemoryStoreFactory {
    async fn provision(&self, collection: &str) -> Result<Arc<dyn CatalogStore>> {
        let store: Arc<dyn CatalogStore> = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| {
                tracing::debug!(collection, "creating in-memory collection");
                Arc::new(if self.deferred_commit {
                    InMemoryStore::deferred_commit(collection)
                } else {
                    InMemoryStore::new(collection)
                })
            })
            .clone();
        Ok(store)
    }

    async fn alias(&self, alias: &str) -> Result<Arc<dyn CatalogStore>> {
        Ok(Arc::new(InMemoryAliasStore {
            name: alias.to_string(),
            members: Arc::clone(&self.collections),
        }))
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
