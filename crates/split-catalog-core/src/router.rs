//! Multi-collection request router.
//!
//! [`SplitCatalogRouter`] presents many collections as one catalog:
//!
//! - **create / update**: each metacard is resolved to a collection by the
//!   [`RuleSet`]; the batch is split into one sub-request per collection and
//!   handles are provisioned on first use. A failing collection aborts the
//!   batch with a typed [`CatalogError`]; collections provisioned earlier in
//!   the batch stay provisioned. A batch that would route anything to the
//!   alias name is rejected before any sub-request.
//! - **delete**: fanned out to every provisioned collection, since ids are
//!   unique catalog-wide. Each collection's outcome is reported.
//! - **query**: sent to the alias. Real-time gets, which the alias cannot
//!   serve, are fanned out to every collection and merged by
//!   [`merge_by_relevance`] when the workaround is enabled.
//!
//! Sub-requests are awaited one after another on the caller's task. There is
//! no timeout or cancellation layer here.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::error::CatalogError;
use crate::merge::merge_by_relevance;
use crate::models::{Metacard, ProcessingError};
use crate::operations::{
    merge_properties, CollectionOutcome, CreateRequest, CreateResponse, DeleteRequest,
    DeleteResponse, QueryRequest, SourceResponse, UpdateRequest, UpdateResponse,
};
use crate::registry::{CollectionHandle, CollectionKind, CollectionRegistry};
use crate::rules::RuleSet;

/// Router behaviour switches.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Name of the alias that unions every collection for queries.
    pub collection_alias: String,
    /// Fan real-time gets out to each collection instead of the alias.
    pub realtime_get_workaround: bool,
    /// Commit each collection right after its write sub-request.
    pub force_autocommit: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            collection_alias: "catalog".to_string(),
            realtime_get_workaround: true,
            force_autocommit: false,
        }
    }
}

pub struct SplitCatalogRouter {
    settings: RouterSettings,
    rules: RuleSet,
    registry: Arc<CollectionRegistry>,
}

impl SplitCatalogRouter {
    pub fn new(settings: RouterSettings, rules: RuleSet, registry: Arc<CollectionRegistry>) -> Self {
        Self {
            settings,
            rules,
            registry,
        }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    pub fn resolve_collection(&self, metacard: &Metacard) -> String {
        self.rules.resolve(metacard)
    }

    /// Group metacards by resolved collection, in first-seen collection order.
    pub fn split(&self, metacards: &[Metacard]) -> Vec<(String, Vec<Metacard>)> {
        self.group(metacards.iter().cloned(), |mc| mc)
    }

    fn group<T>(
        &self,
        items: impl IntoIterator<Item = T>,
        metacard: impl Fn(&T) -> &Metacard,
    ) -> Vec<(String, Vec<T>)> {
        let mut groups: Vec<(String, Vec<T>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for item in items {
            let collection = self.rules.resolve(metacard(&item));
            match index.get(&collection) {
                Some(&i) => groups[i].1.push(item),
                None => {
                    index.insert(collection.clone(), groups.len());
                    groups.push((collection, vec![item]));
                }
            }
        }
        groups
    }

    /// Open the alias and every collection the backend already holds, so
    /// that fan-out operations reach collections created by earlier runs.
    ///
    /// Returns the number of provisioned collections.
    pub async fn bootstrap(&self) -> Result<usize, CatalogError> {
        let alias = &self.settings.collection_alias;
        self.registry.alias(alias).await?;

        let existing = self
            .registry
            .discover()
            .await
            .map_err(|source| CatalogError::Provision {
                collection: alias.clone(),
                source,
            })?;
        for name in &existing {
            self.registry.get_or_provision(name).await?;
        }

        tracing::info!(
            alias = %alias,
            collections = self.registry.len(),
            "catalog router ready"
        );
        Ok(self.registry.len())
    }

    pub async fn create(&self, request: &CreateRequest) -> Result<CreateResponse, CatalogError> {
        let mut response = CreateResponse {
            properties: request.properties.clone(),
            ..Default::default()
        };

        let groups = self.split(&request.metacards);
        self.reject_alias_targets(&groups)?;
        for (collection, metacards) in groups {
            let handle = self.registry.get_or_provision(&collection).await?;
            let sub = CreateRequest {
                metacards,
                properties: request.properties.clone(),
            };
            tracing::debug!(collection = %collection, count = sub.metacards.len(), "routing create");

            let resp = handle
                .store
                .create(&sub)
                .await
                .map_err(|source| CatalogError::Ingest {
                    collection: collection.clone(),
                    source,
                })?;
            self.autocommit(&handle).await?;

            response.created.extend(resp.created);
            merge_properties(&mut response.properties, &resp.properties);
            response.processing_errors.extend(resp.processing_errors);
        }

        Ok(response)
    }

    /// Updates are routed by the new version of each metacard.
    pub async fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse, CatalogError> {
        let mut response = UpdateResponse {
            properties: request.properties.clone(),
            ..Default::default()
        };

        let groups = self.group(request.updates.iter().cloned(), |(_, mc)| mc);
        self.reject_alias_targets(&groups)?;
        for (collection, updates) in groups {
            let handle = self.registry.get_or_provision(&collection).await?;
            let sub = UpdateRequest {
                updates,
                properties: request.properties.clone(),
            };
            tracing::debug!(collection = %collection, count = sub.updates.len(), "routing update");

            let resp = handle
                .store
                .update(&sub)
                .await
                .map_err(|source| CatalogError::Ingest {
                    collection: collection.clone(),
                    source,
                })?;
            self.autocommit(&handle).await?;

            response.updated.extend(resp.updated);
            merge_properties(&mut response.properties, &resp.properties);
            response.processing_errors.extend(resp.processing_errors);
        }

        Ok(response)
    }

    /// Delete from every provisioned collection.
    ///
    /// Every collection is attempted even after a failure. Failures become
    /// processing errors and per-collection outcomes; the call itself only
    /// fails when no collection succeeded.
    pub async fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse, CatalogError> {
        let handles = self.registry.collections();
        let mut response = DeleteResponse {
            properties: request.properties.clone(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut first_failure: Option<(String, anyhow::Error)> = None;
        let mut failures = 0usize;

        for handle in &handles {
            let attempt = match handle.store.delete(request).await {
                Ok(resp) => self.commit_if_forced(handle).await.map(|()| resp),
                Err(e) => Err(e),
            };

            match attempt {
                Ok(resp) => {
                    response.outcomes.push(CollectionOutcome {
                        collection: handle.name.clone(),
                        deleted: resp.deleted.len(),
                        error: None,
                    });
                    for mc in resp.deleted {
                        if seen.insert(mc.id.clone()) {
                            response.deleted.push(mc);
                        }
                    }
                    merge_properties(&mut response.properties, &resp.properties);
                    response.processing_errors.extend(resp.processing_errors);
                }
                Err(e) => {
                    tracing::warn!(collection = %handle.name, error = %e, "delete failed");
                    failures += 1;
                    response.outcomes.push(CollectionOutcome {
                        collection: handle.name.clone(),
                        deleted: 0,
                        error: Some(e.to_string()),
                    });
                    response.processing_errors.insert(ProcessingError::new(
                        Some(handle.name.as_str()),
                        format!("delete failed: {}", e),
                    ));
                    if first_failure.is_none() {
                        first_failure = Some((handle.name.clone(), e));
                    }
                }
            }
        }

        if failures > 0 && failures == handles.len() {
            if let Some((collection, source)) = first_failure {
                return Err(CatalogError::Delete { collection, source });
            }
        }

        tracing::debug!(
            collections = handles.len(),
            deleted = response.deleted.len(),
            failures,
            "routed delete"
        );
        Ok(response)
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<SourceResponse, CatalogError> {
        if request.realtime && self.settings.realtime_get_workaround {
            return self.realtime_fan_out(request).await;
        }

        let alias = self.registry.alias(&self.settings.collection_alias).await?;
        alias
            .store
            .query(request)
            .await
            .map_err(|source| CatalogError::Query {
                collection: alias.name.clone(),
                source,
            })
    }

    /// Each collection returns its first `start + page_size` results so the
    /// page can be cut from the merged order.
    async fn realtime_fan_out(&self, request: &QueryRequest) -> Result<SourceResponse, CatalogError> {
        let handles = self.registry.collections();
        let sub = QueryRequest {
            start: 0,
            page_size: request.start.saturating_add(request.page_size),
            ..request.clone()
        };
        let mut responses = Vec::with_capacity(handles.len());
        for handle in &handles {
            let resp = handle
                .store
                .query(&sub)
                .await
                .map_err(|source| CatalogError::Query {
                    collection: handle.name.clone(),
                    source,
                })?;
            responses.push(resp);
        }
        tracing::debug!(collections = handles.len(), "merging real-time get");
        Ok(merge_by_relevance(
            responses,
            request.start,
            request.page_size,
        ))
    }

    /// Distinct metacard types across every collection.
    pub async fn content_types(&self) -> Result<BTreeSet<String>, CatalogError> {
        let mut types = BTreeSet::new();
        for handle in self.registry.collections() {
            let t = handle
                .store
                .content_types()
                .await
                .map_err(|source| CatalogError::Query {
                    collection: handle.name.clone(),
                    source,
                })?;
            types.extend(t);
        }
        Ok(types)
    }

    /// True when the alias and every collection report themselves available.
    pub async fn is_available(&self) -> bool {
        let mut handles = self.registry.collections();
        if let Some(alias) = self.registry.get(&self.settings.collection_alias) {
            handles.push(alias);
        }
        for handle in handles {
            if !handle.store.is_available().await {
                tracing::warn!(collection = %handle.name, "collection unavailable");
                return false;
            }
        }
        true
    }

    /// Drop every handle. A later request provisions afresh.
    pub fn shutdown(&self) {
        self.registry.reset();
    }

    /// A rule that resolves to the alias name would write into the read-only
    /// alias, or claim its name as a collection. Checked before any
    /// sub-request so the batch is not partially written.
    fn reject_alias_targets<T>(&self, groups: &[(String, Vec<T>)]) -> Result<(), CatalogError> {
        let alias = &self.settings.collection_alias;
        match groups.iter().find(|(collection, _)| collection == alias) {
            Some((collection, _)) => Err(CatalogError::KindConflict {
                collection: collection.clone(),
                existing: CollectionKind::Alias.as_str(),
                requested: CollectionKind::Physical.as_str(),
            }),
            None => Ok(()),
        }
    }

    async fn autocommit(&self, handle: &CollectionHandle) -> Result<(), CatalogError> {
        self.commit_if_forced(handle)
            .await
            .map_err(|source| CatalogError::Ingest {
                collection: handle.name.clone(),
                source,
            })
    }

    async fn commit_if_forced(&self, handle: &CollectionHandle) -> anyhow::Result<()> {
        if self.settings.force_autocommit {
            handle.store.commit().await?;
        }
        Ok(())
    }
}
