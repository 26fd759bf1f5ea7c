//! Registry of live collection handles.
//!
//! The registry is an explicit context object: the router owns one, and
//! nothing reaches it through global state. Handles are created lazily the
//! first time a collection is named and stay registered until
//! [`CollectionRegistry::reset`].
//!
//! Physical collections and the alias share one namespace; asking for a
//! name as the other kind than it was registered with is an error.
//!
//! Provisioning is compute-if-absent. Each name maps to a
//! [`tokio::sync::OnceCell`] inserted atomically through the `DashMap` entry
//! API; concurrent callers for the same name all await the single
//! initialization, so the factory runs at most once per name.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{validate_collection_name, CatalogError};
use crate::store::{CatalogStore, StoreFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// A real partition of the backing store.
    Physical,
    /// The virtual view over every physical collection.
    Alias,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Physical => "a collection",
            CollectionKind::Alias => "the alias",
        }
    }
}

/// A registered collection and the store handle that serves it.
#[derive(Clone)]
pub struct CollectionHandle {
    pub name: String,
    pub kind: CollectionKind,
    pub store: Arc<dyn CatalogStore>,
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

type Slot = Arc<OnceCell<CollectionHandle>>;

pub struct CollectionRegistry {
    factory: Arc<dyn StoreFactory>,
    slots: DashMap<String, Slot>,
}

impl CollectionRegistry {
    pub fn new(factory: Arc<dyn StoreFactory>) -> Self {
        Self {
            factory,
            slots: DashMap::new(),
        }
    }

    /// Return the handle for `name`, provisioning the collection on first use.
    pub async fn get_or_provision(&self, name: &str) -> Result<CollectionHandle, CatalogError> {
        self.get_or_init(name, CollectionKind::Physical).await
    }

    /// Return the alias handle, opening it on first use.
    pub async fn alias(&self, name: &str) -> Result<CollectionHandle, CatalogError> {
        self.get_or_init(name, CollectionKind::Alias).await
    }

    async fn get_or_init(
        &self,
        name: &str,
        kind: CollectionKind,
    ) -> Result<CollectionHandle, CatalogError> {
        validate_collection_name(name)?;

        // Clone the slot out so no shard lock is held across the await.
        let slot: Slot = self.slots.entry(name.to_string()).or_default().clone();

        let result = slot
            .get_or_try_init(|| async {
                let store = match kind {
                    CollectionKind::Physical => self.factory.provision(name).await,
                    CollectionKind::Alias => self.factory.alias(name).await,
                }
                .map_err(|source| CatalogError::Provision {
                    collection: name.to_string(),
                    source,
                })?;
                tracing::info!(collection = name, ?kind, "provisioned collection handle");
                Ok::<_, CatalogError>(CollectionHandle {
                    name: name.to_string(),
                    kind,
                    store,
                })
            })
            .await;

        match result {
            Ok(handle) if handle.kind != kind => Err(CatalogError::KindConflict {
                collection: name.to_string(),
                existing: handle.kind.as_str(),
                requested: kind.as_str(),
            }),
            Ok(handle) => Ok(handle.clone()),
            Err(e) => {
                self.slots
                    .remove_if(name, |_, s| Arc::ptr_eq(s, &slot) && !s.initialized());
                Err(e)
            }
        }
    }

    /// Collections the backend already holds, provisioned or not.
    pub async fn discover(&self) -> anyhow::Result<Vec<String>> {
        self.factory.discover().await
    }

    /// Handle for `name` if it has already been provisioned.
    pub fn get(&self, name: &str) -> Option<CollectionHandle> {
        self.slots.get(name).and_then(|s| s.get().cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Provisioned physical collections, sorted by name.
    pub fn collections(&self) -> Vec<CollectionHandle> {
        let mut handles: Vec<CollectionHandle> = self
            .slots
            .iter()
            .filter_map(|e| e.value().get().cloned())
            .filter(|h| h.kind == CollectionKind::Physical)
            .collect();
        handles.sort_by(|a, b| a.name.cmp(&b.name));
        handles
    }

    /// Number of provisioned physical collections.
    pub fn len(&self) -> usize {
        self.collections().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every handle. Collections themselves are left in the backend.
    pub fn reset(&self) {
        tracing::info!(handles = self.slots.len(), "resetting collection registry");
        self.slots.clear();
    }
}
