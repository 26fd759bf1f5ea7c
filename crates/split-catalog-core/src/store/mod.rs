//! Backing-store abstraction for Split Catalog.
//!
//! A [`CatalogStore`] is a live handle to one collection (or to the alias
//! that unions them). A [`StoreFactory`] creates those handles on demand;
//! for alias-based backends it also creates the physical collection and
//! adds it to the alias.
//!
//! Implementations must be `Send + Sync`: one handle serves every concurrent
//! caller routed to its collection.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::operations::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, QueryRequest, SourceResponse,
    UpdateRequest, UpdateResponse,
};

/// One collection of the catalog.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create`](CatalogStore::create) | Insert metacards, assigning ids where missing |
/// | [`update`](CatalogStore::update) | Replace metacards by id |
/// | [`delete`](CatalogStore::delete) | Remove metacards by id |
/// | [`query`](CatalogStore::query) | Evaluate a filter and return a ranked page |
/// | [`content_types`](CatalogStore::content_types) | Distinct metacard types held |
/// | [`commit`](CatalogStore::commit) | Make pending writes visible to normal queries |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Collection (or alias) name this handle addresses.
    fn name(&self) -> &str;

    /// Insert or overwrite metacards. Metacards without an id get a new UUID.
    async fn create(&self, request: &CreateRequest) -> Result<CreateResponse>;

    /// Replace existing metacards. Ids not held by this collection are
    /// reported as processing errors.
    async fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse>;

    /// Delete metacards by id, returning the ones that were removed.
    async fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse>;

    async fn query(&self, request: &QueryRequest) -> Result<SourceResponse>;

    async fn content_types(&self) -> Result<BTreeSet<String>>;

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Creates store handles for collections named at runtime.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Open a handle to `collection`, creating the collection if the backend
    /// needs it to exist first.
    ///
    /// Side effects are not rolled back if the surrounding request fails.
    async fn provision(&self, collection: &str) -> Result<Arc<dyn CatalogStore>>;

    /// Open the read view that unions every provisioned collection.
    async fn alias(&self, alias: &str) -> Result<Arc<dyn CatalogStore>>;

    /// Collections that already exist in the backend.
    async fn discover(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
