//! Router assembly from configuration.
//!
//! Every command that touches metacards goes through [`open`]: connect to
//! SQLite, build the rule set, wrap a [`SqliteStoreFactory`] in a registry,
//! and bootstrap so collections from earlier runs are reachable.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use split_catalog_core::registry::CollectionRegistry;
use split_catalog_core::router::SplitCatalogRouter;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::{ensure_schema, SqliteStoreFactory};

/// An open catalog. Close it to flush the pool before exiting.
pub struct Catalog {
    pub router: SplitCatalogRouter,
    pool: SqlitePool,
}

impl Catalog {
    pub async fn close(self) {
        self.router.shutdown();
        self.pool.close().await;
    }
}

pub async fn open(config: &Config) -> Result<Catalog> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;

    let factory = SqliteStoreFactory::new(pool.clone(), config.router.collection_alias.clone());
    let registry = Arc::new(CollectionRegistry::new(Arc::new(factory)));
    let router = SplitCatalogRouter::new(config.router_settings(), config.rule_set()?, registry);
    router.bootstrap().await?;

    Ok(Catalog { router, pool })
}
