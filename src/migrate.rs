use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::{ensure_schema, rebuild_alias_view};

/// Create the collection registry table and an (initially empty) alias view.
/// Running it again is harmless.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    ensure_schema(&pool).await?;

    let mut tx = pool.begin().await?;
    rebuild_alias_view(&mut tx, &config.router.collection_alias).await?;
    tx.commit().await?;

    pool.close().await;
    Ok(())
}
