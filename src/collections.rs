//! `catalog collections` and `catalog route`.

use anyhow::{Context, Result};
use std::path::Path;

use split_catalog_core::filter::Filter;
use split_catalog_core::operations::QueryRequest;

use crate::catalog;
use crate::config::Config;
use crate::ingest::parse_metacards;

/// List every provisioned collection with its record count and health.
pub async fn list_collections(config: &Config) -> Result<()> {
    let catalog = catalog::open(config).await?;
    let handles = catalog.router.registry().collections();

    println!("{:<24} {:>8}  STATUS", "COLLECTION", "RECORDS");
    for handle in &handles {
        let count = handle
            .store
            .query(&QueryRequest::new(Filter::Any).with_page(0, 0))
            .await
            .map(|r| r.hits.to_string())
            .unwrap_or_else(|_| "?".to_string());
        let status = if handle.store.is_available().await {
            "OK"
        } else {
            "UNAVAILABLE"
        };
        println!("{:<24} {:>8}  {}", handle.name, count, status);
    }
    println!(
        "alias: {} ({} collections)",
        catalog.router.settings().collection_alias,
        handles.len()
    );

    catalog.close().await;
    Ok(())
}

/// Print the collection each metacard in `file` would be written to.
/// Nothing is provisioned or written.
pub fn run_route(config: &Config, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let rules = config.rule_set()?;

    for mc in parse_metacards(&bytes)? {
        let id = if mc.id.is_empty() { "(no id)" } else { mc.id.as_str() };
        println!("{} -> {}", id, rules.resolve(&mc));
    }
    Ok(())
}
