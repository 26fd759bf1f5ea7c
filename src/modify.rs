//! `catalog update` and `catalog delete`.

use anyhow::{bail, Context, Result};
use std::path::Path;

use split_catalog_core::models::Metacard;
use split_catalog_core::operations::{DeleteRequest, DeleteResponse, UpdateRequest};

use crate::catalog;
use crate::config::Config;
use crate::ingest::parse_metacards;

/// Pair each metacard in the file with its id. Every record must carry one.
pub fn update_request(metacards: Vec<Metacard>) -> Result<UpdateRequest> {
    let mut updates = Vec::with_capacity(metacards.len());
    for (i, mc) in metacards.into_iter().enumerate() {
        if mc.id.is_empty() {
            bail!("record {} has no id; updates must name the metacard they replace", i);
        }
        updates.push((mc.id.clone(), mc));
    }
    Ok(UpdateRequest::new(updates))
}

pub async fn run_update(config: &Config, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let request = update_request(parse_metacards(&bytes)?)?;

    let catalog = catalog::open(config).await?;
    let result = catalog.router.update(&request).await;
    catalog.close().await;
    let resp = result?;

    println!("updated: {}", resp.updated.len());
    for err in &resp.processing_errors {
        println!("  warning: {}", err);
    }
    Ok(())
}

pub async fn run_delete(config: &Config, ids: &[String]) -> Result<()> {
    let catalog = catalog::open(config).await?;
    let result = catalog.router.delete(&DeleteRequest::new(ids.to_vec())).await;
    catalog.close().await;
    print_delete(&result?);
    Ok(())
}

fn print_delete(resp: &DeleteResponse) {
    println!("deleted: {}", resp.deleted.len());
    for outcome in &resp.outcomes {
        match &outcome.error {
            None => println!("  {}: {}", outcome.collection, outcome.deleted),
            Some(e) => println!("  {}: failed: {}", outcome.collection, e),
        }
    }
}
