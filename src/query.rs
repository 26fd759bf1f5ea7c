//! `catalog query` and `catalog get`.

use anyhow::{bail, Result};
use split_catalog_core::filter::Filter;
use split_catalog_core::operations::{QueryRequest, SourceResponse};

use crate::catalog;
use crate::config::Config;

/// Query options collected from the command line.
#[derive(Debug, Default, Clone)]
pub struct QueryArgs {
    pub text: Option<String>,
    pub tag: Option<String>,
    pub metacard_type: Option<String>,
    pub ids: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub start: usize,
    pub limit: usize,
    pub realtime: bool,
}

impl QueryArgs {
    /// AND of every given predicate; no predicates matches everything.
    pub fn filter(&self) -> Filter {
        let mut parts = Vec::new();
        if let Some(text) = &self.text {
            parts.push(Filter::Text(text.clone()));
        }
        if let Some(tag) = &self.tag {
            parts.push(Filter::Tag(tag.clone()));
        }
        if let Some(ty) = &self.metacard_type {
            parts.push(Filter::MetacardType(ty.clone()));
        }
        if !self.ids.is_empty() {
            parts.push(Filter::Ids(self.ids.clone()));
        }
        for (name, raw) in &self.attributes {
            parts.push(Filter::Attribute {
                name: name.clone(),
                value: attribute_value(raw),
            });
        }
        Filter::all(parts)
    }

    pub fn request(&self) -> QueryRequest {
        QueryRequest::new(self.filter())
            .with_page(self.start, self.limit)
            .with_realtime(self.realtime)
    }
}

/// `--attr k=v` values are JSON when they parse as JSON, strings otherwise,
/// so `--attr count=3` matches a number and `--attr format=jpeg` a string.
pub fn attribute_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

pub async fn run_query(config: &Config, args: &QueryArgs) -> Result<()> {
    let catalog = catalog::open(config).await?;
    let result = catalog.router.query(&args.request()).await;
    catalog.close().await;
    print_results(&result?);
    Ok(())
}

fn print_results(resp: &SourceResponse) {
    println!("hits: {}", resp.hits);
    for (i, hit) in resp.results.iter().enumerate() {
        let score = hit
            .relevance
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. [{}] {}  {}  {}",
            i + 1,
            score,
            hit.metacard.id,
            hit.metacard.metacard_type,
            hit.metacard.title.as_deref().unwrap_or("(untitled)")
        );
    }
    for err in &resp.processing_errors {
        println!("warning: {}", err);
    }
}

/// Real-time get of one metacard, printed as JSON.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let catalog = catalog::open(config).await?;
    let result = catalog
        .router
        .query(&QueryRequest::realtime_get(vec![id.to_string()]))
        .await;
    catalog.close().await;

    let resp = result?;
    match resp.results.into_iter().next() {
        Some(hit) => {
            println!("{}", serde_json::to_string_pretty(&hit.metacard)?);
            Ok(())
        }
        None => bail!("metacard not found: {}", id),
    }
}
