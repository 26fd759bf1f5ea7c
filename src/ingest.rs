//! Filesystem ingestion of JSON metacards.
//!
//! Walks a directory, keeps files matching `[ingest].include_globs` and not
//! matching `exclude_globs`, parses each file as one metacard or an array of
//! them, normalises the records, and creates them through the router.
//!
//! Normalisation:
//! - a missing id is the SHA-256 of the file's relative path (plus `#<n>`
//!   for array elements), so re-ingesting the same tree overwrites rather
//!   than duplicates;
//! - `checksum` is set to the SHA-256 of the file bytes;
//! - `created` and `modified` default to the time of ingestion.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use split_catalog_core::models::Metacard;
use split_catalog_core::operations::CreateRequest;

use crate::catalog;
use crate::config::{Config, IngestConfig};

/// Metacards read from one file.
#[derive(Debug)]
pub struct ScannedFile {
    pub relative_path: String,
    pub metacards: Vec<Metacard>,
}

#[derive(Debug, Default)]
pub struct Scan {
    pub files: Vec<ScannedFile>,
    /// Files that matched the globs but did not parse.
    pub skipped: Vec<(String, String)>,
}

impl Scan {
    pub fn metacards(&self) -> impl Iterator<Item = &Metacard> {
        self.files.iter().flat_map(|f| f.metacards.iter())
    }

    pub fn into_metacards(self) -> Vec<Metacard> {
        self.files.into_iter().flat_map(|f| f.metacards).collect()
    }
}

pub fn scan_directory(root: &Path, ingest: &IngestConfig, now: DateTime<Utc>) -> Result<Scan> {
    if !root.is_dir() {
        bail!("ingest root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&ingest.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
    default_excludes.extend(ingest.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut scan = Scan::default();

    for entry in WalkDir::new(root).follow_links(ingest.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        match parse_metacards(&bytes) {
            Ok(metacards) => {
                let metacards = normalize(metacards, &rel_str, &bytes, now);
                scan.files.push(ScannedFile {
                    relative_path: rel_str,
                    metacards,
                });
            }
            Err(e) => {
                tracing::warn!(file = %rel_str, error = %e, "skipping unparseable file");
                scan.skipped.push((rel_str, e.to_string()));
            }
        }
    }

    // Sort for deterministic ordering
    scan.files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(scan)
}

/// Parse a JSON document holding one metacard or an array of them.
pub fn parse_metacards(bytes: &[u8]) -> Result<Vec<Metacard>> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let metacards = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Metacard>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(metacards)
}

pub fn normalize(
    metacards: Vec<Metacard>,
    relative_path: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Vec<Metacard> {
    let checksum = sha256_hex(bytes);
    let single = metacards.len() == 1;

    metacards
        .into_iter()
        .enumerate()
        .map(|(i, mut mc)| {
            if mc.id.is_empty() {
                mc.id = if single {
                    sha256_hex(relative_path.as_bytes())
                } else {
                    sha256_hex(format!("{}#{}", relative_path, i).as_bytes())
                };
            }
            mc.attributes
                .insert("checksum".to_string(), serde_json::json!(checksum));
            mc.created.get_or_insert(now);
            mc.modified.get_or_insert(now);
            mc
        })
        .collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

pub async fn run_ingest(config: &Config, dir: &Path, dry_run: bool) -> Result<()> {
    let scan = scan_directory(dir, &config.ingest, Utc::now())?;
    let catalog = catalog::open(config).await?;

    let mut per_collection: BTreeMap<String, usize> = BTreeMap::new();
    for mc in scan.metacards() {
        *per_collection
            .entry(catalog.router.resolve_collection(mc))
            .or_default() += 1;
    }

    if dry_run {
        println!("ingest {} (dry-run)", dir.display());
        println!("  files scanned: {}", scan.files.len());
        println!("  files skipped: {}", scan.skipped.len());
        for (collection, count) in &per_collection {
            println!("  {}: {}", collection, count);
        }
        catalog.close().await;
        return Ok(());
    }

    let files = scan.files.len();
    let skipped = scan.skipped.len();
    let request = CreateRequest::new(scan.into_metacards());
    let result = catalog.router.create(&request).await;
    catalog.close().await;
    let response = result?;

    println!("ingest {}", dir.display());
    println!("  files scanned: {}", files);
    println!("  files skipped: {}", skipped);
    println!("  created metacards: {}", response.created.len());
    for (collection, count) in &per_collection {
        println!("  {}: {}", collection, count);
    }
    for err in &response.processing_errors {
        println!("  warning: {}", err);
    }
    println!("ok");

    Ok(())
}
